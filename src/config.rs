use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_DB_PATH: &str = "pavewatch.db";
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_TARGET_WIDTH: u32 = 720;
const DEFAULT_TARGET_HEIGHT: u32 = 405;
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_LATEST_PATH: &str = "latest_frame.png";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    db_path: Option<String>,
    display: Option<DisplayConfigFile>,
    detection: Option<DetectionConfigFile>,
    models: Option<ModelConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    latest_path: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    default_confidence: Option<f32>,
    target_width: Option<u32>,
    target_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    surface_weights: Option<PathBuf>,
    furniture_weights: Option<PathBuf>,
    input_size: Option<u32>,
    labels: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub display: DisplaySettings,
    pub detection: DetectionSettings,
    pub models: ModelSettings,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    /// Single-slot display file the loop overwrites per frame.
    pub latest_path: PathBuf,
    /// Optional TTF/OTF font for overlay captions.
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub default_confidence: f32,
    pub target_width: u32,
    pub target_height: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Default backend name used when the operator does not pick one.
    pub backend: String,
    /// ONNX weights for the pavement-surface task.
    pub surface_weights: Option<PathBuf>,
    /// ONNX weights for the road-furniture task.
    pub furniture_weights: Option<PathBuf>,
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Class labels in model output order.
    pub labels: Vec<String>,
}

impl AppConfig {
    /// Load configuration: JSON file named by `PAVEWATCH_CONFIG` (when set),
    /// then `PAVEWATCH_*` environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PAVEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let display = DisplaySettings {
            latest_path: file
                .display
                .as_ref()
                .and_then(|display| display.latest_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LATEST_PATH)),
            font_path: file.display.and_then(|display| display.font_path),
        };
        let detection = DetectionSettings {
            default_confidence: file
                .detection
                .as_ref()
                .and_then(|detection| detection.default_confidence)
                .unwrap_or(DEFAULT_CONFIDENCE),
            target_width: file
                .detection
                .as_ref()
                .and_then(|detection| detection.target_width)
                .unwrap_or(DEFAULT_TARGET_WIDTH),
            target_height: file
                .detection
                .as_ref()
                .and_then(|detection| detection.target_height)
                .unwrap_or(DEFAULT_TARGET_HEIGHT),
        };
        let models = ModelSettings {
            backend: file
                .models
                .as_ref()
                .and_then(|models| models.backend.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            surface_weights: file
                .models
                .as_ref()
                .and_then(|models| models.surface_weights.clone()),
            furniture_weights: file
                .models
                .as_ref()
                .and_then(|models| models.furniture_weights.clone()),
            input_size: file
                .models
                .as_ref()
                .and_then(|models| models.input_size)
                .unwrap_or(DEFAULT_MODEL_INPUT),
            labels: file
                .models
                .and_then(|models| models.labels)
                .unwrap_or_else(default_labels),
        };
        Self {
            db_path,
            display,
            detection,
            models,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PAVEWATCH_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(path) = std::env::var("PAVEWATCH_LATEST_PATH") {
            if !path.trim().is_empty() {
                self.display.latest_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("PAVEWATCH_FONT_PATH") {
            if !path.trim().is_empty() {
                self.display.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(backend) = std::env::var("PAVEWATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.models.backend = backend;
            }
        }
        if let Ok(confidence) = std::env::var("PAVEWATCH_CONFIDENCE") {
            let value: f32 = confidence
                .parse()
                .map_err(|_| anyhow!("PAVEWATCH_CONFIDENCE must be a number in [0.0, 1.0]"))?;
            self.detection.default_confidence = value;
        }
        if let Ok(labels) = std::env::var("PAVEWATCH_LABELS") {
            let parsed = split_csv(&labels);
            if !parsed.is_empty() {
                self.models.labels = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection.default_confidence) {
            return Err(anyhow!(
                "default confidence {} out of bounds [0.0, 1.0]",
                self.detection.default_confidence
            ));
        }
        if self.detection.target_width == 0 || self.detection.target_height == 0 {
            return Err(anyhow!("target resolution must be nonzero"));
        }
        if self.models.input_size == 0 {
            return Err(anyhow!("model input size must be nonzero"));
        }
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        Ok(())
    }
}

fn default_labels() -> Vec<String> {
    ["crack", "pothole", "patch", "raveling"]
        .iter()
        .map(|label| label.to_string())
        .collect()
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::from_file(AppConfigFile::default());
        cfg.validate().unwrap();
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        assert_eq!(cfg.models.backend, "stub");
        assert_eq!(cfg.detection.target_width, 720);
        assert_eq!(cfg.detection.target_height, 405);
    }

    #[test]
    fn out_of_range_confidence_fails_validation() {
        let mut cfg = AppConfig::from_file(AppConfigFile::default());
        cfg.detection.default_confidence = 1.2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_target_resolution_fails_validation() {
        let mut cfg = AppConfig::from_file(AppConfigFile::default());
        cfg.detection.target_width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn csv_labels_are_trimmed() {
        assert_eq!(
            split_csv(" crack, pothole ,,patch "),
            vec!["crack", "pothole", "patch"]
        );
    }
}
