//! pavewatch - run one detection session over a selected source
//!
//! The operator picks a source kind and locator, a confidence threshold, and
//! optionally a tracker; the session streams annotated frames into the
//! single-slot display file until the source ends, a read fails, or Ctrl-C
//! cancels. Still-image runs can additionally persist the annotated result
//! into the gallery table with `--persist`.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};

use pavewatch::{
    run_detection, AppConfig, CancelToken, DisplaySink, Engine, FileSink, OverlayStyle,
    SourceSpec, StreamSettings, TrackerKind,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Image,
    Video,
    Webcam,
    Rtsp,
    Youtube,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Source kind to open.
    #[arg(long, value_enum)]
    source: SourceKind,
    /// File path (image and video sources).
    #[arg(long)]
    path: Option<PathBuf>,
    /// Stream URL (rtsp and youtube sources).
    #[arg(long)]
    url: Option<String>,
    /// Device index (webcam source).
    #[arg(long)]
    device: Option<u32>,
    /// Confidence threshold in [0.0, 1.0]; defaults to the configured value.
    #[arg(long)]
    confidence: Option<f32>,
    /// Enable object tracking across frames.
    #[arg(long)]
    track: bool,
    /// Tracker configuration (bytetrack | botsort).
    #[arg(long, default_value = "bytetrack")]
    tracker: String,
    /// Detector backend name; defaults to the configured backend.
    #[arg(long, env = "PAVEWATCH_BACKEND_OVERRIDE")]
    backend: Option<String>,
    /// Persist the annotated result (image source only).
    #[arg(long)]
    persist: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = AppConfig::load()?;
    let spec = source_spec(&args)?;
    let tracker = tracker_kind(&args)?;
    let confidence = args.confidence.unwrap_or(cfg.detection.default_confidence);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(anyhow!(
            "--confidence {} out of bounds [0.0, 1.0]",
            confidence
        ));
    }
    if args.persist && !matches!(spec, SourceSpec::Image { .. }) {
        log::warn!("--persist applies to image sources only; ignoring");
    }

    let style = match &cfg.display.font_path {
        Some(path) => match OverlayStyle::with_font_path(path) {
            Ok(style) => style,
            Err(e) => {
                log::warn!("caption font unavailable, drawing boxes only: {:#}", e);
                OverlayStyle::plain()
            }
        },
        None => OverlayStyle::plain(),
    };

    let mut engine = Engine::open(&cfg)?;
    let backend = engine.backend(args.backend.as_deref())?;
    if let Ok(mut guard) = backend.lock() {
        if let Err(e) = guard.warm_up() {
            log::warn!("backend warm-up failed: {:#}", e);
        }
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::info!("cancellation requested");
            cancel.cancel();
        })?;
    }

    let mut sink = FileSink::new(cfg.display.latest_path.clone());
    log::info!(
        "display slot: {} (confidence {:.2}, tracking {})",
        sink.path().display(),
        confidence,
        tracker.map(|t| t.name()).unwrap_or("off")
    );

    if let SourceSpec::Image { path } = &spec {
        // Still-image flow: one inference, optional persistence.
        let frame = match pavewatch::source::open_still(path) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("could not open image: {:#}", e);
                return Ok(());
            }
        };
        let frame = frame.resized(cfg.detection.target_width, cfg.detection.target_height);
        let mut tracker_state = tracker.map(pavewatch::TrackerState::new);
        match run_detection(&backend, &frame, confidence, tracker_state.as_mut(), &style) {
            Ok((detections, overlay)) => {
                for detection in &detections {
                    log::info!("detected {}", detection.caption());
                }
                let caption = format!("{} detections", detections.len());
                if let Err(e) = sink.show(&overlay, &caption) {
                    log::warn!("display sink error: {:#}", e);
                }
                if args.persist {
                    match engine.store_mut().append(&overlay) {
                        Ok(row) => log::info!("annotated image stored as {}", row),
                        Err(e) => log::error!("could not store annotated image: {:#}", e),
                    }
                }
            }
            Err(e) => log::error!("detection failed: {:#}", e),
        }
        engine.close();
        return Ok(());
    }

    let settings = StreamSettings {
        confidence,
        target_width: cfg.detection.target_width,
        target_height: cfg.detection.target_height,
        tracker,
    };
    let report = pavewatch::run_session(&spec, &settings, &backend, &style, &mut sink, &cancel);
    match &report.error {
        Some(message) => log::error!(
            "session {:?} after {} frames: {}",
            report.state,
            report.frames_rendered,
            message
        ),
        None => log::info!(
            "session {:?} after {} frames",
            report.state,
            report.frames_rendered
        ),
    }

    engine.close();
    Ok(())
}

fn source_spec(args: &Args) -> Result<SourceSpec> {
    let spec = match args.source {
        SourceKind::Image => SourceSpec::Image {
            path: args
                .path
                .clone()
                .ok_or_else(|| anyhow!("--source image requires --path"))?,
        },
        SourceKind::Video => SourceSpec::Video {
            path: args
                .path
                .clone()
                .ok_or_else(|| anyhow!("--source video requires --path"))?,
        },
        SourceKind::Webcam => SourceSpec::Webcam {
            device: args.device.unwrap_or(0),
        },
        SourceKind::Rtsp => SourceSpec::Rtsp {
            url: args
                .url
                .clone()
                .ok_or_else(|| anyhow!("--source rtsp requires --url"))?,
        },
        SourceKind::Youtube => SourceSpec::Youtube {
            url: args
                .url
                .clone()
                .ok_or_else(|| anyhow!("--source youtube requires --url"))?,
        },
    };
    Ok(spec)
}

fn tracker_kind(args: &Args) -> Result<Option<TrackerKind>> {
    if !args.track {
        return Ok(None);
    }
    TrackerKind::parse(&args.tracker)
        .map(Some)
        .ok_or_else(|| anyhow!("unknown tracker '{}' (bytetrack | botsort)", args.tracker))
}
