//! Pavement defect detection console.
//!
//! This crate wires a user-selected frame source (image, stored video,
//! webcam, RTSP, YouTube) through a pretrained object-detection backend,
//! renders detection overlays, publishes each annotated frame to a
//! single-slot display sink, and persists confirmed results as PNG blobs in
//! a relational table.
//!
//! # Module Structure
//!
//! - `source`: frame acquisition (per-kind locator validation, pull streams)
//! - `detect`: detector backends, registry, tracking, invocation
//! - `annotate`: overlay rendering
//! - `stream`: the session state machine driving source -> detect -> display
//! - `sink`: single-slot display surfaces
//! - `storage`: append-only annotated-image store
//! - `config`: file + environment configuration
//!
//! Model/storage state is never global: an [`Engine`] owns the backend
//! registry and the storage connection, is constructed at session start, and
//! is released at session end.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod sink;
pub mod source;
pub mod storage;
pub mod stream;

pub use annotate::OverlayStyle;
pub use config::AppConfig;
pub use detect::{
    run_detection, BackendRegistry, BoundingBox, Detection, DetectorBackend, StubBackend,
    TrackerKind, TrackerState,
};
pub use error::AppError;
pub use frame::Frame;
pub use sink::{DisplaySink, FileSink, MemorySink, NullSink};
pub use source::{open_source, FrameStream, OpenedSource, SourceSpec};
pub use storage::{InMemoryResultStore, ResultStore, RowRef, SqliteResultStore};
pub use stream::{
    drive_stream, run_session, CancelToken, SessionReport, StreamSettings, StreamState,
};

/// Context object owning the detector registry and the result store.
///
/// Constructed once per program run, handed by reference to everything that
/// needs model or storage access, and released explicitly at the end. The
/// registry always carries the deterministic stub backend; ONNX backends are
/// registered from configured weights when the `backend-tract` feature is
/// enabled.
pub struct Engine {
    registry: BackendRegistry,
    store: Box<dyn ResultStore>,
}

impl Engine {
    pub fn open(cfg: &AppConfig) -> Result<Self> {
        let store = SqliteResultStore::open(&cfg.db_path)
            .with_context(|| format!("open result store at {}", cfg.db_path))?;
        Self::open_with_store(cfg, Box::new(store))
    }

    /// Open with a caller-supplied store (tests use the in-memory one).
    pub fn open_with_store(cfg: &AppConfig, store: Box<dyn ResultStore>) -> Result<Self> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());

        #[cfg(feature = "backend-tract")]
        {
            use detect::TractBackend;
            if let Some(weights) = &cfg.models.surface_weights {
                registry.register(TractBackend::new(
                    "surface",
                    weights,
                    cfg.models.input_size,
                    cfg.models.labels.clone(),
                )?);
            }
            if let Some(weights) = &cfg.models.furniture_weights {
                registry.register(TractBackend::new(
                    "furniture",
                    weights,
                    cfg.models.input_size,
                    cfg.models.labels.clone(),
                )?);
            }
        }

        if registry.get(&cfg.models.backend).is_some() {
            registry.set_default(&cfg.models.backend)?;
        } else if cfg.models.backend != "stub" {
            log::warn!(
                "configured backend '{}' is not available (have: {}); using the default",
                cfg.models.backend,
                registry.list().join(", ")
            );
        }

        log::info!("engine: backends [{}]", registry.list().join(", "));
        Ok(Self { registry, store })
    }

    /// Resolve a detector backend by name, or the configured default.
    pub fn backend(&self, name: Option<&str>) -> Result<Arc<Mutex<dyn DetectorBackend>>> {
        self.registry.resolve(name)
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn store_mut(&mut self) -> &mut dyn ResultStore {
        self.store.as_mut()
    }

    pub fn store(&self) -> &dyn ResultStore {
        self.store.as_ref()
    }

    /// Release the model handles and the storage connection.
    pub fn close(self) {
        log::debug!("engine: released");
        drop(self);
    }
}
