mod backend;
mod backends;
mod invoke;
mod registry;
mod result;
mod tracker;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use invoke::run_detection;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection};
pub use tracker::{TrackerKind, TrackerState};
