mod backends;
mod engine;
mod error;
mod options;
mod plane;
mod request;
mod response;

#[cfg(all(feature = "engine-vision", target_os = "macos"))]
pub use backends::vision::VisionOcrEngine;
pub use engine::{NoopOcrEngine, OcrEngine};
pub use error::OcrError;
pub use options::{RecognitionLevel, RecognitionOptions};
pub use plane::LumaPlane;
pub use request::OcrRequest;
pub use response::{OcrCandidate, OcrObservation, OcrResponse};

/// Whether a platform recognizer was compiled into this build.
pub const fn has_platform_engine() -> bool {
    cfg!(all(feature = "engine-vision", target_os = "macos"))
}
