use crate::error::OcrError;
use crate::request::OcrRequest;
use crate::response::OcrResponse;

/// A text recognizer the pipeline can call from the blocking pool.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once before the first frame. Load models or check the platform
    /// service here; an error ends recognition before any frame is taken.
    fn warm_up(&self) -> Result<(), OcrError> {
        Ok(())
    }

    /// Recognizes every text block in one frame.
    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError>;
}

/// Finds no text in any frame. Selected when no platform recognizer was built.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOcrEngine;

impl OcrEngine for NoopOcrEngine {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn recognize(&self, _request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(OcrResponse::empty())
    }
}
