use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("plane data length {provided} is smaller than stride * height ({required})")]
    InsufficientPlaneData { provided: usize, required: usize },
    #[error(
        "plane dimensions overflowed while validating stride * height (stride={stride}, height={height})"
    )]
    PlaneOverflow { stride: usize, height: u32 },
    #[error("stride {stride} is narrower than {width} pixels")]
    StrideTooSmall { stride: usize, width: u32 },
    #[error("unknown recognition level '{value}' (expected fast or accurate)")]
    UnknownLevel { value: String },
    #[error("{engine} OCR backend error: {message}")]
    Backend {
        engine: &'static str,
        message: String,
    },
}

impl OcrError {
    pub fn backend(engine: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            engine,
            message: message.into(),
        }
    }
}
