use camtext_types::{Frame, Orientation};

use crate::error::OcrError;
use crate::options::RecognitionOptions;
use crate::plane::LumaPlane;

/// OCR invocation: one frame, how it is rotated, and how hard to look.
#[derive(Debug)]
pub struct OcrRequest<'a> {
    frame: &'a Frame,
    orientation: Orientation,
    options: &'a RecognitionOptions,
}

impl<'a> OcrRequest<'a> {
    /// Uses the orientation tag carried by the frame.
    pub fn new(frame: &'a Frame, options: &'a RecognitionOptions) -> Self {
        Self {
            frame,
            orientation: frame.orientation(),
            options,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn frame(&self) -> &'a Frame {
        self.frame
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn options(&self) -> &'a RecognitionOptions {
        self.options
    }

    pub fn luma(&self) -> Result<LumaPlane<'a>, OcrError> {
        LumaPlane::from_frame(self.frame)
    }
}
