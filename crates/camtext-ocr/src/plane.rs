use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use camtext_types::{Frame, PixelFormat};

use crate::error::OcrError;

/// 8-bit luminance view of a frame.
///
/// NV12 frames lend their Y plane directly. BGRA frames are converted into an
/// owned, tightly packed plane.
#[derive(Clone)]
pub struct LumaPlane<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: Cow<'a, [u8]>,
}

impl<'a> LumaPlane<'a> {
    pub fn from_parts(
        width: u32,
        height: u32,
        stride: usize,
        data: &'a [u8],
    ) -> Result<Self, OcrError> {
        if stride < width as usize {
            return Err(OcrError::StrideTooSmall { stride, width });
        }
        let required = stride
            .checked_mul(height as usize)
            .ok_or(OcrError::PlaneOverflow { stride, height })?;
        if data.len() < required {
            return Err(OcrError::InsufficientPlaneData {
                provided: data.len(),
                required,
            });
        }
        Ok(Self {
            width,
            height,
            stride,
            data: Cow::Borrowed(&data[..required]),
        })
    }

    pub fn from_frame(frame: &'a Frame) -> Result<Self, OcrError> {
        match frame.format() {
            PixelFormat::Nv12 => {
                let luma = frame.y_plane().unwrap_or_default();
                Self::from_parts(frame.width(), frame.height(), frame.stride(), luma)
            }
            PixelFormat::Bgra => Ok(Self::from_bgra(frame)),
        }
    }

    fn from_bgra(frame: &Frame) -> Self {
        let width = frame.width() as usize;
        let mut luma = Vec::with_capacity(width * frame.height() as usize);
        for row in frame.data().chunks(frame.stride()).take(frame.height() as usize) {
            luma.extend(
                row[..width * 4]
                    .chunks_exact(4)
                    .map(|px| luma_bt601(px[2], px[1], px[0])),
            );
        }
        Self {
            width: frame.width(),
            height: frame.height(),
            stride: width,
            data: Cow::Owned(luma),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the plane points straight into the frame's buffer.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Cow::Borrowed(_))
    }
}

fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    let y = (77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8;
    y.min(255) as u8
}

impl fmt::Debug for LumaPlane<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LumaPlane")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("bytes", &self.data.len())
            .field("borrowed", &self.is_borrowed())
            .finish()
    }
}

impl Deref for LumaPlane<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
