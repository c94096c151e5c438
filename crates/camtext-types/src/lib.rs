//! Shared domain models for the camtext workspace.
//!
//! Capture, OCR and the CLI all exchange these types. Keep this crate free of
//! platform SDKs so every other crate can depend on it without pulling native
//! frameworks.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}

impl FrameError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            reason: reason.into(),
        }
    }
}

/// Pixel layout of a captured frame. A session fixes one format up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit luma plane followed by an interleaved half-height CbCr plane.
    Nv12,
    /// Packed 32-bit blue, green, red, alpha.
    Bgra,
}

impl PixelFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelFormat::Nv12 => "nv12",
            PixelFormat::Bgra => "bgra",
        }
    }
}

impl FromStr for PixelFormat {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nv12" => Ok(PixelFormat::Nv12),
            "bgra" => Ok(PixelFormat::Bgra),
            other => Err(FrameError::UnknownValue {
                kind: "pixel format",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orientation tag carried by a frame and forwarded to the recognizer as a hint.
///
/// The variant names the direction the top of the image points to, matching
/// EXIF orientations 1, 6, 3 and 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Up => "up",
            Orientation::Right => "right",
            Orientation::Down => "down",
            Orientation::Left => "left",
        }
    }

    pub fn exif_value(&self) -> u32 {
        match self {
            Orientation::Up => 1,
            Orientation::Right => 6,
            Orientation::Down => 3,
            Orientation::Left => 8,
        }
    }
}

impl FromStr for Orientation {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "portrait" => Ok(Orientation::Up),
            "right" => Ok(Orientation::Right),
            "down" => Ok(Orientation::Down),
            "left" => Ok(Orientation::Left),
            other => Err(FrameError::UnknownValue {
                kind: "orientation",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One captured camera image. Cheap to clone; the pixel buffer is shared.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    orientation: Orientation,
    frame_index: Option<u64>,
    timestamp: Option<Duration>,
    data: Arc<[u8]>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("orientation", &self.orientation)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .field("frame_index", &self.frame_index)
            .finish()
    }
}

impl Frame {
    /// Builds an NV12 frame. `stride` applies to both the luma and the chroma plane.
    pub fn from_nv12_owned(
        width: u32,
        height: u32,
        stride: usize,
        timestamp: Option<Duration>,
        data: Vec<u8>,
    ) -> FrameResult<Self> {
        if stride < width as usize {
            return Err(FrameError::invalid(format!(
                "stride {stride} is smaller than width {width}"
            )));
        }
        let chroma_rows = (height as usize).div_ceil(2);
        let required = stride
            .checked_mul(height as usize + chroma_rows)
            .ok_or_else(|| FrameError::invalid("calculated NV12 length overflowed"))?;
        Self::from_parts(
            width,
            height,
            stride,
            PixelFormat::Nv12,
            timestamp,
            data,
            required,
        )
    }

    pub fn from_bgra_owned(
        width: u32,
        height: u32,
        stride: usize,
        timestamp: Option<Duration>,
        data: Vec<u8>,
    ) -> FrameResult<Self> {
        let row_bytes = (width as usize)
            .checked_mul(4)
            .ok_or_else(|| FrameError::invalid("calculated BGRA row length overflowed"))?;
        if stride < row_bytes {
            return Err(FrameError::invalid(format!(
                "stride {stride} is smaller than {row_bytes} bytes per BGRA row"
            )));
        }
        let required = stride
            .checked_mul(height as usize)
            .ok_or_else(|| FrameError::invalid("calculated BGRA length overflowed"))?;
        Self::from_parts(
            width,
            height,
            stride,
            PixelFormat::Bgra,
            timestamp,
            data,
            required,
        )
    }

    fn from_parts(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        timestamp: Option<Duration>,
        data: Vec<u8>,
        required: usize,
    ) -> FrameResult<Self> {
        if width == 0 || height == 0 {
            return Err(FrameError::invalid(format!(
                "frame dimensions must be non-zero (got {width}x{height})"
            )));
        }
        if data.len() < required {
            return Err(FrameError::invalid(format!(
                "insufficient {format} bytes: got {} expected at least {required}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            format,
            orientation: Orientation::default(),
            frame_index: None,
            timestamp,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    pub fn frame_index(&self) -> Option<u64> {
        self.frame_index
    }

    /// Full pixel buffer, including any chroma plane.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The luma plane of an NV12 frame; `None` for packed formats.
    pub fn y_plane(&self) -> Option<&[u8]> {
        match self.format {
            PixelFormat::Nv12 => Some(&self.data[..self.stride * self.height as usize]),
            PixelFormat::Bgra => None,
        }
    }

    pub fn with_frame_index(mut self, index: Option<u64>) -> Self {
        self.frame_index = index;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }
}

/// Rectangle in normalized frame coordinates, origin at the top-left, each
/// component in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamps the rectangle into the unit square. Non-finite components collapse to zero.
    pub fn clamped(&self) -> Self {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        let x = unit(self.x);
        let y = unit(self.y);
        let width = unit(self.width).min(1.0 - x);
        let height = unit(self.height).min(1.0 - y);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Projects onto a `width` x `height` pixel grid, rounding outward.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelRect {
        let rect = self.clamped();
        let w = width as f32;
        let h = height as f32;
        let left = (rect.x * w).floor() as u32;
        let top = (rect.y * h).floor() as u32;
        let right = ((rect.x + rect.width) * w).ceil().min(w) as u32;
        let bottom = ((rect.y + rect.height) * h).ceil().min(h) as u32;
        PixelRect {
            x: left,
            y: top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Text found in one frame, reduced to the recognizer's top candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizedTextRegion {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: NormalizedRect,
}

impl RecognizedTextRegion {
    pub fn new(text: String, confidence: f32, bounding_box: NormalizedRect) -> Self {
        Self {
            text,
            confidence,
            bounding_box,
        }
    }
}
