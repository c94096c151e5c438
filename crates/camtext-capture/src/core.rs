use std::pin::Pin;

use futures_core::Stream;
use thiserror::Error;
use tokio::sync::watch;

use crate::authorization::AuthorizationStatus;
use crate::config::SessionPreset;
use crate::slot::{SlotPublisher, SlotReceiver};
use camtext_types::{Frame, FrameError, Orientation, PixelFormat, Resolution};

pub type CaptureResult<T> = Result<T, CaptureError>;

pub type FramePublisher = SlotPublisher<Frame>;
pub type FrameReceiver = SlotReceiver<Frame>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Frame> + Send>>;

/// Flips to `true` once the owning session is stopped.
pub type StopReceiver = watch::Receiver<bool>;

pub type DynCaptureProvider = Box<dyn CaptureProvider>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera access is not authorized (status: {status})")]
    AuthorizationDenied { status: AuthorizationStatus },

    #[error("capture session configuration failed: {message}")]
    SessionConfiguration { message: String },

    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("{backend} backend failed: {message}")]
    BackendFailure {
        backend: &'static str,
        message: String,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn session_configuration(message: impl Into<String>) -> Self {
        Self::SessionConfiguration {
            message: message.into(),
        }
    }

    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn backend_failure(backend: &'static str, message: impl Into<String>) -> Self {
        Self::BackendFailure {
            backend,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Format a session settled on after negotiation. Fixed for the session's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFormat {
    pub preset: SessionPreset,
    pub resolution: Resolution,
    pub pixel_format: PixelFormat,
    pub orientation: Orientation,
    pub fell_back: bool,
}

/// A camera backend able to describe its device and drive a capture loop.
pub trait CaptureProvider: Send + 'static {
    fn name(&self) -> &'static str;

    /// Resolutions the active device can deliver, in any order.
    fn supported_resolutions(&self) -> CaptureResult<Vec<Resolution>>;

    /// Runs the blocking capture loop on the calling thread.
    ///
    /// Implementations publish every captured frame and return once `stop`
    /// flips, the publisher reports the slot closed, or the device ends.
    fn run(
        self: Box<Self>,
        format: SessionFormat,
        publisher: FramePublisher,
        stop: StopReceiver,
    ) -> CaptureResult<()>;
}

pub(crate) fn stop_requested(stop: &StopReceiver) -> bool {
    *stop.borrow()
}
