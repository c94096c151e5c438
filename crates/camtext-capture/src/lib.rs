pub mod authorization;
pub mod backends;
pub mod config;
pub mod core;
pub mod negotiate;
pub mod session;
pub mod slot;

pub use authorization::{
    AuthorizationStatus, Authorizer, DeviceNodeAuthorizer, StaticAuthorizer, authorize,
};
pub use config::{Backend, Configuration, ResolutionPreference, SessionPreset};
pub use core::{
    CaptureError, CaptureProvider, CaptureResult, DynCaptureProvider, FramePublisher,
    FrameReceiver, FrameStream, SessionFormat, StopReceiver,
};
pub use negotiate::{Negotiated, negotiate_resolution};
pub use session::{CaptureSession, SessionController};
pub use slot::{PublishOutcome, SlotCloser, SlotPublisher, SlotReceiver, SlotStats, latest_channel};

pub use camtext_types::{Frame, FrameError, Orientation, PixelFormat, Resolution};
