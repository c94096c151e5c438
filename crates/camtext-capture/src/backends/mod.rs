pub mod mock;

#[cfg(feature = "backend-still")]
pub mod still;

#[cfg(feature = "backend-gstreamer")]
pub mod gstreamer;

#[cfg(feature = "backend-still")]
mod convert;
