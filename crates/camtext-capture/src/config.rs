use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::authorization::{AuthorizationStatus, Authorizer, DeviceNodeAuthorizer, StaticAuthorizer};
use crate::core::{CaptureError, CaptureResult, DynCaptureProvider};
use camtext_types::{Orientation, PixelFormat, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    Still,
    GStreamer,
}

impl FromStr for Backend {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "still" => Ok(Backend::Still),
            "gstreamer" | "gst" => Ok(Backend::GStreamer),
            other => Err(CaptureError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::Still => "still",
            Backend::GStreamer => "gstreamer",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compiled_backends() -> Vec<Backend> {
    let mut backends = Vec::new();
    #[cfg(feature = "backend-gstreamer")]
    {
        backends.push(Backend::GStreamer);
    }
    backends.push(Backend::Mock);
    #[cfg(feature = "backend-still")]
    {
        backends.push(Backend::Still);
    }
    backends
}

/// Capture resolution tiers, from the device's largest mode down to VGA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPreset {
    /// Largest resolution the device offers.
    Photo,
    Hd4k,
    Hd1080,
    Hd720,
    Vga,
}

impl SessionPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPreset::Photo => "photo",
            SessionPreset::Hd4k => "hd4k",
            SessionPreset::Hd1080 => "hd1080",
            SessionPreset::Hd720 => "hd720",
            SessionPreset::Vga => "vga",
        }
    }

    /// Fixed dimensions of the tier; `None` for [`SessionPreset::Photo`].
    pub fn fixed_resolution(&self) -> Option<Resolution> {
        match self {
            SessionPreset::Photo => None,
            SessionPreset::Hd4k => Some(Resolution::new(3840, 2160)),
            SessionPreset::Hd1080 => Some(Resolution::new(1920, 1080)),
            SessionPreset::Hd720 => Some(Resolution::new(1280, 720)),
            SessionPreset::Vga => Some(Resolution::new(640, 480)),
        }
    }

    pub fn fixed_presets() -> [SessionPreset; 4] {
        [
            SessionPreset::Hd4k,
            SessionPreset::Hd1080,
            SessionPreset::Hd720,
            SessionPreset::Vga,
        ]
    }

    /// Picks the concrete resolution this tier maps to on a device.
    pub fn resolve(&self, supported: &[Resolution]) -> Option<Resolution> {
        match self.fixed_resolution() {
            Some(target) => supported.iter().copied().find(|res| *res == target),
            None => supported.iter().copied().max_by_key(Resolution::pixels),
        }
    }
}

impl FromStr for SessionPreset {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "photo" | "max" => Ok(SessionPreset::Photo),
            "hd4k" | "2160p" | "3840x2160" => Ok(SessionPreset::Hd4k),
            "hd1080" | "1080p" | "1920x1080" => Ok(SessionPreset::Hd1080),
            "hd720" | "720p" | "1280x720" => Ok(SessionPreset::Hd720),
            "vga" | "480p" | "640x480" => Ok(SessionPreset::Vga),
            other => Err(CaptureError::configuration(format!(
                "unknown session preset '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPreference {
    pub primary: SessionPreset,
    pub fallback: Option<SessionPreset>,
}

impl Default for ResolutionPreference {
    fn default() -> Self {
        Self {
            primary: SessionPreset::Hd4k,
            fallback: Some(SessionPreset::Hd1080),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub device: Option<String>,
    pub input: Option<PathBuf>,
    pub resolution: ResolutionPreference,
    pub pixel_format: PixelFormat,
    pub orientation: Orientation,
    pub stabilization: bool,
    pub frame_interval: Duration,
    pub frame_limit: Option<u64>,
    /// Modes the mock device advertises; `None` keeps the built-in list.
    pub mock_resolutions: Option<Vec<Resolution>>,
    /// Authorization answer the mock device reports.
    pub mock_authorization: AuthorizationStatus,
}

impl Default for Configuration {
    fn default() -> Self {
        let backend = compiled_backends()
            .into_iter()
            .next()
            .unwrap_or(Backend::Mock);
        Self {
            backend,
            device: None,
            input: None,
            resolution: ResolutionPreference::default(),
            pixel_format: PixelFormat::Nv12,
            orientation: Orientation::Up,
            stabilization: false,
            frame_interval: Duration::from_millis(33),
            frame_limit: None,
            mock_resolutions: None,
            mock_authorization: AuthorizationStatus::Authorized,
        }
    }
}

impl Configuration {
    pub fn from_env() -> CaptureResult<Self> {
        let mut config = Configuration::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlays the `CAMTEXT_*` environment variables that are set.
    pub fn apply_env(&mut self) -> CaptureResult<()> {
        if let Ok(backend) = env::var("CAMTEXT_BACKEND") {
            self.backend = Backend::from_str(&backend)?;
        }
        if let Ok(device) = env::var("CAMTEXT_DEVICE") {
            if !device.trim().is_empty() {
                self.device = Some(device);
            }
        }
        if let Ok(path) = env::var("CAMTEXT_INPUT") {
            self.input = Some(PathBuf::from(path));
        }
        if let Ok(preset) = env::var("CAMTEXT_PRESET") {
            self.resolution.primary = SessionPreset::from_str(&preset)?;
        }
        Ok(())
    }

    pub fn available_backends() -> Vec<Backend> {
        compiled_backends()
    }

    /// Rejects settings no backend honours.
    pub fn validate(&self) -> CaptureResult<()> {
        if self.stabilization {
            return Err(CaptureError::session_configuration(
                "video stabilization must stay disabled for live recognition",
            ));
        }
        if self.frame_interval.is_zero() && self.backend != Backend::GStreamer {
            return Err(CaptureError::configuration(
                "frame interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Authorization gate matching the configured backend.
    pub fn authorizer(&self) -> Box<dyn Authorizer> {
        match self.backend {
            Backend::Mock => Box::new(StaticAuthorizer::new(self.mock_authorization)),
            Backend::Still => Box::new(StaticAuthorizer::new(AuthorizationStatus::Authorized)),
            Backend::GStreamer => match self.device.as_deref() {
                Some(device) if device.starts_with("/dev/") => {
                    Box::new(DeviceNodeAuthorizer::new(device))
                }
                _ => Box::new(StaticAuthorizer::new(AuthorizationStatus::Authorized)),
            },
        }
    }

    pub fn create_provider(&self) -> CaptureResult<DynCaptureProvider> {
        match self.backend {
            Backend::Mock => crate::backends::mock::boxed_mock(self),
            Backend::Still => {
                #[cfg(feature = "backend-still")]
                {
                    crate::backends::still::boxed_still(self)
                }
                #[cfg(not(feature = "backend-still"))]
                {
                    Err(CaptureError::unsupported("still"))
                }
            }
            Backend::GStreamer => {
                #[cfg(feature = "backend-gstreamer")]
                {
                    crate::backends::gstreamer::boxed_gstreamer(self)
                }
                #[cfg(not(feature = "backend-gstreamer"))]
                {
                    Err(CaptureError::unsupported("gstreamer"))
                }
            }
        }
    }
}
