use crate::config::{ResolutionPreference, SessionPreset};
use crate::core::{CaptureError, CaptureResult};
use camtext_types::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub preset: SessionPreset,
    pub resolution: Resolution,
    pub fell_back: bool,
}

/// Maps the preferred tiers onto what the device supports.
///
/// The primary tier wins when available; otherwise the fallback tier is used
/// and a warning is logged. When neither fits the session must not start.
pub fn negotiate_resolution(
    supported: &[Resolution],
    preference: &ResolutionPreference,
) -> CaptureResult<Negotiated> {
    if supported.is_empty() {
        return Err(CaptureError::session_configuration(
            "capture device reports no supported resolutions",
        ));
    }

    if let Some(resolution) = preference.primary.resolve(supported) {
        return Ok(Negotiated {
            preset: preference.primary,
            resolution,
            fell_back: false,
        });
    }

    let Some(fallback) = preference.fallback else {
        return Err(CaptureError::session_configuration(format!(
            "preset {} is not supported by the device and no fallback is configured (supported: {})",
            preference.primary,
            describe(supported)
        )));
    };

    match fallback.resolve(supported) {
        Some(resolution) => {
            log::warn!(
                "preset {} unsupported by device; falling back to {} ({resolution})",
                preference.primary,
                fallback
            );
            Ok(Negotiated {
                preset: fallback,
                resolution,
                fell_back: true,
            })
        }
        None => Err(CaptureError::session_configuration(format!(
            "neither preset {} nor fallback {} is supported by the device (supported: {})",
            preference.primary,
            fallback,
            describe(supported)
        ))),
    }
}

fn describe(supported: &[Resolution]) -> String {
    supported
        .iter()
        .map(Resolution::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
