#![cfg(feature = "backend-still")]

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use image::imageops::{self, FilterType};

use super::convert::rgba_to_frame;
use crate::config::{Configuration, SessionPreset};
use crate::core::{
    CaptureError, CaptureProvider, CaptureResult, DynCaptureProvider, FramePublisher,
    SessionFormat, StopReceiver, stop_requested,
};
use crate::slot::PublishOutcome;
use camtext_types::Resolution;

const BACKEND_NAME: &str = "still";

/// Replays a single image file as if a camera kept pointing at it.
pub struct StillImageProvider {
    input: PathBuf,
    image: RgbaImage,
    frame_interval: Duration,
    frame_limit: Option<u64>,
}

impl StillImageProvider {
    pub fn open<P: AsRef<Path>>(
        path: P,
        frame_interval: Duration,
        frame_limit: Option<u64>,
    ) -> CaptureResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CaptureError::session_configuration(format!(
                "still image {} does not exist",
                path.display()
            )));
        }
        let image = image::open(path)
            .map_err(|err| {
                CaptureError::session_configuration(format!(
                    "failed to load still image {}: {err}",
                    path.display()
                ))
            })?
            .to_rgba8();
        Ok(Self {
            input: path.to_path_buf(),
            image,
            frame_interval,
            frame_limit,
        })
    }

    fn native_resolution(&self) -> Resolution {
        Resolution::new(self.image.width(), self.image.height())
    }
}

impl CaptureProvider for StillImageProvider {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    /// The image is downscaled on demand, so every smaller fixed tier is on
    /// offer next to the native size.
    fn supported_resolutions(&self) -> CaptureResult<Vec<Resolution>> {
        let native = self.native_resolution();
        let mut supported = vec![native];
        supported.extend(
            SessionPreset::fixed_presets()
                .iter()
                .filter_map(SessionPreset::fixed_resolution)
                .filter(|res| {
                    *res != native && res.width <= native.width && res.height <= native.height
                }),
        );
        Ok(supported)
    }

    fn run(
        self: Box<Self>,
        format: SessionFormat,
        publisher: FramePublisher,
        stop: StopReceiver,
    ) -> CaptureResult<()> {
        let native = self.native_resolution();
        let StillImageProvider {
            input,
            image,
            frame_interval,
            frame_limit,
        } = *self;

        let target = format.resolution;
        let rgba = if target == native {
            image
        } else {
            log::debug!("scaling {} from {native} to {target}", input.display());
            imageops::resize(&image, target.width, target.height, FilterType::Triangle)
        };
        let template = rgba_to_frame(
            rgba.as_raw(),
            target.width,
            target.height,
            format.pixel_format,
        )?
        .with_orientation(format.orientation);

        let mut index = 0u64;
        loop {
            if stop_requested(&stop) {
                break;
            }
            if frame_limit.is_some_and(|limit| index >= limit) {
                break;
            }
            let frame = template.clone().with_frame_index(Some(index));
            if publisher.publish(frame) == PublishOutcome::Closed {
                break;
            }
            index += 1;
            thread::sleep(frame_interval);
        }
        Ok(())
    }
}

pub fn boxed_still(config: &Configuration) -> CaptureResult<DynCaptureProvider> {
    let path = config.input.clone().ok_or_else(|| {
        CaptureError::configuration("still backend requires an input image (CAMTEXT_INPUT)")
    })?;
    Ok(Box::new(StillImageProvider::open(
        path,
        config.frame_interval,
        config.frame_limit,
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_session_configuration_error() {
        let result = StillImageProvider::open(
            "/tmp/camtext-nonexistent-image.png",
            Duration::from_millis(1),
            None,
        );
        assert!(matches!(
            result,
            Err(CaptureError::SessionConfiguration { .. })
        ));
    }

    #[test]
    fn offers_native_size_and_smaller_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sign.png");
        RgbaImage::from_pixel(1280, 720, image::Rgba([255, 255, 255, 255]))
            .save(&path)
            .unwrap();

        let provider = StillImageProvider::open(&path, Duration::from_millis(1), None).unwrap();
        let supported = provider.supported_resolutions().unwrap();
        assert_eq!(supported[0], Resolution::new(1280, 720));
        assert!(supported.contains(&Resolution::new(640, 480)));
        assert!(!supported.contains(&Resolution::new(1920, 1080)));
    }

    #[test]
    fn tall_image_is_never_offered_a_wider_tier() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("banner.png");
        RgbaImage::from_pixel(1000, 3000, image::Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let provider = StillImageProvider::open(&path, Duration::from_millis(1), None).unwrap();
        let supported = provider.supported_resolutions().unwrap();
        assert_eq!(supported[0], Resolution::new(1000, 3000));
        assert!(!supported.contains(&Resolution::new(1920, 1080)));
        assert!(!supported.contains(&Resolution::new(1280, 720)));
        assert!(supported.contains(&Resolution::new(640, 480)));
        assert!(
            supported
                .iter()
                .all(|res| res.width <= 1000 && res.height <= 3000)
        );
    }
}
