use std::thread;
use std::time::Duration;

use crate::config::Configuration;
use crate::core::{
    CaptureProvider, CaptureResult, DynCaptureProvider, FramePublisher, SessionFormat,
    StopReceiver, stop_requested,
};
use crate::slot::PublishOutcome;
use camtext_types::{Frame, FrameResult, PixelFormat, Resolution};

const BACKEND_NAME: &str = "mock";

/// Synthetic camera producing moving gradients.
pub struct MockProvider {
    resolutions: Vec<Resolution>,
    frame_interval: Duration,
    frame_limit: Option<u64>,
}

impl MockProvider {
    /// Modes of a typical 1080p webcam; no 4K mode, so the default preference falls back.
    pub const DEFAULT_RESOLUTIONS: [Resolution; 3] = [
        Resolution::new(1920, 1080),
        Resolution::new(1280, 720),
        Resolution::new(640, 480),
    ];

    pub fn new(config: &Configuration) -> Self {
        let resolutions = config
            .mock_resolutions
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_RESOLUTIONS.to_vec());
        Self {
            resolutions,
            frame_interval: config.frame_interval,
            frame_limit: config.frame_limit,
        }
    }

    fn emit_frames(
        &self,
        format: SessionFormat,
        publisher: &FramePublisher,
        stop: &StopReceiver,
    ) -> CaptureResult<()> {
        let mut index = 0u64;
        loop {
            if stop_requested(stop) {
                break;
            }
            if self.frame_limit.is_some_and(|limit| index >= limit) {
                break;
            }
            let timestamp = frame_timestamp(self.frame_interval, index);
            let frame = synthesize(format, index, timestamp)?
                .with_frame_index(Some(index))
                .with_orientation(format.orientation);
            match publisher.publish(frame) {
                PublishOutcome::Closed => break,
                PublishOutcome::Replaced => {
                    log::trace!("mock frame {} replaced an unconsumed frame", index)
                }
                PublishOutcome::Delivered => {}
            }
            index += 1;
            thread::sleep(self.frame_interval);
        }
        Ok(())
    }
}

impl CaptureProvider for MockProvider {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn supported_resolutions(&self) -> CaptureResult<Vec<Resolution>> {
        Ok(self.resolutions.clone())
    }

    fn run(
        self: Box<Self>,
        format: SessionFormat,
        publisher: FramePublisher,
        stop: StopReceiver,
    ) -> CaptureResult<()> {
        self.emit_frames(format, &publisher, &stop)
    }
}

/// Capture time of frame `index`, saturating at `u64::MAX` seconds.
fn frame_timestamp(interval: Duration, index: u64) -> Duration {
    let nanos = interval.as_nanos().saturating_mul(u128::from(index));
    let secs = u64::try_from(nanos / 1_000_000_000).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % 1_000_000_000) as u32)
}

fn synthesize(format: SessionFormat, index: u64, timestamp: Duration) -> FrameResult<Frame> {
    let Resolution { width, height } = format.resolution;
    let shift = (index % 256) as usize;
    match format.pixel_format {
        PixelFormat::Nv12 => {
            let stride = width as usize;
            let luma_len = stride * height as usize;
            let chroma_len = stride * (height as usize).div_ceil(2);
            let mut data = vec![128u8; luma_len + chroma_len];
            for (row, chunk) in data[..luma_len].chunks_mut(stride).enumerate() {
                chunk.fill(((row + shift) % 256) as u8);
            }
            Frame::from_nv12_owned(width, height, stride, Some(timestamp), data)
        }
        PixelFormat::Bgra => {
            let stride = width as usize * 4;
            let mut data = vec![255u8; stride * height as usize];
            for (row, chunk) in data.chunks_mut(stride).enumerate() {
                let value = ((row + shift) % 256) as u8;
                for pixel in chunk.chunks_mut(4) {
                    pixel[0] = value;
                    pixel[1] = value;
                    pixel[2] = value;
                }
            }
            Frame::from_bgra_owned(width, height, stride, Some(timestamp), data)
        }
    }
}

pub fn boxed_mock(config: &Configuration) -> CaptureResult<DynCaptureProvider> {
    Ok(Box::new(MockProvider::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPreset;
    use crate::slot::latest_channel;
    use camtext_types::Orientation;
    use tokio::sync::watch;

    fn format(pixel_format: PixelFormat) -> SessionFormat {
        SessionFormat {
            preset: SessionPreset::Vga,
            resolution: Resolution::new(640, 480),
            pixel_format,
            orientation: Orientation::Right,
            fell_back: false,
        }
    }

    #[test]
    fn timestamps_keep_growing_past_u32_frame_indices() {
        let interval = Duration::from_millis(1);
        assert_eq!(frame_timestamp(interval, 3), Duration::from_millis(3));
        let index = (1u64 << 32) + 5;
        assert_eq!(frame_timestamp(interval, index), Duration::from_millis(index));
        assert!(frame_timestamp(interval, index) > frame_timestamp(interval, 5));
    }

    #[test]
    fn synthesized_nv12_frame_has_both_planes() {
        let frame = synthesize(format(PixelFormat::Nv12), 3, Duration::ZERO).unwrap();
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.data().len(), 640 * 480 + 640 * 240);
        assert_eq!(frame.y_plane().unwrap()[0], 3);
    }

    #[test]
    fn synthesized_bgra_frame_is_opaque() {
        let frame = synthesize(format(PixelFormat::Bgra), 0, Duration::ZERO).unwrap();
        assert_eq!(frame.stride(), 640 * 4);
        assert_eq!(frame.data()[3], 255);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn honours_frame_limit_and_tags_orientation() {
        let config = Configuration {
            frame_interval: Duration::from_millis(1),
            frame_limit: Some(3),
            ..Configuration::default()
        };
        let provider = Box::new(MockProvider::new(&config));
        let (publisher, mut receiver) = latest_channel();
        let (_stop_tx, stop_rx) = watch::channel(false);
        let worker = std::thread::spawn(move || {
            provider.run(format(PixelFormat::Nv12), publisher, stop_rx)
        });
        worker.join().unwrap().unwrap();

        let last = receiver.next().await.unwrap();
        assert_eq!(last.frame_index(), Some(2));
        assert_eq!(last.orientation(), Orientation::Right);
        assert!(receiver.next().await.is_none());
        assert_eq!(receiver.stats().published, 3);
    }
}
