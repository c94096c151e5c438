#![cfg(feature = "backend-gstreamer")]

use std::time::Duration;

use gstreamer as gst;
use gstreamer::MessageView;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;

use crate::config::{Configuration, SessionPreset};
use crate::core::{
    CaptureError, CaptureProvider, CaptureResult, DynCaptureProvider, FramePublisher,
    SessionFormat, StopReceiver, stop_requested,
};
use crate::slot::PublishOutcome;
use camtext_types::{Frame, PixelFormat, Resolution};

const BACKEND_NAME: &str = "gstreamer";
const PULL_TIMEOUT_MS: u64 = 100;

/// Live camera discovered through the GStreamer device monitor.
pub struct GStreamerProvider {
    device: gst::Device,
    display_name: String,
    caps: gst::Caps,
}

impl GStreamerProvider {
    pub fn open(device: Option<&str>) -> CaptureResult<Self> {
        gst::init().map_err(|err| backend_error(err.to_string()))?;

        let monitor = gst::DeviceMonitor::new();
        monitor.add_filter(Some("Video/Source"), None);
        monitor.start().map_err(|err| {
            CaptureError::session_configuration(format!("failed to enumerate cameras: {err}"))
        })?;
        let devices = monitor.devices();
        monitor.stop();

        let selected = devices
            .into_iter()
            .find(|candidate| device.is_none_or(|name| device_matches(candidate, name)))
            .ok_or_else(|| match device {
                Some(name) => {
                    CaptureError::session_configuration(format!("no capture device matching '{name}'"))
                }
                None => CaptureError::session_configuration("no capture device available"),
            })?;

        let caps = selected.caps().ok_or_else(|| {
            CaptureError::session_configuration("capture device reports no capabilities")
        })?;
        let display_name = selected.display_name().to_string();
        log::debug!("selected capture device '{display_name}'");

        Ok(Self {
            device: selected,
            display_name,
            caps,
        })
    }

    fn build_pipeline(
        &self,
        format: &SessionFormat,
    ) -> CaptureResult<(gst::Pipeline, gst_app::AppSink)> {
        let src = self
            .device
            .create_element(None)
            .map_err(|err| backend_error(err.to_string()))?;
        let convert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|err| backend_error(err.to_string()))?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", caps_format(format.pixel_format))
            .field("width", format.resolution.width as i32)
            .field("height", format.resolution.height as i32)
            .build();
        // One buffer, newest wins: the sink itself never queues late frames.
        let appsink = gst_app::AppSink::builder()
            .caps(&caps)
            .drop(true)
            .max_buffers(1)
            .build();
        appsink.set_property("sync", false);

        let pipeline = gst::Pipeline::new();
        pipeline
            .add_many([&src, &convert, appsink.upcast_ref()])
            .map_err(|err| backend_error(err.to_string()))?;
        gst::Element::link_many([&src, &convert, appsink.upcast_ref()])
            .map_err(|err| backend_error(err.to_string()))?;
        Ok((pipeline, appsink))
    }
}

impl CaptureProvider for GStreamerProvider {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn supported_resolutions(&self) -> CaptureResult<Vec<Resolution>> {
        Ok(caps_resolutions(&self.caps))
    }

    fn run(
        self: Box<Self>,
        format: SessionFormat,
        publisher: FramePublisher,
        stop: StopReceiver,
    ) -> CaptureResult<()> {
        let (pipeline, appsink) = self.build_pipeline(&format)?;
        pipeline
            .set_state(gst::State::Playing)
            .map_err(|err| backend_error(format!("failed to start pipeline: {err}")))?;
        log::info!(
            "capturing from '{}' at {}",
            self.display_name,
            format.resolution
        );

        let result = (|| {
            let bus = pipeline
                .bus()
                .ok_or_else(|| backend_error("pipeline missing bus"))?;
            let mut index = 0u64;
            loop {
                if stop_requested(&stop) {
                    break;
                }
                if drain_bus(&bus)? {
                    break;
                }
                let Some(sample) =
                    appsink.try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
                else {
                    if appsink.is_eos() {
                        break;
                    }
                    continue;
                };
                let frame = frame_from_sample(&sample, format.pixel_format)?
                    .with_frame_index(Some(index))
                    .with_orientation(format.orientation);
                if publisher.publish(frame) == PublishOutcome::Closed {
                    break;
                }
                index += 1;
            }
            Ok(())
        })();

        pipeline
            .set_state(gst::State::Null)
            .map_err(|err| backend_error(format!("failed to stop pipeline: {err}")))?;
        result
    }
}

fn device_matches(device: &gst::Device, name: &str) -> bool {
    if device.display_name().as_str() == name {
        return true;
    }
    let Some(properties) = device.properties() else {
        return false;
    };
    ["api.v4l2.path", "device.path"].iter().any(|key| {
        properties
            .get::<String>(key)
            .is_ok_and(|path| path == name)
    })
}

fn caps_format(format: PixelFormat) -> &'static str {
    match format {
        PixelFormat::Nv12 => "NV12",
        PixelFormat::Bgra => "BGRA",
    }
}

/// Fixed sizes listed in the caps, plus every preset tier inside a size range.
fn caps_resolutions(caps: &gst::CapsRef) -> Vec<Resolution> {
    let mut resolutions = Vec::new();
    for structure in caps.iter() {
        if let (Ok(width), Ok(height)) = (
            structure.get::<i32>("width"),
            structure.get::<i32>("height"),
        ) {
            if width > 0 && height > 0 {
                resolutions.push(Resolution::new(width as u32, height as u32));
            }
            continue;
        }
        if let (Ok(width), Ok(height)) = (
            structure.get::<gst::IntRange<i32>>("width"),
            structure.get::<gst::IntRange<i32>>("height"),
        ) {
            for preset in SessionPreset::fixed_presets() {
                let Some(res) = preset.fixed_resolution() else {
                    continue;
                };
                let (w, h) = (res.width as i32, res.height as i32);
                if (width.min()..=width.max()).contains(&w)
                    && (height.min()..=height.max()).contains(&h)
                {
                    resolutions.push(res);
                }
            }
        }
    }
    resolutions.sort();
    resolutions.dedup();
    resolutions
}

/// Returns `true` on end-of-stream; errors posted on the bus abort capture.
fn drain_bus(bus: &gst::Bus) -> CaptureResult<bool> {
    while let Some(msg) = bus.timed_pop_filtered(
        gst::ClockTime::ZERO,
        &[gst::MessageType::Error, gst::MessageType::Eos],
    ) {
        match msg.view() {
            MessageView::Error(err) => return Err(backend_error(err.error().to_string())),
            MessageView::Eos(_) => return Ok(true),
            _ => {}
        }
    }
    Ok(false)
}

fn frame_from_sample(sample: &gst::Sample, pixel_format: PixelFormat) -> CaptureResult<Frame> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| backend_error("appsink sample missing buffer"))?;
    let caps = sample
        .caps()
        .ok_or_else(|| backend_error("appsink sample missing caps"))?;
    let info =
        gst_video::VideoInfo::from_caps(caps).map_err(|err| backend_error(err.to_string()))?;
    let map = buffer
        .map_readable()
        .map_err(|err| backend_error(err.to_string()))?;
    let data = map.as_slice();
    let width = info.width();
    let height = info.height() as usize;
    let timestamp = buffer.pts().map(|ts| Duration::from_nanos(ts.nseconds()));

    let frame = match pixel_format {
        PixelFormat::Bgra => {
            let stride = info.stride()[0] as usize;
            let offset = info.offset()[0];
            let plane = slice_plane(data, offset, stride * height)?;
            Frame::from_bgra_owned(width, info.height(), stride, timestamp, plane.to_vec())?
        }
        PixelFormat::Nv12 => {
            let y_stride = info.stride()[0] as usize;
            let uv_stride = info.stride()[1] as usize;
            let chroma_rows = height.div_ceil(2);
            let y_plane = slice_plane(data, info.offset()[0], y_stride * height)?;
            let uv_plane = slice_plane(data, info.offset()[1], uv_stride * chroma_rows)?;

            let mut packed = Vec::with_capacity(y_stride * (height + chroma_rows));
            packed.extend_from_slice(y_plane);
            let row_bytes = y_stride.min(uv_stride);
            for row in uv_plane.chunks(uv_stride).take(chroma_rows) {
                let start = packed.len();
                packed.extend_from_slice(&row[..row_bytes.min(row.len())]);
                packed.resize(start + y_stride, 128);
            }
            Frame::from_nv12_owned(width, info.height(), y_stride, timestamp, packed)?
        }
    };
    Ok(frame)
}

fn slice_plane(data: &[u8], offset: usize, len: usize) -> CaptureResult<&[u8]> {
    data.get(offset..offset + len).ok_or_else(|| {
        backend_error(format!(
            "incomplete plane: need {len} bytes at offset {offset}, buffer has {}",
            data.len()
        ))
    })
}

fn backend_error(message: impl Into<String>) -> CaptureError {
    CaptureError::backend_failure(BACKEND_NAME, message)
}

pub fn boxed_gstreamer(config: &Configuration) -> CaptureResult<DynCaptureProvider> {
    Ok(Box::new(GStreamerProvider::open(config.device.as_deref())?))
}
