use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tokio::sync::watch;

use crate::authorization::{Authorizer, authorize};
use crate::config::Configuration;
use crate::core::{CaptureError, CaptureResult, FrameReceiver, SessionFormat, StopReceiver};
use crate::negotiate::negotiate_resolution;
use crate::slot::{SlotCloser, SlotStats, latest_channel};
use camtext_types::Frame;

/// Stops a running session from any thread.
#[derive(Clone)]
pub struct SessionController {
    stop_tx: Arc<watch::Sender<bool>>,
    slot: SlotCloser<Frame>,
}

impl SessionController {
    /// Halts frame delivery. Once this returns the consumer sees no further frames.
    pub fn stop(&self) {
        let already = self.stop_tx.send_replace(true);
        self.slot.close();
        if !already {
            log::info!("capture session stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn subscribe(&self) -> StopReceiver {
        self.stop_tx.subscribe()
    }

    pub fn slot_stats(&self) -> SlotStats {
        self.slot.stats()
    }
}

/// A running capture session: a worker thread publishing into the latest-frame slot.
pub struct CaptureSession {
    backend: &'static str,
    format: SessionFormat,
    controller: SessionController,
    frames: Option<FrameReceiver>,
    worker: Option<JoinHandle<CaptureResult<()>>>,
}

impl CaptureSession {
    /// Authorizes, opens the device, negotiates a format and starts capturing.
    ///
    /// Nothing is spawned unless every step succeeds.
    pub fn start(config: &Configuration, authorizer: &dyn Authorizer) -> CaptureResult<Self> {
        authorize(authorizer)?;
        config.validate()?;

        let started = Instant::now();
        let provider = config.create_provider()?;
        let backend = provider.name();
        let supported = provider.supported_resolutions()?;
        let negotiated = negotiate_resolution(&supported, &config.resolution)?;
        log::info!(
            "initialized capture backend '{backend}' at {} ({}) in {:.2?}",
            negotiated.resolution,
            negotiated.preset,
            started.elapsed()
        );

        let format = SessionFormat {
            preset: negotiated.preset,
            resolution: negotiated.resolution,
            pixel_format: config.pixel_format,
            orientation: config.orientation,
            fell_back: negotiated.fell_back,
        };

        let (publisher, receiver) = latest_channel::<Frame>();
        let (stop_tx, stop_rx) = watch::channel(false);
        let controller = SessionController {
            stop_tx: Arc::new(stop_tx),
            slot: publisher.closer(),
        };

        let worker = thread::Builder::new()
            .name(format!("camtext-capture-{backend}"))
            .spawn(move || {
                let result = provider.run(format, publisher, stop_rx);
                if let Err(err) = &result {
                    log::error!("capture backend '{backend}' stopped with error: {err}");
                } else {
                    log::debug!("capture backend '{backend}' finished");
                }
                result
            })?;

        Ok(Self {
            backend,
            format,
            controller,
            frames: Some(receiver),
            worker: Some(worker),
        })
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn format(&self) -> &SessionFormat {
        &self.format
    }

    pub fn controller(&self) -> SessionController {
        self.controller.clone()
    }

    /// Hands out the single consumer end of the frame slot. Later calls return `None`.
    pub fn take_frames(&mut self) -> Option<FrameReceiver> {
        self.frames.take()
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Stops the session and waits for the capture worker to exit.
    pub fn join(mut self) -> CaptureResult<()> {
        self.controller.stop();
        self.wait_worker()
    }

    /// Waits for the capture worker without requesting a stop, e.g. when the
    /// backend ends on its own after a frame limit.
    pub fn wait(mut self) -> CaptureResult<()> {
        self.wait_worker()
    }

    fn wait_worker(&mut self) -> CaptureResult<()> {
        let backend = self.backend;
        match self.worker.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                Err(CaptureError::backend_failure(
                    backend,
                    "capture worker panicked",
                ))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.controller.stop();
        }
    }
}
