//! Recognition stage: pulls the latest frame from the capture slot and turns
//! it into text regions, one frame at a time.

use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use camtext_capture::{FrameReceiver, StopReceiver};
use camtext_ocr::{OcrEngine, OcrError, OcrRequest, OcrResponse, RecognitionOptions};
use camtext_types::{Frame, Orientation, RecognizedTextRegion, Resolution};
use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

const EVENT_CHANNEL_CAPACITY: usize = 4;

type RecognitionTask = JoinHandle<Result<FrameRecognition, RecognitionError>>;

pub type RecognitionStream = Pin<Box<dyn Stream<Item = RecognitionEvent> + Send>>;

#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition failed: {0}")]
    Invocation(#[from] OcrError),
    #[error("recognition did not finish within {limit:?}")]
    TimedOut { limit: Duration },
    #[error("recognition worker failed: {message}")]
    Worker { message: String },
}

/// Text found in one frame.
#[derive(Debug, Clone)]
pub struct FrameRecognition {
    pub frame_index: Option<u64>,
    pub resolution: Resolution,
    pub orientation: Orientation,
    pub regions: Vec<RecognizedTextRegion>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum RecognitionEvent {
    Recognized(FrameRecognition),
    /// The frame was dropped; the pipeline moves on to the next one.
    Skipped {
        frame_index: Option<u64>,
        error: RecognitionError,
    },
}

#[derive(Clone)]
pub struct RecognitionPipeline {
    engine: Arc<dyn OcrEngine>,
    options: Arc<RecognitionOptions>,
    timeout: Option<Duration>,
}

impl RecognitionPipeline {
    pub fn new(engine: Arc<dyn OcrEngine>, options: RecognitionOptions) -> Self {
        Self {
            engine,
            options: Arc::new(options),
            timeout: None,
        }
    }

    /// Bounds each frame's recognition. A frame that overruns is reported as
    /// skipped; the engine call itself is left to finish in the background.
    pub fn with_timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Runs the engine on one frame and keeps the top candidate of every
    /// observation, in engine order.
    pub fn recognize_frame(&self, frame: &Frame) -> Result<FrameRecognition, RecognitionError> {
        let started = Instant::now();
        let request = OcrRequest::new(frame, &self.options);
        let response = self.engine.recognize(&request)?;
        Ok(FrameRecognition {
            frame_index: frame.frame_index(),
            resolution: frame.resolution(),
            orientation: request.orientation(),
            regions: top_regions(response),
            elapsed: started.elapsed(),
        })
    }

    /// Spawns the recognition worker. The stream ends once the frame slot
    /// closes or `stop` flips; results finishing after a stop are dropped.
    pub fn attach(self, frames: FrameReceiver, stop: StopReceiver) -> RecognitionStream {
        let (tx, rx) = mpsc::channel::<RecognitionEvent>(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(self.drive(frames, stop, tx));
        Box::pin(ReceiverStream::new(rx))
    }

    async fn drive(
        self,
        mut frames: FrameReceiver,
        mut stop: StopReceiver,
        tx: mpsc::Sender<RecognitionEvent>,
    ) {
        if let Err(error) = self.warm_up().await {
            log::error!("OCR engine '{}' failed to warm up: {error}", self.engine_name());
            let _ = tx
                .send(RecognitionEvent::Skipped {
                    frame_index: None,
                    error,
                })
                .await;
            return;
        }

        // A timed-out call keeps running on the blocking pool. The engine is
        // never entered again until it returns; frames published meanwhile
        // keep replacing each other in the slot.
        let mut abandoned: Option<RecognitionTask> = None;
        loop {
            if let Some(task) = abandoned.take() {
                log::debug!("waiting for an abandoned recognition to return");
                tokio::select! {
                    biased;
                    _ = stopped(&mut stop) => break,
                    _ = task => {}
                }
            }

            let frame = tokio::select! {
                biased;
                _ = stopped(&mut stop) => break,
                frame = frames.next() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let frame_index = frame.frame_index();
            let (outcome, overran) = self.recognize_in_background(frame).await;
            abandoned = overran;
            if stop_requested(&stop) {
                log::debug!("discarding recognition of frame {frame_index:?} after stop");
                break;
            }

            let event = match outcome {
                Ok(recognition) => RecognitionEvent::Recognized(recognition),
                Err(error) => {
                    log::warn!("skipping frame {frame_index:?}: {error}");
                    RecognitionEvent::Skipped { frame_index, error }
                }
            };
            if tx.send(event).await.is_err() {
                break;
            }
        }
        log::debug!("recognition worker finished");
    }

    async fn warm_up(&self) -> Result<(), RecognitionError> {
        let engine = Arc::clone(&self.engine);
        let task = tokio::task::spawn_blocking(move || engine.warm_up());
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => return Err(RecognitionError::TimedOut { limit }),
            },
            None => task.await,
        };
        match joined {
            Ok(result) => result.map_err(RecognitionError::from),
            Err(err) => Err(RecognitionError::Worker {
                message: err.to_string(),
            }),
        }
    }

    /// Runs one frame on the blocking pool. When the time limit hits, the
    /// still-running task is handed back so the caller can wait it out.
    async fn recognize_in_background(
        &self,
        frame: Frame,
    ) -> (
        Result<FrameRecognition, RecognitionError>,
        Option<RecognitionTask>,
    ) {
        let worker = self.clone();
        let mut task = tokio::task::spawn_blocking(move || worker.recognize_frame(&frame));
        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => return (Err(RecognitionError::TimedOut { limit }), Some(task)),
            },
            None => task.await,
        };
        let outcome = joined.unwrap_or_else(|err| {
            Err(RecognitionError::Worker {
                message: err.to_string(),
            })
        });
        (outcome, None)
    }
}

fn stop_requested(stop: &StopReceiver) -> bool {
    *stop.borrow()
}

/// Resolves once the stop flag is set. A dropped sender never resolves.
async fn stopped(stop: &mut StopReceiver) {
    let changed = stop.wait_for(|stopped| *stopped).await.map(|_| ());
    if changed.is_err() {
        std::future::pending::<()>().await;
    }
}

fn top_regions(response: OcrResponse) -> Vec<RecognizedTextRegion> {
    response
        .observations
        .iter()
        .filter_map(|observation| {
            let candidate = observation.top_candidate()?;
            Some(RecognizedTextRegion::new(
                candidate.text.clone(),
                candidate.confidence,
                observation.bounding_box.clamped(),
            ))
        })
        .collect()
}
