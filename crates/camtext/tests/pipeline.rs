use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use camtext::{RecognitionError, RecognitionEvent, RecognitionPipeline, RecognitionStream};
use camtext_capture::latest_channel;
use camtext_ocr::{
    NoopOcrEngine, OcrCandidate, OcrEngine, OcrError, OcrObservation, OcrRequest, OcrResponse,
    RecognitionOptions,
};
use camtext_types::{Frame, NormalizedRect};
use futures_util::StreamExt;
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(5);

fn frame(index: u64) -> Frame {
    let (width, height) = (16usize, 8usize);
    let data = vec![128u8; width * height + width * height / 2];
    Frame::from_nv12_owned(width as u32, height as u32, width, None, data)
        .unwrap()
        .with_frame_index(Some(index))
}

fn sign() -> OcrResponse {
    OcrResponse::new(vec![OcrObservation::new(
        NormalizedRect::new(0.2, 0.4, 0.6, 0.2),
        vec![
            OcrCandidate::new("PLATFORM 9", 0.93),
            OcrCandidate::new("PLATF0RM 9", 0.41),
        ],
    )])
}

async fn next_event(events: &mut RecognitionStream) -> Option<RecognitionEvent> {
    tokio::time::timeout(WAIT, events.next())
        .await
        .expect("pipeline stalled")
}

struct SignEngine;

impl OcrEngine for SignEngine {
    fn name(&self) -> &'static str {
        "sign"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(sign())
    }
}

/// Fails its first call, then behaves like `SignEngine`.
#[derive(Default)]
struct FlakyEngine {
    calls: AtomicUsize,
}

impl OcrEngine for FlakyEngine {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(OcrError::backend("flaky", "request rejected"));
        }
        Ok(sign())
    }
}

struct SlowEngine {
    started: AtomicBool,
    delay: Duration,
}

impl SlowEngine {
    fn new(delay: Duration) -> Self {
        Self {
            started: AtomicBool::new(false),
            delay,
        }
    }
}

impl OcrEngine for SlowEngine {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        self.started.store(true, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(sign())
    }
}

/// Sleeps through every call and records how many calls overlapped.
struct OverrunningEngine {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl OverrunningEngine {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

impl OcrEngine for OverrunningEngine {
    fn name(&self) -> &'static str {
        "overrunning"
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(sign())
    }
}

struct SlowWarmUpEngine;

impl OcrEngine for SlowWarmUpEngine {
    fn name(&self) -> &'static str {
        "slow-warm-up"
    }

    fn warm_up(&self) -> Result<(), OcrError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(())
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(sign())
    }
}

struct ColdEngine;

impl OcrEngine for ColdEngine {
    fn name(&self) -> &'static str {
        "cold"
    }

    fn warm_up(&self) -> Result<(), OcrError> {
        Err(OcrError::backend("cold", "model missing"))
    }

    fn recognize(&self, _: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        Ok(sign())
    }
}

#[test]
fn frame_without_text_yields_no_regions() {
    let pipeline = RecognitionPipeline::new(Arc::new(NoopOcrEngine), RecognitionOptions::default());
    let recognition = pipeline.recognize_frame(&frame(3)).unwrap();
    assert!(recognition.regions.is_empty());
    assert_eq!(recognition.frame_index, Some(3));
    assert_eq!(recognition.resolution.width, 16);
}

#[test]
fn one_text_block_yields_its_best_candidate() {
    let pipeline = RecognitionPipeline::new(Arc::new(SignEngine), RecognitionOptions::default());
    let recognition = pipeline.recognize_frame(&frame(0)).unwrap();
    assert_eq!(recognition.regions.len(), 1);
    let region = &recognition.regions[0];
    assert_eq!(region.text, "PLATFORM 9");
    assert!((region.confidence - 0.93).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn streams_results_until_the_source_ends() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut events = RecognitionPipeline::new(Arc::new(SignEngine), RecognitionOptions::default())
        .attach(frames, stop_rx);

    publisher.publish(frame(0));
    match next_event(&mut events).await {
        Some(RecognitionEvent::Recognized(recognition)) => {
            assert_eq!(recognition.frame_index, Some(0));
            assert_eq!(recognition.regions.len(), 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    drop(publisher);
    assert!(next_event(&mut events).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_failure_skips_the_frame_and_keeps_going() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut events =
        RecognitionPipeline::new(Arc::new(FlakyEngine::default()), RecognitionOptions::default())
            .attach(frames, stop_rx);

    publisher.publish(frame(0));
    match next_event(&mut events).await {
        Some(RecognitionEvent::Skipped { frame_index, error }) => {
            assert_eq!(frame_index, Some(0));
            assert!(matches!(error, RecognitionError::Invocation(_)));
        }
        other => panic!("expected a skipped frame, got {other:?}"),
    }

    publisher.publish(frame(1));
    match next_event(&mut events).await {
        Some(RecognitionEvent::Recognized(recognition)) => {
            assert_eq!(recognition.frame_index, Some(1));
            assert_eq!(recognition.regions[0].text, "PLATFORM 9");
        }
        other => panic!("expected a recognized frame, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn overrunning_recognition_is_reported_as_timed_out() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(300)));
    let mut events = RecognitionPipeline::new(engine, RecognitionOptions::default())
        .with_timeout(Some(Duration::from_millis(20)))
        .attach(frames, stop_rx);

    publisher.publish(frame(7));
    match next_event(&mut events).await {
        Some(RecognitionEvent::Skipped { frame_index, error }) => {
            assert_eq!(frame_index, Some(7));
            assert!(matches!(error, RecognitionError::TimedOut { .. }));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_during_recognition_drops_the_result() {
    let (publisher, frames) = latest_channel();
    let (stop_tx, stop_rx) = watch::channel(false);
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(200)));
    let mut events = RecognitionPipeline::new(engine.clone(), RecognitionOptions::default())
        .attach(frames, stop_rx);

    publisher.publish(frame(0));
    tokio::time::timeout(WAIT, async {
        while !engine.started.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("recognition started");

    stop_tx.send(true).unwrap();
    publisher.publish(frame(1));
    assert!(next_event(&mut events).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_warm_up_is_reported_once() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut events = RecognitionPipeline::new(Arc::new(ColdEngine), RecognitionOptions::default())
        .attach(frames, stop_rx);
    publisher.publish(frame(0));

    match next_event(&mut events).await {
        Some(RecognitionEvent::Skipped { frame_index, error }) => {
            assert_eq!(frame_index, None);
            assert!(matches!(error, RecognitionError::Invocation(_)));
        }
        other => panic!("expected a warm-up failure, got {other:?}"),
    }
    assert!(next_event(&mut events).await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn timed_out_calls_are_waited_out_before_the_next_frame() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let engine = Arc::new(OverrunningEngine::new(Duration::from_millis(150)));
    let mut events = RecognitionPipeline::new(engine.clone(), RecognitionOptions::default())
        .with_timeout(Some(Duration::from_millis(10)))
        .attach(frames, stop_rx);

    for index in 0..4 {
        publisher.publish(frame(index));
        match next_event(&mut events).await {
            Some(RecognitionEvent::Skipped { frame_index, error }) => {
                assert_eq!(frame_index, Some(index));
                assert!(matches!(error, RecognitionError::TimedOut { .. }));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn frames_arriving_during_an_overrun_collapse_to_the_latest() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let engine = Arc::new(OverrunningEngine::new(Duration::from_millis(250)));
    let mut events = RecognitionPipeline::new(engine.clone(), RecognitionOptions::default())
        .with_timeout(Some(Duration::from_millis(10)))
        .attach(frames, stop_rx);

    publisher.publish(frame(0));
    assert!(matches!(
        next_event(&mut events).await,
        Some(RecognitionEvent::Skipped { frame_index: Some(0), .. })
    ));

    // The first call is still sleeping; neither of these reaches the engine yet.
    publisher.publish(frame(1));
    publisher.publish(frame(2));
    match next_event(&mut events).await {
        Some(RecognitionEvent::Skipped { frame_index, .. }) => assert_eq!(frame_index, Some(2)),
        other => panic!("expected the latest frame, got {other:?}"),
    }
    assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_warm_up_is_bounded_by_the_time_limit() {
    let (publisher, frames) = latest_channel();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let mut events =
        RecognitionPipeline::new(Arc::new(SlowWarmUpEngine), RecognitionOptions::default())
            .with_timeout(Some(Duration::from_millis(20)))
            .attach(frames, stop_rx);
    publisher.publish(frame(0));

    match next_event(&mut events).await {
        Some(RecognitionEvent::Skipped { frame_index, error }) => {
            assert_eq!(frame_index, None);
            assert!(matches!(error, RecognitionError::TimedOut { .. }));
        }
        other => panic!("expected a warm-up timeout, got {other:?}"),
    }
    assert!(next_event(&mut events).await.is_none());
}
