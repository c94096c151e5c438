use std::fmt;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use camtext_capture::{Backend, CaptureError, CaptureSession, Configuration};
use camtext_ocr::{NoopOcrEngine, OcrEngine, OcrError};
use futures_util::StreamExt;
use thiserror::Error;

use crate::authorization::{
    AuthorizationPrompt, DenialNotice, DenialResolution, EXIT_PERMISSION_DENIED,
    SettingsLauncher, resolve_denial,
};
use crate::cli::OcrBackend;
use crate::output::OutputWriter;
use crate::pipeline::{RecognitionEvent, RecognitionPipeline};
use crate::progress::StatusLine;
use crate::settings::{ConfigError, EffectiveSettings};

#[derive(Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("OCR engine failed: {0}")]
    Ocr(#[from] OcrError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error("OCR backend '{backend}' is not available in this build")]
    EngineUnavailable { backend: &'static str },
    #[error("capture worker failed: {message}")]
    Worker { message: String },
}

// `main` reports errors through `Debug`; keep it readable.
impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Outcome of bringing up the capture session.
pub enum Startup {
    Started(CaptureSession),
    /// Authorization was refused and the run should end with this status.
    Exit(u8),
}

pub fn build_engine(backend: OcrBackend) -> Result<Arc<dyn OcrEngine>, AppError> {
    match backend {
        OcrBackend::Noop => Ok(Arc::new(NoopOcrEngine)),
        OcrBackend::Vision => {
            platform_engine().ok_or(AppError::EngineUnavailable { backend: "vision" })
        }
        OcrBackend::Auto => Ok(platform_engine().unwrap_or_else(|| {
            log::warn!("no platform OCR engine in this build; frames will yield no text");
            Arc::new(NoopOcrEngine)
        })),
    }
}

#[cfg(all(feature = "ocr-vision", target_os = "macos"))]
fn platform_engine() -> Option<Arc<dyn OcrEngine>> {
    Some(Arc::new(camtext_ocr::VisionOcrEngine::new()))
}

#[cfg(not(all(feature = "ocr-vision", target_os = "macos")))]
fn platform_engine() -> Option<Arc<dyn OcrEngine>> {
    None
}

/// Starts capture. A denied authorization turns into the user's choice;
/// after settings are opened the check runs exactly once more.
pub fn start_session(
    config: &Configuration,
    prompt: &dyn AuthorizationPrompt,
    launcher: &dyn SettingsLauncher,
) -> Result<Startup, CaptureError> {
    let mut retried = false;
    loop {
        let authorizer = config.authorizer();
        match CaptureSession::start(config, authorizer.as_ref()) {
            Ok(session) => return Ok(Startup::Started(session)),
            Err(CaptureError::AuthorizationDenied { status }) => {
                let notice = DenialNotice::for_status(status);
                match resolve_denial(prompt, launcher, &notice) {
                    DenialResolution::Retry if !retried => {
                        retried = true;
                        log::info!("checking camera authorization again");
                    }
                    DenialResolution::Retry => return Ok(Startup::Exit(EXIT_PERMISSION_DENIED)),
                    DenialResolution::Exit(code) => return Ok(Startup::Exit(code)),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

/// Drives a whole session. Must run on a multi-thread runtime: the denial
/// prompt blocks on the terminal and is moved off the async workers.
pub async fn run(
    settings: EffectiveSettings,
    prompt: &dyn AuthorizationPrompt,
    launcher: &dyn SettingsLauncher,
) -> Result<ExitCode, AppError> {
    let EffectiveSettings {
        capture,
        ocr,
        output,
        config_path,
    } = settings;
    if let Some(path) = config_path {
        log::info!("using configuration {}", path.display());
    }

    let engine = build_engine(ocr.backend)?;
    let pipeline = RecognitionPipeline::new(engine, ocr.options).with_timeout(ocr.timeout);
    log::info!("recognizing text with engine '{}'", pipeline.engine_name());

    let startup = tokio::task::block_in_place(|| start_session(&capture, prompt, launcher))?;
    let mut session = match startup {
        Startup::Started(session) => session,
        Startup::Exit(code) => return Ok(ExitCode::from(code)),
    };
    let controller = session.controller();
    let frames = session.take_frames().ok_or_else(|| AppError::Worker {
        message: "frame receiver already taken".to_string(),
    })?;
    let mut events = pipeline.attach(frames, controller.subscribe());

    let interrupt = controller.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received; stopping capture");
            interrupt.stop();
        }
    });

    let format = *session.format();
    let mut status = StatusLine::new(output.progress);
    status.set_source(format!(
        "{} {} {}",
        session.backend(),
        format.resolution,
        format.pixel_format
    ));
    let mut writer = OutputWriter::new(output.format, output.show_empty, io::stdout());
    let mut write_error = None;

    while let Some(event) = events.next().await {
        let discarded = controller.slot_stats().discarded;
        match event {
            RecognitionEvent::Recognized(recognition) => {
                status.recognized(discarded);
                if let Err(err) = status.suspend(|| writer.write(&recognition)) {
                    if err.kind() == io::ErrorKind::BrokenPipe {
                        log::debug!("output closed; stopping capture");
                    } else {
                        write_error = Some(err);
                    }
                    controller.stop();
                    break;
                }
            }
            RecognitionEvent::Skipped { .. } => status.skipped(discarded),
        }
    }
    signal_task.abort();

    let discarded = controller.slot_stats().discarded;
    status.finish(discarded);
    let (recognized, skipped) = status.counts();
    log::info!(
        "session ended: {recognized} frames recognized, {skipped} skipped, {discarded} late frames dropped"
    );

    tokio::task::spawn_blocking(move || session.join())
        .await
        .map_err(|err| AppError::Worker {
            message: err.to_string(),
        })??;
    if let Some(err) = write_error {
        return Err(err.into());
    }
    Ok(ExitCode::SUCCESS)
}

pub fn display_available_backends() {
    let names: Vec<&'static str> = Configuration::available_backends()
        .iter()
        .map(Backend::as_str)
        .collect();
    println!("available backends: {}", names.join(", "));
}
