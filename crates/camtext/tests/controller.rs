use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use camtext::authorization::{
    AuthorizationPrompt, DenialChoice, DenialNotice, EXIT_PERMISSION_DENIED, SettingsLauncher,
};
use camtext::cli::{CliArgs, CliSources};
use camtext::controller::{Startup, build_engine, run, start_session};
use camtext::settings::{EffectiveSettings, resolve_settings_from_str};
use camtext_capture::{AuthorizationStatus, Backend};
use camtext_ocr::OcrEngine;
use clap::Parser;

struct ScriptedPrompt {
    choice: DenialChoice,
    shown: AtomicUsize,
}

impl ScriptedPrompt {
    fn new(choice: DenialChoice) -> Self {
        Self {
            choice,
            shown: AtomicUsize::new(0),
        }
    }
}

impl AuthorizationPrompt for ScriptedPrompt {
    fn choose(&self, _: &DenialNotice) -> DenialChoice {
        self.shown.fetch_add(1, Ordering::SeqCst);
        self.choice
    }
}

#[derive(Default)]
struct RecordingLauncher {
    opened: AtomicUsize,
}

impl SettingsLauncher for RecordingLauncher {
    fn open_settings(&self) -> io::Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Answers only once another task on the same runtime got to run.
#[derive(Default)]
struct RuntimeAwarePrompt {
    runtime_progressed: AtomicBool,
}

impl AuthorizationPrompt for RuntimeAwarePrompt {
    fn choose(&self, _: &DenialNotice) -> DenialChoice {
        let (tx, rx) = std::sync::mpsc::channel();
        tokio::runtime::Handle::current().spawn(async move {
            let _ = tx.send(());
        });
        let progressed = rx.recv_timeout(Duration::from_secs(2)).is_ok();
        self.runtime_progressed.store(progressed, Ordering::SeqCst);
        DenialChoice::Terminate
    }
}

fn mock_settings(extra: &[&str]) -> EffectiveSettings {
    let mut argv = vec![
        "camtext",
        "--backend",
        "mock",
        "--frame-interval-ms",
        "2",
        "--ocr-backend",
        "noop",
        "--no-progress",
    ];
    argv.extend_from_slice(extra);
    let cli = CliArgs::parse_from(argv);
    let sources = CliSources {
        ocr_backend_from_cli: true,
        ..CliSources::default()
    };
    resolve_settings_from_str(&cli, &sources, "", Path::new("/etc/camtext/config.toml")).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn run_finishes_when_the_source_ends() {
    let settings = mock_settings(&["--frame-limit", "3"]);
    assert_eq!(settings.capture.backend, Backend::Mock);

    let prompt = ScriptedPrompt::new(DenialChoice::Terminate);
    let launcher = RecordingLauncher::default();
    let code = run(settings, &prompt, &launcher).await.unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn denied_camera_with_terminate_exits_without_capturing() {
    let mut settings = mock_settings(&["--frame-limit", "3"]);
    settings.capture.mock_authorization = AuthorizationStatus::Denied;

    let prompt = ScriptedPrompt::new(DenialChoice::Terminate);
    let launcher = RecordingLauncher::default();
    let code = run(settings, &prompt, &launcher).await.unwrap();
    assert_eq!(code, ExitCode::from(EXIT_PERMISSION_DENIED));
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn opening_settings_rechecks_authorization_once() {
    let mut settings = mock_settings(&[]);
    settings.capture.mock_authorization = AuthorizationStatus::Restricted;

    let prompt = ScriptedPrompt::new(DenialChoice::OpenSettings);
    let launcher = RecordingLauncher::default();
    match start_session(&settings.capture, &prompt, &launcher).unwrap() {
        Startup::Exit(code) => assert_eq!(code, EXIT_PERMISSION_DENIED),
        Startup::Started(_) => panic!("capture must not start without authorization"),
    }
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 2);
    assert_eq!(launcher.opened.load(Ordering::SeqCst), 2);
}

#[test]
fn granted_camera_starts_without_prompting() {
    let settings = mock_settings(&["--frame-limit", "1"]);
    let prompt = ScriptedPrompt::new(DenialChoice::Terminate);
    let launcher = RecordingLauncher::default();
    match start_session(&settings.capture, &prompt, &launcher).unwrap() {
        Startup::Started(session) => {
            assert_eq!(session.backend(), "mock");
            session.join().unwrap();
        }
        Startup::Exit(code) => panic!("unexpected exit {code}"),
    }
    assert_eq!(prompt.shown.load(Ordering::SeqCst), 0);
}

#[test]
fn noop_engine_is_always_available() {
    let engine = build_engine(camtext::cli::OcrBackend::Noop).unwrap();
    assert_eq!(engine.name(), "noop");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn blocking_denial_prompt_leaves_the_runtime_running() {
    let mut settings = mock_settings(&["--frame-limit", "1"]);
    settings.capture.mock_authorization = AuthorizationStatus::Denied;

    let prompt = Arc::new(RuntimeAwarePrompt::default());
    let launcher = Arc::new(RecordingLauncher::default());
    let session = {
        let prompt = Arc::clone(&prompt);
        let launcher = Arc::clone(&launcher);
        tokio::spawn(async move { run(settings, prompt.as_ref(), launcher.as_ref()).await })
    };

    let code = session.await.unwrap().unwrap();
    assert_eq!(code, ExitCode::from(EXIT_PERMISSION_DENIED));
    assert!(prompt.runtime_progressed.load(Ordering::SeqCst));
}
