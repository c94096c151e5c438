//! What happens when the camera is not authorized.
//!
//! The prompt only reports the user's choice. Acting on it, including ending
//! the process, is left to the caller.

use std::io::{self, BufRead, Write};
use std::process::Command;

use camtext_capture::AuthorizationStatus;

/// Exit status used when the run ends without camera access (`EX_NOPERM`).
pub const EXIT_PERMISSION_DENIED: u8 = 77;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialNotice {
    pub status: AuthorizationStatus,
    pub title: String,
    pub message: String,
}

impl DenialNotice {
    pub fn for_status(status: AuthorizationStatus) -> Self {
        let message = match status {
            AuthorizationStatus::Restricted => {
                "Camera access is restricted on this system and cannot be granted from here."
            }
            _ => "Camera access can be enabled in the system privacy settings.",
        };
        Self {
            status,
            title: format!("camtext has no access to the camera ({status})"),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialChoice {
    OpenSettings,
    Terminate,
}

/// Blocking choice shown when authorization is refused.
pub trait AuthorizationPrompt: Send + Sync {
    fn choose(&self, notice: &DenialNotice) -> DenialChoice;
}

/// Opens the platform's camera privacy settings.
pub trait SettingsLauncher: Send + Sync {
    fn open_settings(&self) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialResolution {
    /// Settings were opened; authorization may be checked once more.
    Retry,
    /// The caller should end the run with this status.
    Exit(u8),
}

/// Shows the prompt and carries out the choice. A launcher failure is
/// reported and the choice offered once more.
pub fn resolve_denial(
    prompt: &dyn AuthorizationPrompt,
    launcher: &dyn SettingsLauncher,
    notice: &DenialNotice,
) -> DenialResolution {
    for attempt in 0..2 {
        match prompt.choose(notice) {
            DenialChoice::Terminate => {
                log::info!("camera access denied; terminating at user request");
                return DenialResolution::Exit(EXIT_PERMISSION_DENIED);
            }
            DenialChoice::OpenSettings => match launcher.open_settings() {
                Ok(()) => {
                    log::info!("opened camera privacy settings");
                    return DenialResolution::Retry;
                }
                Err(err) => {
                    log::warn!("failed to open camera privacy settings: {err}");
                    if attempt == 0 {
                        continue;
                    }
                }
            },
        }
    }
    DenialResolution::Exit(EXIT_PERMISSION_DENIED)
}

/// Asks on the terminal: stdin for the answer, stderr for the question.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl AuthorizationPrompt for TerminalPrompt {
    fn choose(&self, notice: &DenialNotice) -> DenialChoice {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stderr();
        read_choice(&mut input, &mut output, notice)
    }
}

const MAX_PROMPT_ATTEMPTS: usize = 3;

/// Reads the answer from `input`. End of input or repeated garbage counts as
/// terminate.
pub fn read_choice<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    notice: &DenialNotice,
) -> DenialChoice {
    let _ = writeln!(output, "{}", notice.title);
    let _ = writeln!(output, "{}", notice.message);
    for _ in 0..MAX_PROMPT_ATTEMPTS {
        let _ = write!(output, "[s] open settings  [q] quit: ");
        let _ = output.flush();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return DenialChoice::Terminate,
            Ok(_) => {}
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "s" | "settings" | "o" | "open" => return DenialChoice::OpenSettings,
            "q" | "quit" | "t" | "terminate" | "exit" => return DenialChoice::Terminate,
            other => {
                let _ = writeln!(output, "unrecognized answer '{other}'");
            }
        }
    }
    DenialChoice::Terminate
}

/// Launches the OS settings pane with an external command.
#[derive(Debug, Clone)]
pub struct SystemSettingsLauncher {
    program: String,
    args: Vec<String>,
}

impl SystemSettingsLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            Self::new(
                "open",
                vec![
                    "x-apple.systempreferences:com.apple.preference.security?Privacy_Camera"
                        .to_string(),
                ],
            )
        } else if cfg!(target_os = "windows") {
            Self::new(
                "cmd",
                vec![
                    "/C".to_string(),
                    "start".to_string(),
                    "ms-settings:privacy-webcam".to_string(),
                ],
            )
        } else {
            Self::new("gnome-control-center", vec!["camera".to_string()])
        }
    }
}

impl SettingsLauncher for SystemSettingsLauncher {
    fn open_settings(&self) -> io::Result<()> {
        let status = Command::new(&self.program).args(&self.args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}
