use std::process::ExitCode;

use camtext::AppError;
use camtext::authorization::{SystemSettingsLauncher, TerminalPrompt};
use camtext::cli::parse_cli;
use camtext::controller::{display_available_backends, run};
use camtext::settings::resolve_settings;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<ExitCode, AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (cli, sources) = parse_cli();
    if cli.list_backends {
        display_available_backends();
        return Ok(ExitCode::SUCCESS);
    }

    let settings = resolve_settings(&cli, &sources)?;
    run(
        settings,
        &TerminalPrompt,
        &SystemSettingsLauncher::for_platform(),
    )
    .await
}
