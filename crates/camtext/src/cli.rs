use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrBackend {
    Auto,
    Vision,
    Noop,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrLevel {
    Fast,
    Accurate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Which defaulted arguments were actually typed on the command line.
#[derive(Debug, Default)]
pub struct CliSources {
    pub ocr_backend_from_cli: bool,
    pub ocr_level_from_cli: bool,
    pub ocr_languages_from_cli: bool,
    pub output_format_from_cli: bool,
}

impl CliSources {
    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            ocr_backend_from_cli: value_from_cli(matches, "ocr_backend"),
            ocr_level_from_cli: value_from_cli(matches, "ocr_level"),
            ocr_languages_from_cli: value_from_cli(matches, "ocr_languages"),
            output_format_from_cli: value_from_cli(matches, "format"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "camtext",
    about = "Stream camera frames through on-device text recognition",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Capture backend (mock, still, gstreamer)
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Print the list of compiled capture backends
    #[arg(long = "list-backends")]
    pub list_backends: bool,

    /// Camera device name or node (e.g. /dev/video0)
    #[arg(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Preferred session preset (photo, hd4k, hd1080, hd720, vga)
    #[arg(long = "preset")]
    pub preset: Option<String>,

    /// Preset used when the preferred one is unsupported ("none" disables fallback)
    #[arg(long = "fallback-preset")]
    pub fallback_preset: Option<String>,

    /// Pixel format delivered by the capture session (nv12, bgra)
    #[arg(long = "pixel-format")]
    pub pixel_format: Option<String>,

    /// Orientation tag applied to every frame (up, right, down, left)
    #[arg(long = "orientation")]
    pub orientation: Option<String>,

    /// Interval between synthetic or replayed frames, in milliseconds
    #[arg(
        long = "frame-interval-ms",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frame_interval_ms: Option<u64>,

    /// Stop after the source has produced this many frames
    #[arg(long = "frame-limit", value_parser = clap::value_parser!(u64).range(1..))]
    pub frame_limit: Option<u64>,

    /// OCR backend
    #[arg(long = "ocr-backend", value_enum, default_value_t = OcrBackend::Auto)]
    pub ocr_backend: OcrBackend,

    /// Recognition tier
    #[arg(long = "ocr-level", id = "ocr_level", value_enum, default_value_t = OcrLevel::Fast)]
    pub ocr_level: OcrLevel,

    /// Restrict OCR to the provided language (repeatable)
    #[arg(long = "ocr-language", id = "ocr_languages", value_name = "LANG")]
    pub ocr_languages: Vec<String>,

    /// Enable or disable language correction inside the OCR backend
    #[arg(
        long = "ocr-language-correction",
        id = "ocr_language_correction",
        value_parser = clap::value_parser!(bool)
    )]
    pub ocr_language_correction: Option<bool>,

    /// Per-frame recognition time limit in milliseconds (0 disables the limit)
    #[arg(long = "ocr-timeout-ms", value_parser = clap::value_parser!(u64))]
    pub ocr_timeout_ms: Option<u64>,

    /// Output format for recognized frames
    #[arg(long = "format", id = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also print frames in which no text was found
    #[arg(long = "show-empty")]
    pub show_empty: bool,

    /// Disable the status spinner
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    /// Still image to replay (implies --backend still when no backend is set)
    pub input: Option<PathBuf>,
}
