use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use camtext_capture::{Backend, CaptureError, Configuration, SessionPreset};
use camtext_ocr::{RecognitionLevel, RecognitionOptions};
use camtext_types::{Orientation, PixelFormat};
use clap::ValueEnum;
use directories::{BaseDirs, ProjectDirs};
use serde::Deserialize;

use crate::cli::{CliArgs, CliSources, OcrBackend, OcrLevel, OutputFormat};

pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_millis(1500);
const LOCAL_CONFIG_FILE: &str = "camtext.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    capture: Option<CaptureFileConfig>,
    ocr: Option<OcrFileConfig>,
    output: Option<OutputFileConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CaptureFileConfig {
    backend: Option<String>,
    device: Option<String>,
    preset: Option<String>,
    fallback_preset: Option<String>,
    pixel_format: Option<String>,
    orientation: Option<String>,
    input: Option<String>,
    frame_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcrFileConfig {
    backend: Option<String>,
    level: Option<String>,
    language_correction: Option<bool>,
    languages: Option<Vec<String>>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OutputFileConfig {
    format: Option<String>,
    show_empty: Option<bool>,
    progress: Option<bool>,
}

#[derive(Debug)]
pub struct EffectiveSettings {
    pub capture: Configuration,
    pub ocr: OcrSettings,
    pub output: OutputSettings,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub backend: OcrBackend,
    pub options: RecognitionOptions,
    /// `None` lets recognition run as long as it takes.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub show_empty: bool,
    pub progress: bool,
}

/// Capture configuration before file and CLI values are layered on top.
#[derive(Debug, Clone, Default)]
pub struct CaptureBase {
    pub config: Configuration,
    pub backend_explicit: bool,
    pub preset_explicit: bool,
}

impl CaptureBase {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config =
            Configuration::from_env().map_err(|source| ConfigError::Environment { source })?;
        Ok(Self {
            config,
            backend_explicit: env::var_os("CAMTEXT_BACKEND").is_some(),
            preset_explicit: env::var_os("CAMTEXT_PRESET").is_some(),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    InvalidValue {
        path: Option<PathBuf>,
        field: &'static str,
        value: String,
    },
    NotFound {
        path: PathBuf,
    },
    Environment {
        source: CaptureError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::InvalidValue { path, field, value } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "invalid value '{}' for '{}' in {}",
                        value,
                        field,
                        path.display()
                    )
                } else {
                    write!(f, "invalid value '{}' for '{}'", value, field)
                }
            }
            ConfigError::NotFound { path } => {
                write!(f, "config file {} does not exist", path.display())
            }
            ConfigError::Environment { source } => {
                write!(f, "invalid CAMTEXT_* environment setting: {}", source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Environment { source } => Some(source),
            ConfigError::InvalidValue { .. } => None,
            ConfigError::NotFound { .. } => None,
        }
    }
}

pub fn resolve_settings(
    cli: &CliArgs,
    sources: &CliSources,
) -> Result<EffectiveSettings, ConfigError> {
    let (file, config_path) = load_config(cli.config.as_deref())?;
    merge(cli, sources, file, config_path, CaptureBase::from_env()?)
}

/// Parses settings from TOML text, as if read from `path`. Environment
/// variables are not consulted.
pub fn resolve_settings_from_str(
    cli: &CliArgs,
    sources: &CliSources,
    contents: &str,
    path: &Path,
) -> Result<EffectiveSettings, ConfigError> {
    let path = path.to_path_buf();
    let file = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    merge(cli, sources, file, Some(path), CaptureBase::default())
}

fn load_config(path_override: Option<&Path>) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    if let Some(path) = path_override {
        let path = path.to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        return read_config(path);
    }

    for candidate in [local_config_path(), default_config_path()]
        .into_iter()
        .flatten()
    {
        if candidate.exists() {
            return read_config(candidate);
        }
    }
    Ok((FileConfig::default(), None))
}

fn read_config(path: PathBuf) -> Result<(FileConfig, Option<PathBuf>), ConfigError> {
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    log::debug!("loaded configuration from {}", path.display());
    Ok((config, Some(path)))
}

fn merge(
    cli: &CliArgs,
    sources: &CliSources,
    file: FileConfig,
    config_path: Option<PathBuf>,
    base: CaptureBase,
) -> Result<EffectiveSettings, ConfigError> {
    let config_dir = config_path
        .as_ref()
        .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));
    let path = config_path.as_ref();

    let FileConfig {
        capture: file_capture,
        ocr: file_ocr,
        output: file_output,
    } = file;
    let file_capture = file_capture.unwrap_or_default();
    let file_ocr = file_ocr.unwrap_or_default();
    let file_output = file_output.unwrap_or_default();

    let CaptureBase {
        config: mut capture,
        mut backend_explicit,
        mut preset_explicit,
    } = base;

    // Capture: file values first, then anything typed on the command line.
    if let Some(value) = normalize_string(file_capture.backend) {
        capture.backend = parse_value(&value, "capture.backend", path)?;
        backend_explicit = true;
    }
    if let Some(value) = normalize_string(file_capture.device) {
        capture.device = Some(value);
    }
    if let Some(value) = normalize_string(file_capture.preset) {
        capture.resolution.primary = parse_value(&value, "capture.preset", path)?;
        preset_explicit = true;
    }
    if let Some(value) = normalize_string(file_capture.fallback_preset) {
        capture.resolution.fallback = parse_fallback(&value, "capture.fallback_preset", path)?;
    }
    if let Some(value) = normalize_string(file_capture.pixel_format) {
        capture.pixel_format = parse_value::<PixelFormat>(&value, "capture.pixel_format", path)?;
    }
    if let Some(value) = normalize_string(file_capture.orientation) {
        capture.orientation = parse_value::<Orientation>(&value, "capture.orientation", path)?;
    }
    if let Some(value) = normalize_string(file_capture.input) {
        capture.input = resolve_path_from_config(value, config_dir.as_deref());
    }
    if let Some(ms) = file_capture.frame_interval_ms {
        if ms == 0 {
            return Err(ConfigError::InvalidValue {
                path: path.cloned(),
                field: "capture.frame_interval_ms",
                value: ms.to_string(),
            });
        }
        capture.frame_interval = Duration::from_millis(ms);
    }

    if let Some(value) = normalize_string(cli.backend.clone()) {
        capture.backend = parse_value(&value, "--backend", None)?;
        backend_explicit = true;
    }
    if let Some(value) = normalize_string(cli.device.clone()) {
        capture.device = Some(value);
    }
    if let Some(value) = normalize_string(cli.preset.clone()) {
        capture.resolution.primary = parse_value(&value, "--preset", None)?;
        preset_explicit = true;
    }
    if let Some(value) = normalize_string(cli.fallback_preset.clone()) {
        capture.resolution.fallback = parse_fallback(&value, "--fallback-preset", None)?;
    }
    if let Some(value) = normalize_string(cli.pixel_format.clone()) {
        capture.pixel_format = parse_value::<PixelFormat>(&value, "--pixel-format", None)?;
    }
    if let Some(value) = normalize_string(cli.orientation.clone()) {
        capture.orientation = parse_value::<Orientation>(&value, "--orientation", None)?;
    }
    if let Some(input) = cli.input.clone() {
        capture.input = Some(expand_pathbuf(input));
        if !backend_explicit {
            capture.backend = Backend::Still;
        }
    }
    if let Some(ms) = cli.frame_interval_ms {
        capture.frame_interval = Duration::from_millis(ms);
    }
    if cli.frame_limit.is_some() {
        capture.frame_limit = cli.frame_limit;
    }

    // A still image has no fixed sensor modes; default to its native size.
    if capture.backend == Backend::Still && !preset_explicit {
        capture.resolution.primary = SessionPreset::Photo;
    }

    let mut ocr_backend = cli.ocr_backend;
    if !sources.ocr_backend_from_cli {
        if let Some(value) = normalize_string(file_ocr.backend) {
            ocr_backend = parse_value_enum(&value, "ocr.backend", path)?;
        }
    }

    let mut level = cli.ocr_level;
    if !sources.ocr_level_from_cli {
        if let Some(value) = normalize_string(file_ocr.level) {
            level = parse_value_enum(&value, "ocr.level", path)?;
        }
    }

    let languages = if sources.ocr_languages_from_cli {
        cli.ocr_languages.clone()
    } else {
        file_ocr.languages.unwrap_or_default()
    };

    let uses_language_correction = cli
        .ocr_language_correction
        .or(file_ocr.language_correction)
        .unwrap_or(false);

    let timeout_ms = cli.ocr_timeout_ms.or(file_ocr.timeout_ms);
    let timeout = match timeout_ms {
        Some(0) => None,
        Some(ms) => Some(Duration::from_millis(ms)),
        None => Some(DEFAULT_OCR_TIMEOUT),
    };

    let options = RecognitionOptions {
        level: match level {
            OcrLevel::Fast => RecognitionLevel::Fast,
            OcrLevel::Accurate => RecognitionLevel::Accurate,
        },
        uses_language_correction,
        languages,
        ..RecognitionOptions::default()
    };

    let mut format = cli.format;
    if !sources.output_format_from_cli {
        if let Some(value) = normalize_string(file_output.format) {
            format = parse_value_enum(&value, "output.format", path)?;
        }
    }
    let show_empty = cli.show_empty || file_output.show_empty.unwrap_or(false);
    let progress = !cli.no_progress && file_output.progress.unwrap_or(true);

    Ok(EffectiveSettings {
        capture,
        ocr: OcrSettings {
            backend: ocr_backend,
            options,
            timeout,
        },
        output: OutputSettings {
            format,
            show_empty,
            progress,
        },
        config_path,
    })
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("rs", "camtext", "camtext").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn local_config_path() -> Option<PathBuf> {
    env::current_dir()
        .ok()
        .map(|dir| dir.join(LOCAL_CONFIG_FILE))
}

fn normalize_string(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn expand_pathbuf(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(s) => expand_home_path(s),
        None => path,
    }
}

fn resolve_path_from_config(value: String, base: Option<&Path>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_home_path(trimmed);
    match base {
        Some(base) if !expanded.is_absolute() => Some(base.join(expanded)),
        _ => Some(expanded),
    }
}

fn expand_home_path(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().to_path_buf();
        }
    } else if let Some(stripped) = value.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(stripped);
        }
    }
    PathBuf::from(value)
}

fn parse_value<T: FromStr>(
    value: &str,
    field: &'static str,
    path: Option<&PathBuf>,
) -> Result<T, ConfigError> {
    T::from_str(value).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field,
        value: value.to_string(),
    })
}

fn parse_value_enum<T: ValueEnum>(
    value: &str,
    field: &'static str,
    path: Option<&PathBuf>,
) -> Result<T, ConfigError> {
    T::from_str(value, true).map_err(|_| ConfigError::InvalidValue {
        path: path.cloned(),
        field,
        value: value.to_string(),
    })
}

fn parse_fallback(
    value: &str,
    field: &'static str,
    path: Option<&PathBuf>,
) -> Result<Option<SessionPreset>, ConfigError> {
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_value(value, field, path).map(Some)
}
