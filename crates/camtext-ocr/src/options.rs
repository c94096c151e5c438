use std::fmt;
use std::str::FromStr;

use crate::error::OcrError;

/// Speed/accuracy tier requested from the recognizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecognitionLevel {
    #[default]
    Fast,
    Accurate,
}

impl RecognitionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionLevel::Fast => "fast",
            RecognitionLevel::Accurate => "accurate",
        }
    }
}

impl FromStr for RecognitionLevel {
    type Err = OcrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(RecognitionLevel::Fast),
            "accurate" => Ok(RecognitionLevel::Accurate),
            other => Err(OcrError::UnknownLevel {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RecognitionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request recognizer settings. Defaults to the live-camera mode: fast
/// tier, no language correction, one candidate per observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub level: RecognitionLevel,
    pub uses_language_correction: bool,
    /// BCP-47 tags; empty lets the engine pick.
    pub languages: Vec<String>,
    pub max_candidates: usize,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            level: RecognitionLevel::Fast,
            uses_language_correction: false,
            languages: Vec::new(),
            max_candidates: 1,
        }
    }
}

impl RecognitionOptions {
    /// Trimmed, de-duplicated language tags in their original order.
    pub fn normalized_languages(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.languages.len());
        for tag in &self.languages {
            let tag = tag.trim();
            if !tag.is_empty() && !out.contains(&tag) {
                out.push(tag);
            }
        }
        out
    }
}
