use camtext_types::NormalizedRect;

/// One reading of an observation.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrCandidate {
    pub text: String,
    pub confidence: f32,
}

impl OcrCandidate {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// A detected block of text with its candidate readings.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrObservation {
    pub bounding_box: NormalizedRect,
    pub candidates: Vec<OcrCandidate>,
}

impl OcrObservation {
    pub fn new(bounding_box: NormalizedRect, candidates: Vec<OcrCandidate>) -> Self {
        Self {
            bounding_box,
            candidates,
        }
    }

    /// Highest-confidence candidate with non-blank text. On a tie the
    /// engine's order decides.
    pub fn top_candidate(&self) -> Option<&OcrCandidate> {
        let score = |c: &OcrCandidate| {
            if c.confidence.is_nan() {
                f32::NEG_INFINITY
            } else {
                c.confidence
            }
        };
        let mut best: Option<&OcrCandidate> = None;
        for candidate in &self.candidates {
            if candidate.text.trim().is_empty() {
                continue;
            }
            match best {
                Some(current) if score(candidate) <= score(current) => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

/// Everything an engine found in one frame, in engine order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrResponse {
    pub observations: Vec<OcrObservation>,
}

impl OcrResponse {
    pub fn new(observations: Vec<OcrObservation>) -> Self {
        Self { observations }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
