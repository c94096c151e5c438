use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::slice;

use camtext_types::NormalizedRect;

use crate::{
    OcrCandidate, OcrEngine, OcrError, OcrObservation, OcrRequest, OcrResponse, RecognitionLevel,
};

const ENGINE_NAME: &str = "macos_vision";
/// Vision never hands out more than this many candidates per observation.
const MAX_VISION_CANDIDATES: usize = 10;

#[repr(C)]
#[derive(Clone, Copy)]
struct CVisionOcrRect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

#[repr(C)]
struct CVisionOcrCandidate {
    text: *mut c_char,
    confidence: f32,
}

#[repr(C)]
struct CVisionOcrObservation {
    rect: CVisionOcrRect,
    candidates: *mut CVisionOcrCandidate,
    candidate_count: usize,
}

#[repr(C)]
struct CVisionOcrResult {
    observations: *mut CVisionOcrObservation,
    count: usize,
    error: *mut c_char,
}

unsafe extern "C" {
    fn vision_recognize_text(
        data: *const u8,
        width: usize,
        height: usize,
        stride: usize,
        orientation: u32,
        accurate: bool,
        language_correction: bool,
        languages: *const *const c_char,
        languages_count: usize,
        max_candidates: usize,
    ) -> CVisionOcrResult;

    fn vision_ocr_result_destroy(result: CVisionOcrResult);
}

struct OwnedVisionOcrResult {
    raw: CVisionOcrResult,
}

impl OwnedVisionOcrResult {
    fn error_message(&self) -> Option<String> {
        if self.raw.error.is_null() {
            None
        } else {
            Some(
                unsafe { CStr::from_ptr(self.raw.error) }
                    .to_string_lossy()
                    .into_owned(),
            )
        }
    }

    fn observations(&self) -> &[CVisionOcrObservation] {
        if self.raw.count == 0 || self.raw.observations.is_null() {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.raw.observations, self.raw.count) }
        }
    }
}

impl CVisionOcrObservation {
    fn candidates(&self) -> &[CVisionOcrCandidate] {
        if self.candidate_count == 0 || self.candidates.is_null() {
            &[]
        } else {
            unsafe { slice::from_raw_parts(self.candidates, self.candidate_count) }
        }
    }
}

impl Drop for OwnedVisionOcrResult {
    fn drop(&mut self) {
        unsafe {
            vision_ocr_result_destroy(CVisionOcrResult {
                observations: self.raw.observations,
                count: self.raw.count,
                error: self.raw.error,
            });
        }
        self.raw.observations = ptr::null_mut();
        self.raw.error = ptr::null_mut();
        self.raw.count = 0;
    }
}

/// Apple Vision text recognizer (`VNRecognizeTextRequest`).
#[derive(Debug, Default)]
pub struct VisionOcrEngine;

impl VisionOcrEngine {
    pub fn new() -> Self {
        Self
    }
}

fn language_tags(tags: &[&str]) -> Result<Vec<CString>, OcrError> {
    tags.iter()
        .map(|tag| {
            CString::new(*tag).map_err(|_| {
                OcrError::backend(
                    ENGINE_NAME,
                    format!("language tag {tag:?} contains an interior null byte"),
                )
            })
        })
        .collect()
}

impl OcrEngine for VisionOcrEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<OcrResponse, OcrError> {
        let plane = request.luma()?;
        if plane.is_empty() {
            return Ok(OcrResponse::empty());
        }
        let options = request.options();

        let languages = language_tags(&options.normalized_languages())?;
        let language_ptrs: Vec<*const c_char> =
            languages.iter().map(|lang| lang.as_ptr()).collect();
        let (languages_ptr, languages_count) = if language_ptrs.is_empty() {
            (ptr::null(), 0)
        } else {
            (language_ptrs.as_ptr(), language_ptrs.len())
        };
        let max_candidates = options.max_candidates.clamp(1, MAX_VISION_CANDIDATES);

        let raw = unsafe {
            vision_recognize_text(
                plane.data().as_ptr(),
                plane.width() as usize,
                plane.height() as usize,
                plane.stride(),
                request.orientation().exif_value(),
                options.level == RecognitionLevel::Accurate,
                options.uses_language_correction,
                languages_ptr,
                languages_count,
                max_candidates,
            )
        };

        let owned = OwnedVisionOcrResult { raw };
        if let Some(message) = owned.error_message() {
            return Err(OcrError::backend(ENGINE_NAME, message));
        }

        let mut observations = Vec::with_capacity(owned.observations().len());
        for entry in owned.observations() {
            let mut candidates = Vec::with_capacity(entry.candidate_count);
            for candidate in entry.candidates() {
                if candidate.text.is_null() {
                    continue;
                }
                let text = unsafe { CStr::from_ptr(candidate.text) }
                    .to_string_lossy()
                    .into_owned();
                candidates.push(OcrCandidate::new(text, candidate.confidence));
            }
            let rect = entry.rect;
            observations.push(OcrObservation::new(
                NormalizedRect::new(rect.x, rect.y, rect.width, rect.height),
                candidates,
            ));
        }
        log::trace!(
            "vision found {} observations in {}x{} frame",
            observations.len(),
            plane.width(),
            plane.height()
        );

        Ok(OcrResponse::new(observations))
    }
}
