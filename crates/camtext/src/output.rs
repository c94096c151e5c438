use std::io::{self, Write};

use camtext_types::{NormalizedRect, Orientation, PixelRect};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::pipeline::FrameRecognition;

/// Writes recognized frames as text blocks or JSON lines.
pub struct OutputWriter<W: Write> {
    format: OutputFormat,
    show_empty: bool,
    out: W,
}

#[derive(Serialize)]
struct JsonFrame<'a> {
    frame_index: Option<u64>,
    width: u32,
    height: u32,
    orientation: Orientation,
    elapsed_ms: f64,
    regions: Vec<JsonRegion<'a>>,
}

#[derive(Serialize)]
struct JsonRegion<'a> {
    text: &'a str,
    confidence: f32,
    bounding_box: NormalizedRect,
    pixels: PixelRect,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(format: OutputFormat, show_empty: bool, out: W) -> Self {
        Self {
            format,
            show_empty,
            out,
        }
    }

    /// Returns `false` when the frame was skipped because it had no text.
    pub fn write(&mut self, recognition: &FrameRecognition) -> io::Result<bool> {
        if recognition.regions.is_empty() && !self.show_empty {
            return Ok(false);
        }
        match self.format {
            OutputFormat::Text => self.write_text(recognition)?,
            OutputFormat::Json => self.write_json(recognition)?,
        }
        self.out.flush()?;
        Ok(true)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_text(&mut self, recognition: &FrameRecognition) -> io::Result<()> {
        let count = recognition.regions.len();
        let index = recognition
            .frame_index
            .map(|index| index.to_string())
            .unwrap_or_else(|| "?".to_string());
        writeln!(
            self.out,
            "frame #{index} ({count} {})",
            if count == 1 { "region" } else { "regions" }
        )?;
        for region in &recognition.regions {
            let px = region
                .bounding_box
                .to_pixels(recognition.resolution.width, recognition.resolution.height);
            writeln!(
                self.out,
                "  [{:.2}] {:?} @ ({}, {}, {}, {})",
                region.confidence, region.text, px.x, px.y, px.width, px.height
            )?;
        }
        Ok(())
    }

    fn write_json(&mut self, recognition: &FrameRecognition) -> io::Result<()> {
        let size = recognition.resolution;
        let frame = JsonFrame {
            frame_index: recognition.frame_index,
            width: size.width,
            height: size.height,
            orientation: recognition.orientation,
            elapsed_ms: recognition.elapsed.as_secs_f64() * 1000.0,
            regions: recognition
                .regions
                .iter()
                .map(|region| JsonRegion {
                    text: &region.text,
                    confidence: region.confidence,
                    bounding_box: region.bounding_box,
                    pixels: region.bounding_box.to_pixels(size.width, size.height),
                })
                .collect(),
        };
        serde_json::to_writer(&mut self.out, &frame)?;
        writeln!(self.out)
    }
}
