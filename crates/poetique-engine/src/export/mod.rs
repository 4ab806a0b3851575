//! Paginated A4 export of a completed analysis.
//!
//! The report is rasterized as one tall bitmap and sliced across pages by
//! offsetting the same image on each page. Answer visibility is forced open
//! for the capture and put back exactly as it was afterwards, whatever the
//! outcome.

mod pdf;
mod raster;
mod tiling;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use poetique_contracts::events::{
    EventPayload, EventWriter, EXPORT_FAILED, EXPORT_FINISHED, EXPORT_STARTED,
};
use poetique_contracts::{AnalysisResult, AnswerVisibility, VisibilitySnapshot};
use serde_json::json;

use crate::config::non_empty_env;
use crate::error::{ExportError, ExportErrorKind};
use crate::report::ReportDocument;

pub use pdf::{encode_jpeg, TiledPdf};
pub use raster::{
    render_document, wrap_text, CaptureOptions, FontSet, GlyphRasterizer, ReportRasterizer,
};
pub use tiling::{PageGeometry, A4_HEIGHT_PT, A4_WIDTH_PT};

pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);
pub const MANUAL_FALLBACK_HINT: &str = "Failed to generate PDF. You can also open the HTML \
report in a browser, print it (Ctrl+P) and choose \"Save as PDF\".";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub page: PageGeometry,
    pub capture: CaptureOptions,
    /// Pause between forcing answers open and capturing.
    pub settle: Duration,
    pub font_path: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page: PageGeometry::default(),
            capture: CaptureOptions::default(),
            settle: DEFAULT_SETTLE,
            font_path: None,
        }
    }
}

impl ExportOptions {
    /// Defaults plus `POETIQUE_REPORT_FONT`.
    pub fn from_env() -> Self {
        Self {
            font_path: non_empty_env("POETIQUE_REPORT_FONT").map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn with_font_path(mut self, font_path: Option<PathBuf>) -> Self {
        if font_path.is_some() {
            self.font_path = font_path;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved { path: PathBuf, pages: usize },
    Failed { error: ExportError, warning: String },
}

/// Puts the visibility map back on drop, so early returns and panics in the
/// capture path cannot leave every answer expanded.
struct RevealGuard<'a> {
    visibility: &'a mut AnswerVisibility,
    snapshot: Option<VisibilitySnapshot>,
}

impl<'a> RevealGuard<'a> {
    fn reveal_all(visibility: &'a mut AnswerVisibility, count: usize) -> Self {
        let snapshot = visibility.snapshot();
        visibility.reveal_all(count);
        Self {
            visibility,
            snapshot: Some(snapshot),
        }
    }

    fn visibility(&self) -> &AnswerVisibility {
        self.visibility
    }
}

impl Drop for RevealGuard<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.visibility.restore(snapshot);
        }
    }
}

pub struct ReportExporter {
    rasterizer: Box<dyn ReportRasterizer>,
    options: ExportOptions,
    events: EventWriter,
}

impl ReportExporter {
    pub fn new(
        rasterizer: Box<dyn ReportRasterizer>,
        options: ExportOptions,
        events: EventWriter,
    ) -> Self {
        Self {
            rasterizer,
            options,
            events,
        }
    }

    /// Glyph rasterizer over the configured font.
    pub fn with_glyph_rasterizer(options: ExportOptions, events: EventWriter) -> Self {
        let rasterizer = GlyphRasterizer::new(options.font_path.clone());
        Self::new(Box::new(rasterizer), options, events)
    }

    /// Writes `CIE_Literature_Report_<title>.pdf` into `out_dir`.
    ///
    /// Never fails past this boundary: errors come back as
    /// [`ExportOutcome::Failed`] with a hint for the manual route.
    pub fn export(
        &self,
        result: &AnalysisResult,
        visibility: &mut AnswerVisibility,
        out_dir: &Path,
    ) -> ExportOutcome {
        let path = out_dir.join(report_file_name(&result.title));
        let mut payload = EventPayload::new();
        payload.insert("path".to_string(), json!(path.to_string_lossy()));
        payload.insert("questions".to_string(), json!(result.question_count()));
        self.events.emit_quiet(EXPORT_STARTED, payload);

        let outcome = {
            let guard = RevealGuard::reveal_all(visibility, result.question_count());
            if !self.options.settle.is_zero() {
                thread::sleep(self.options.settle);
            }
            self.render_to(result, guard.visibility(), &path)
        };

        match outcome {
            Ok(pages) => {
                let mut payload = EventPayload::new();
                payload.insert("path".to_string(), json!(path.to_string_lossy()));
                payload.insert("pages".to_string(), json!(pages));
                self.events.emit_quiet(EXPORT_FINISHED, payload);
                ExportOutcome::Saved { path, pages }
            }
            Err(error) => {
                let mut payload = EventPayload::new();
                payload.insert("error_kind".to_string(), json!(error.kind().as_str()));
                payload.insert("error".to_string(), json!(error.message()));
                self.events.emit_quiet(EXPORT_FAILED, payload);
                ExportOutcome::Failed {
                    error,
                    warning: MANUAL_FALLBACK_HINT.to_string(),
                }
            }
        }
    }

    fn render_to(
        &self,
        result: &AnalysisResult,
        visibility: &AnswerVisibility,
        path: &Path,
    ) -> Result<usize, ExportError> {
        let doc = ReportDocument::build(result, visibility, false);
        let bitmap = self
            .rasterizer
            .rasterize(&doc, &self.options.capture)
            .map_err(|err| ExportError::from_anyhow(ExportErrorKind::Capture, &err))?;
        let jpeg = encode_jpeg(&bitmap)
            .map_err(|err| ExportError::from_anyhow(ExportErrorKind::Encode, &err))?;
        let pdf = TiledPdf::assemble(jpeg, bitmap.width(), bitmap.height(), &self.options.page)
            .map_err(|err| ExportError::from_anyhow(ExportErrorKind::Assemble, &err))?;
        let pages = pdf.pages();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ExportError::new(
                    ExportErrorKind::Write,
                    format!("failed creating {}: {err}", parent.display()),
                )
            })?;
        }
        pdf.save(path)
            .map_err(|err| ExportError::from_anyhow(ExportErrorKind::Write, &err))?;
        Ok(pages)
    }
}

/// Whitespace runs become `_`; path separators are replaced too.
pub fn report_file_name(title: &str) -> String {
    let mut stem = String::new();
    let mut in_space = false;
    for ch in title.chars() {
        if ch.is_whitespace() {
            if !in_space {
                stem.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        stem.push(if matches!(ch, '/' | '\\') { '_' } else { ch });
    }
    format!("CIE_Literature_Report_{stem}.pdf")
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{bail, Result};
    use image::{Rgb, RgbImage};
    use poetique_contracts::events::EventWriter;
    use poetique_contracts::AnswerVisibility;

    use super::{
        report_file_name, CaptureOptions, ExportOptions, ExportOutcome, ReportExporter,
        ReportRasterizer, MANUAL_FALLBACK_HINT,
    };
    use crate::error::ExportErrorKind;
    use crate::report::{BlockStyle, ReportDocument};
    use crate::testing::sample_result;

    /// Paints a fixed-size bitmap and records how many answers it saw.
    struct FixedRasterizer {
        width: u32,
        height: u32,
        answers_seen: Arc<Mutex<Vec<usize>>>,
    }

    impl FixedRasterizer {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                answers_seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ReportRasterizer for FixedRasterizer {
        fn rasterize(&self, doc: &ReportDocument, options: &CaptureOptions) -> Result<RgbImage> {
            let answers = doc
                .blocks
                .iter()
                .filter(|block| block.style == BlockStyle::KeyPoint)
                .count();
            if let Ok(mut seen) = self.answers_seen.lock() {
                seen.push(answers);
            }
            Ok(RgbImage::from_pixel(
                self.width,
                self.height,
                Rgb(options.background),
            ))
        }
    }

    struct FailingRasterizer;

    impl ReportRasterizer for FailingRasterizer {
        fn rasterize(&self, _doc: &ReportDocument, _options: &CaptureOptions) -> Result<RgbImage> {
            bail!("canvas unavailable")
        }
    }

    fn quick_options() -> ExportOptions {
        ExportOptions {
            settle: Duration::ZERO,
            ..ExportOptions::default()
        }
    }

    fn exporter(rasterizer: impl ReportRasterizer + 'static) -> ReportExporter {
        ReportExporter::new(
            Box::new(rasterizer),
            quick_options(),
            EventWriter::disabled("export-test"),
        )
    }

    #[test]
    fn file_name_collapses_whitespace_runs() {
        assert_eq!(
            report_file_name("The  Road Not\tTaken"),
            "CIE_Literature_Report_The_Road_Not_Taken.pdf"
        );
        assert_eq!(
            report_file_name("Either/Or"),
            "CIE_Literature_Report_Either_Or.pdf"
        );
    }

    #[test]
    fn export_writes_tiled_pdf_with_every_answer_and_restores_visibility() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let rasterizer = FixedRasterizer::new(800, 2400);
        let answers_seen = Arc::clone(&rasterizer.answers_seen);
        let exporter = exporter(rasterizer);
        let result = sample_result();
        let mut visibility = AnswerVisibility::new();
        visibility.toggle(1);
        let before = visibility.clone();

        let (path, pages) = match exporter.export(&result, &mut visibility, temp.path()) {
            ExportOutcome::Saved { path, pages } => (path, pages),
            failed => panic!("export failed: {failed:?}"),
        };
        // 2400px at 800px wide is 1785.84pt tall: three A4 pages.
        assert_eq!(pages, 3);
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("CIE_Literature_Report_Ozymandias.pdf")
        );
        assert_eq!(lopdf::Document::load(&path)?.get_pages().len(), 3);
        assert_eq!(visibility, before);

        let key_points: usize = result
            .exam_questions
            .iter()
            .map(|question| question.key_points.len())
            .sum();
        assert_eq!(*answers_seen.lock().unwrap(), vec![key_points]);
        Ok(())
    }

    #[test]
    fn capture_failure_reports_warning_and_restores_visibility() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let exporter = exporter(FailingRasterizer);
        let mut visibility = AnswerVisibility::new();
        visibility.toggle(0);
        visibility.toggle(2);
        let before = visibility.clone();

        let outcome = exporter.export(&sample_result(), &mut visibility, temp.path());
        let ExportOutcome::Failed { error, warning } = outcome else {
            panic!("export should fail");
        };
        assert_eq!(error.kind(), ExportErrorKind::Capture);
        assert!(error.message().contains("canvas unavailable"));
        assert_eq!(warning, MANUAL_FALLBACK_HINT);
        assert_eq!(visibility, before);
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn unwritable_destination_is_a_write_failure() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "file")?;
        let exporter = exporter(FixedRasterizer::new(100, 100));
        let mut visibility = AnswerVisibility::new();

        let outcome = exporter.export(&sample_result(), &mut visibility, &blocker);
        let ExportOutcome::Failed { error, .. } = outcome else {
            panic!("export should fail");
        };
        assert_eq!(error.kind(), ExportErrorKind::Write);
        assert!(visibility.visible_indices().is_empty());
        Ok(())
    }
}
