use std::fmt;

use serde::{Deserialize, Serialize};

/// One completed literary analysis as returned by the analysis service.
///
/// Every field is required on the wire. A payload missing any of them, at any
/// depth, is rejected as a whole rather than rendered with blanks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub title: String,
    pub author: String,
    pub ocr_content: String,
    pub meaning: Meaning,
    pub tone: Tone,
    pub structure: String,
    pub context: String,
    pub personal_response: String,
    pub literary_devices: Vec<LiteraryDevice>,
    pub exam_questions: Vec<ExamQuestion>,
    pub cie_evaluation: CieEvaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meaning {
    pub explicit: String,
    pub implicit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub description: String,
    pub effects: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteraryDevice {
    pub device: String,
    pub example: String,
    pub effect: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub question: String,
    pub marks: u32,
    pub model_answer: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CieEvaluation {
    pub ao1: String,
    pub ao2: String,
    pub ao3: String,
    pub ao4: String,
    pub total_mark: f64,
    pub max_mark: f64,
    pub grade: String,
    pub examiner_comments: String,
}

/// Why a response body could not be accepted as an [`AnalysisResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    message: String,
}

impl SchemaViolation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SchemaViolation {}

impl AnalysisResult {
    /// Parses the structured text returned by the service and checks the
    /// numeric fields. No field is ever defaulted.
    pub fn from_json_str(raw: &str) -> Result<Self, SchemaViolation> {
        let parsed: Self = serde_json::from_str(raw.trim())
            .map_err(|err| SchemaViolation::new(err.to_string()))?;
        parsed.check_marks()?;
        Ok(parsed)
    }

    fn check_marks(&self) -> Result<(), SchemaViolation> {
        let eval = &self.cie_evaluation;
        for (name, value) in [("totalMark", eval.total_mark), ("maxMark", eval.max_mark)] {
            if !value.is_finite() || value < 0.0 {
                return Err(SchemaViolation::new(format!(
                    "cieEvaluation.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn question_count(&self) -> usize {
        self.exam_questions.len()
    }

    /// `"18 / 25"`, numbers printed without a trailing `.0`.
    pub fn score_label(&self) -> String {
        format!(
            "{} / {}",
            trim_float(self.cie_evaluation.total_mark),
            trim_float(self.cie_evaluation.max_mark)
        )
    }
}

pub fn trim_float(value: f64) -> String {
    let text = format!("{value:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
