pub mod analysis;
pub mod chat;
pub mod events;
pub mod schema;
pub mod visibility;

pub use analysis::{
    AnalysisResult, CieEvaluation, ExamQuestion, LiteraryDevice, Meaning, SchemaViolation, Tone,
};
pub use visibility::{AnswerVisibility, VisibilitySnapshot};
