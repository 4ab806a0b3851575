pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod image_input;
pub mod prompts;
pub mod report;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AnalysisClient, GeminiAnalysisClient};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, AnalysisErrorKind, ExportError, ExportErrorKind};
pub use export::{ExportOptions, ExportOutcome, ReportExporter};
pub use image_input::{ImagePayload, ImagePreview};
pub use report::ReportDocument;
pub use session::{analyze_blocking, RequestToken, Resolution, SessionController, ViewState};
