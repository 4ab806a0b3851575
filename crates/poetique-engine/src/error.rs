use std::fmt;

pub const GENERIC_ANALYSIS_FAILURE: &str =
    "Failed to analyze the poem. Please try again with a clearer image.";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AnalysisErrorKind {
    /// The selected file could not be read or is not an image.
    Input,
    /// The request could not be completed or the service rejected it.
    Transport,
    /// The service answered without any analyzable text.
    EmptyResponse,
    /// The text did not match the declared schema.
    Schema,
}

impl AnalysisErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Transport => "transport",
            Self::EmptyResponse => "empty_response",
            Self::Schema => "schema",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisError {
    kind: AnalysisErrorKind,
    message: String,
}

impl AnalysisError {
    pub fn input(message: impl Into<String>) -> Self {
        Self {
            kind: AnalysisErrorKind::Input,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: AnalysisErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn empty_response() -> Self {
        Self {
            kind: AnalysisErrorKind::EmptyResponse,
            message: "no content".to_string(),
        }
    }

    pub fn schema(detail: impl fmt::Display) -> Self {
        Self {
            kind: AnalysisErrorKind::Schema,
            message: format!("malformed response: {detail}"),
        }
    }

    pub fn kind(&self) -> AnalysisErrorKind {
        self.kind
    }

    /// Diagnostic text, including transport or parser detail.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// What the user sees in the error state. Input and transport failures
    /// are shown verbatim; empty and malformed responses collapse to one
    /// message.
    pub fn user_message(&self) -> String {
        match self.kind {
            AnalysisErrorKind::Input | AnalysisErrorKind::Transport
                if !self.message.trim().is_empty() =>
            {
                self.message.clone()
            }
            _ => GENERIC_ANALYSIS_FAILURE.to_string(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AnalysisError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportErrorKind {
    /// Rasterizing the report failed.
    Capture,
    /// The captured bitmap could not be encoded for embedding.
    Encode,
    /// Building the paginated document failed.
    Assemble,
    /// The document could not be written to disk.
    Write,
}

impl ExportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Encode => "encode",
            Self::Assemble => "assemble",
            Self::Write => "write",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportError {
    kind: ExportErrorKind,
    message: String,
}

impl ExportError {
    pub fn new(kind: ExportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_anyhow(kind: ExportErrorKind, err: &anyhow::Error) -> Self {
        Self::new(kind, error_chain_text(err, 512))
    }

    pub fn kind(&self) -> ExportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ExportError {}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::{
        error_chain_text, truncate_text, AnalysisError, AnalysisErrorKind, ExportError,
        ExportErrorKind, GENERIC_ANALYSIS_FAILURE,
    };

    #[test]
    fn transport_errors_surface_verbatim() {
        let err = AnalysisError::transport("Gemini request failed (503): overloaded");
        assert_eq!(err.kind(), AnalysisErrorKind::Transport);
        assert_eq!(err.user_message(), "Gemini request failed (503): overloaded");
    }

    #[test]
    fn empty_and_schema_errors_collapse_to_generic_message() {
        let empty = AnalysisError::empty_response();
        let schema = AnalysisError::schema("missing field `cieEvaluation`");
        assert_eq!(empty.message(), "no content");
        assert!(schema.message().starts_with("malformed response"));
        assert!(schema.message().contains("cieEvaluation"));
        assert_eq!(empty.user_message(), GENERIC_ANALYSIS_FAILURE);
        assert_eq!(schema.user_message(), GENERIC_ANALYSIS_FAILURE);
        assert_ne!(empty.kind(), schema.kind());
    }

    #[test]
    fn blank_transport_message_falls_back_to_generic() {
        assert_eq!(
            AnalysisError::transport("  ").user_message(),
            GENERIC_ANALYSIS_FAILURE
        );
    }

    #[test]
    fn export_error_display_names_the_stage() {
        let err = ExportError::new(ExportErrorKind::Capture, "no font");
        assert_eq!(err.to_string(), "capture failed: no font");
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = anyhow::anyhow!("disk full")
            .context("failed to write report.pdf")
            .context("export aborted");
        let rendered = error_chain_text(&err, 400);
        assert_eq!(
            rendered,
            "export aborted | caused by: failed to write report.pdf | caused by: disk full"
        );
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
