use std::path::Path;

use anyhow::{bail, Result};
use poetique_contracts::events::{
    EventPayload, EventWriter, ANALYSIS_COMPLETED, ANALYSIS_DISCARDED_STALE, ANALYSIS_FAILED,
    ANALYSIS_REQUESTED, ANSWER_TOGGLED, SESSION_RESET, UPLOAD_STARTED,
};
use poetique_contracts::{AnalysisResult, AnswerVisibility};
use serde_json::{json, Value};

use crate::client::AnalysisClient;
use crate::error::{error_chain_text, AnalysisError};
use crate::image_input::{ImagePayload, ImagePreview};

/// Identifies one upload. Only the most recently issued token may resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Processing {
        token: RequestToken,
    },
    Completed {
        result: Box<AnalysisResult>,
        visibility: AnswerVisibility,
    },
    Error {
        error: AnalysisError,
    },
}

impl ViewState {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing { .. } => "processing",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

/// Owns the one live view of a session: idle, waiting, a result, or an error.
///
/// Mutated from a single thread. Analysis calls run elsewhere and hand their
/// outcome back through [`SessionController::resolve`] with the token they
/// were started under; anything but the latest token is dropped.
#[derive(Debug)]
pub struct SessionController {
    events: EventWriter,
    state: ViewState,
    preview: Option<ImagePreview>,
    last_token: u64,
}

impl SessionController {
    pub fn new(events: EventWriter) -> Self {
        Self {
            events,
            state: ViewState::Idle,
            preview: None,
            last_token: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn status(&self) -> &'static str {
        self.state.status()
    }

    pub fn preview(&self) -> Option<&ImagePreview> {
        self.preview.as_ref()
    }

    pub fn in_flight(&self) -> Option<RequestToken> {
        match self.state {
            ViewState::Processing { token } => Some(token),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.state {
            ViewState::Completed { result, .. } => Some(&**result),
            _ => None,
        }
    }

    pub fn visibility(&self) -> Option<&AnswerVisibility> {
        match &self.state {
            ViewState::Completed { visibility, .. } => Some(visibility),
            _ => None,
        }
    }

    /// Result and its visibility map together, for exporting.
    pub fn completed_mut(&mut self) -> Option<(&AnalysisResult, &mut AnswerVisibility)> {
        match &mut self.state {
            ViewState::Completed { result, visibility } => Some((&**result, visibility)),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match &self.state {
            ViewState::Error { error } => Some(error),
            _ => None,
        }
    }

    /// The user-facing error text, if the session is in the error state.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(AnalysisError::user_message)
    }

    /// Discards whatever was on screen and enters `Processing`.
    pub fn begin_upload(&mut self, preview: Option<ImagePreview>) -> RequestToken {
        self.last_token += 1;
        let token = RequestToken(self.last_token);
        let mut payload = EventPayload::new();
        payload.insert("token".to_string(), json!(token.get()));
        payload.insert("previous_status".to_string(), json!(self.status()));
        if let Some(preview) = &preview {
            payload.insert(
                "image_path".to_string(),
                Value::String(preview.path.to_string_lossy().to_string()),
            );
            payload.insert("width".to_string(), json!(preview.width));
            payload.insert("height".to_string(), json!(preview.height));
        }
        self.preview = preview;
        self.state = ViewState::Processing { token };
        self.events.emit_quiet(UPLOAD_STARTED, payload);
        token
    }

    pub fn record_request(&self, token: RequestToken, image: &ImagePayload, client: &str) {
        let mut payload = EventPayload::new();
        payload.insert("token".to_string(), json!(token.get()));
        payload.insert("client".to_string(), json!(client));
        payload.insert("mime_type".to_string(), json!(image.mime_type()));
        payload.insert("image_sha256".to_string(), json!(image.sha256()));
        self.events.emit_quiet(ANALYSIS_REQUESTED, payload);
    }

    pub fn resolve(
        &mut self,
        token: RequestToken,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> Resolution {
        let current = matches!(self.state, ViewState::Processing { token: live } if live == token);
        if token.get() != self.last_token || !current {
            let mut payload = EventPayload::new();
            payload.insert("token".to_string(), json!(token.get()));
            payload.insert("latest_token".to_string(), json!(self.last_token));
            payload.insert("status".to_string(), json!(self.status()));
            self.events.emit_quiet(ANALYSIS_DISCARDED_STALE, payload);
            return Resolution::Stale;
        }

        let mut payload = EventPayload::new();
        payload.insert("token".to_string(), json!(token.get()));
        match outcome {
            Ok(result) => {
                payload.insert("title".to_string(), json!(result.title));
                payload.insert("score".to_string(), json!(result.score_label()));
                payload.insert("grade".to_string(), json!(result.cie_evaluation.grade));
                payload.insert("questions".to_string(), json!(result.question_count()));
                self.state = ViewState::Completed {
                    result: Box::new(result),
                    visibility: AnswerVisibility::new(),
                };
                self.events.emit_quiet(ANALYSIS_COMPLETED, payload);
            }
            Err(error) => {
                payload.insert("error_kind".to_string(), json!(error.kind().as_str()));
                payload.insert("error".to_string(), json!(error.message()));
                self.state = ViewState::Error { error };
                self.events.emit_quiet(ANALYSIS_FAILED, payload);
            }
        }
        Resolution::Applied
    }

    /// Back to `Idle`. A request still in flight will resolve as stale.
    pub fn reset(&mut self) {
        let mut payload = EventPayload::new();
        payload.insert("previous_status".to_string(), json!(self.status()));
        self.state = ViewState::Idle;
        self.preview = None;
        self.events.emit_quiet(SESSION_RESET, payload);
    }

    /// Flips one model answer (zero-based) and returns its new visibility.
    pub fn toggle_answer(&mut self, idx: usize) -> Result<bool> {
        let status = self.status();
        let ViewState::Completed { result, visibility } = &mut self.state else {
            bail!("no analysis to toggle answers on ({status})");
        };
        let count = result.question_count();
        if idx >= count {
            bail!("question {} does not exist (have {count})", idx + 1);
        }
        let visible = visibility.toggle(idx);
        let mut payload = EventPayload::new();
        payload.insert("question".to_string(), json!(idx + 1));
        payload.insert("visible".to_string(), json!(visible));
        self.events.emit_quiet(ANSWER_TOGGLED, payload);
        Ok(visible)
    }
}

/// Encodes the file at `path` for the analysis call.
pub fn load_payload(path: &Path) -> Result<ImagePayload, AnalysisError> {
    ImagePayload::from_path(path).map_err(|err| AnalysisError::input(error_chain_text(&err, 512)))
}

/// Runs one upload start to finish on the calling thread.
pub fn analyze_blocking(
    controller: &mut SessionController,
    client: &dyn AnalysisClient,
    path: &Path,
) -> Resolution {
    let token = controller.begin_upload(ImagePreview::load(path).ok());
    let outcome = load_payload(path).and_then(|image| {
        controller.record_request(token, &image, client.name());
        client.analyze(&image)
    });
    controller.resolve(token, outcome)
}
