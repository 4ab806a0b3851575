use poetique_contracts::schema::analysis_response_schema;
use poetique_contracts::AnalysisResult;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};

use crate::config::AnalysisConfig;
use crate::error::{truncate_text, AnalysisError};
use crate::image_input::ImagePayload;
use crate::prompts::{examiner_persona, ANALYSIS_INSTRUCTION};

/// The single outbound call that turns a poem photo into an analysis.
pub trait AnalysisClient: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, image: &ImagePayload) -> Result<AnalysisResult, AnalysisError>;
}

/// `generateContent` transport with a strict JSON response schema.
///
/// One request per call. No retry, no cache.
pub struct GeminiAnalysisClient {
    config: AnalysisConfig,
    http: HttpClient,
}

impl GeminiAnalysisClient {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn build_payload(&self, image: &ImagePayload) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    image.to_inline_part(),
                    { "text": ANALYSIS_INSTRUCTION },
                ],
            }],
            "systemInstruction": {
                "parts": [{ "text": examiner_persona() }],
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": analysis_response_schema(),
            },
        })
    }

    fn post(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse, AnalysisError> {
        let mut request = self
            .http
            .post(endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(payload);
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }
        request.send().map_err(|err| {
            // reqwest echoes the URL, which carries the key as a query param.
            let err = err.without_url();
            AnalysisError::transport(format!("Gemini request failed ({endpoint}): {err}"))
        })
    }
}

impl AnalysisClient for GeminiAnalysisClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, image: &ImagePayload) -> Result<AnalysisResult, AnalysisError> {
        let endpoint = self.config.endpoint();
        let payload = self.build_payload(image);
        let response = self.post(&endpoint, &payload)?;
        let envelope = response_json_or_error("Gemini", response)?;
        let text = extract_response_text(&envelope);
        parse_analysis_text(text.as_deref())
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value, AnalysisError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| {
        AnalysisError::transport(format!("{provider} response body read failed: {err}"))
    })?;
    if !status.is_success() {
        return Err(AnalysisError::transport(format!(
            "{provider} request failed ({code}): {}",
            truncate_text(body.trim(), 512)
        )));
    }
    serde_json::from_str(&body).map_err(|err| {
        AnalysisError::transport(format!("{provider} returned invalid JSON payload: {err}"))
    })
}

/// Concatenated text parts of the first candidate, `None` when there is no
/// text at all.
pub fn extract_response_text(envelope: &Value) -> Option<String> {
    let parts = envelope
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)?;
    let text: String = parts
        .iter()
        .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Whole-or-nothing parse of the service text.
pub fn parse_analysis_text(text: Option<&str>) -> Result<AnalysisResult, AnalysisError> {
    let Some(text) = text.filter(|value| !value.trim().is_empty()) else {
        return Err(AnalysisError::empty_response());
    };
    AnalysisResult::from_json_str(text).map_err(AnalysisError::schema)
}
