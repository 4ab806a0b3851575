use std::collections::VecDeque;
use std::sync::Mutex;

use poetique_contracts::AnalysisResult;
use serde_json::{json, Value};

use crate::client::AnalysisClient;
use crate::error::AnalysisError;
use crate::image_input::ImagePayload;

pub fn sample_result_json() -> Value {
    json!({
        "title": "Ozymandias",
        "author": "Percy Bysshe Shelley",
        "ocrContent": "I met a traveller from an antique land,\nWho said: Two vast and trunkless legs of stone",
        "meaning": {
            "explicit": "A traveller describes a ruined statue in the desert.",
            "implicit": "Human power and pride are swallowed by time."
        },
        "tone": {
            "description": "Ironic and detached.",
            "effects": "The framing narrator distances us from the tyrant."
        },
        "structure": "A Petrarchan sonnet with an irregular rhyme scheme.",
        "context": "Written in 1817 amid Romantic fascination with Egypt.",
        "personalResponse": "The empty sands at the close feel chilling.",
        "literaryDevices": [
            {"device": "Irony", "example": "Look on my Works, ye Mighty, and despair!", "effect": "Mocks the boast."},
            {"device": "Alliteration", "example": "boundless and bare", "effect": "Stresses emptiness."}
        ],
        "examQuestions": [
            {"question": "How does Shelley present the power of time?", "marks": 25, "modelAnswer": "Shelley frames the statue second-hand...", "keyPoints": ["framing narrative", "ruin imagery"]},
            {"question": "In what ways does the poet use irony?", "marks": 25, "modelAnswer": "The inscription's boast is undercut...", "keyPoints": ["inscription", "desert"]},
            {"question": "How does Shelley vividly convey the sculptor's art?", "marks": 25, "modelAnswer": "The sneer of cold command survives...", "keyPoints": ["passions read", "hand that mocked"]}
        ],
        "cieEvaluation": {
            "ao1": "Confident textual knowledge.",
            "ao2": "Sensitive reading of form.",
            "ao3": "Engaged personal view.",
            "ao4": "Relevant Romantic context.",
            "totalMark": 18,
            "maxMark": 25,
            "grade": "A",
            "examinerComments": "Well structured with perceptive insight."
        }
    })
}

pub fn sample_result() -> AnalysisResult {
    AnalysisResult::from_json_str(&sample_result_json().to_string())
        .expect("sample analysis must parse")
}

/// Replays canned outcomes in order and records the media type of each call.
pub struct ScriptedClient {
    outcomes: Mutex<VecDeque<Result<AnalysisResult, AnalysisError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(outcomes: Vec<Result<AnalysisResult, AnalysisError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

impl AnalysisClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn analyze(&self, image: &ImagePayload) -> Result<AnalysisResult, AnalysisError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(image.mime_type().to_string());
        }
        self.outcomes
            .lock()
            .ok()
            .and_then(|mut outcomes| outcomes.pop_front())
            .unwrap_or_else(|| Err(AnalysisError::transport("script exhausted")))
    }
}
