//! Declared output schema for the analysis call.
//!
//! The service is asked to return exactly this structure serialized as JSON.
//! Field names and nesting must stay in lockstep with [`crate::analysis`].

use serde_json::{json, Map, Value};

pub const REQUIRED_FIELDS: &[&str] = &[
    "title",
    "author",
    "ocrContent",
    "meaning",
    "tone",
    "structure",
    "context",
    "personalResponse",
    "literaryDevices",
    "examQuestions",
    "cieEvaluation",
];

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn object(properties: &[(&str, Value)]) -> Value {
    let mut props = Map::new();
    let mut names = Vec::new();
    for (name, schema) in properties {
        props.insert((*name).to_string(), schema.clone());
        names.push(Value::String((*name).to_string()));
    }
    json!({
        "type": "OBJECT",
        "properties": props,
        "required": names.clone(),
        "propertyOrdering": names,
    })
}

fn array_of(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

pub fn analysis_response_schema() -> Value {
    object(&[
        ("title", string()),
        ("author", string()),
        ("ocrContent", string()),
        (
            "meaning",
            object(&[("explicit", string()), ("implicit", string())]),
        ),
        (
            "tone",
            object(&[("description", string()), ("effects", string())]),
        ),
        ("structure", string()),
        ("context", string()),
        ("personalResponse", string()),
        (
            "literaryDevices",
            array_of(object(&[
                ("device", string()),
                ("example", string()),
                ("effect", string()),
            ])),
        ),
        (
            "examQuestions",
            array_of(object(&[
                ("question", string()),
                ("marks", json!({ "type": "INTEGER", "minimum": 0 })),
                ("modelAnswer", string()),
                ("keyPoints", array_of(string())),
            ])),
        ),
        (
            "cieEvaluation",
            object(&[
                ("ao1", string()),
                ("ao2", string()),
                ("ao3", string()),
                ("ao4", string()),
                ("totalMark", json!({ "type": "NUMBER", "minimum": 0 })),
                ("maxMark", json!({ "type": "NUMBER", "minimum": 0 })),
                ("grade", string()),
                ("examinerComments", string()),
            ]),
        ),
    ])
}
