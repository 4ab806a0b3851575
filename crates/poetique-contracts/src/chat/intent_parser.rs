use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, EXPORT_COMMAND, EXPORT_FORMATS, NO_ARG_COMMANDS, SINGLE_PATH_COMMANDS,
    TOGGLE_COMMAND,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            command_args: BTreeMap::new(),
        }
    }

    fn with_arg(mut self, key: &str, value: Value) -> Self {
        self.command_args.insert(key.to_string(), value);
        self
    }

    pub fn path(&self) -> Option<&str> {
        self.command_args
            .get("path")
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

/// Question numbers are typed 1-based; anything else becomes `null`.
fn parse_question_number(arg: &str) -> Value {
    arg.trim()
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .map(|value| Value::Number(value.into()))
        .unwrap_or(Value::Null)
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        let looks_like_path = slash_tail[command_len..].starts_with(['/', '.']);
        if command_len > 0 && !looks_like_path {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                return Intent::new(action, text)
                    .with_arg("path", Value::String(parse_single_path_arg(arg)));
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == TOGGLE_COMMAND.command {
                return Intent::new(TOGGLE_COMMAND.action, text)
                    .with_arg("question", parse_question_number(arg));
            }

            if command == EXPORT_COMMAND.command {
                let format = if arg.is_empty() {
                    "pdf".to_string()
                } else {
                    arg.to_ascii_lowercase()
                };
                if !EXPORT_FORMATS.contains(&format.as_str()) {
                    return Intent::new("unknown", text)
                        .with_arg("command", Value::String(command))
                        .with_arg("arg", Value::String(arg.to_string()));
                }
                return Intent::new(EXPORT_COMMAND.action, text)
                    .with_arg("format", Value::String(format));
            }

            return Intent::new("unknown", text)
                .with_arg("command", Value::String(command))
                .with_arg("arg", Value::String(arg.to_string()));
        }
    }

    // A bare line is a path dropped into the terminal.
    Intent::new("upload", text).with_arg(
        "path",
        Value::String(parse_single_path_arg(raw_trimmed)),
    )
}
