use std::sync::LazyLock;

use jsonschema::JSONSchema;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::contract::{AgentAnswer, FOLLOW_UP_NONE, agent_answer_schema};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("model output has no embedded json block")]
    NoEmbeddedJson,
    #[error("embedded json block is never closed")]
    UnterminatedBlock,
    #[error("embedded answer is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("agent answer schema failed to compile: {0}")]
    SchemaCompile(String),
    #[error("embedded answer failed schema validation: {errors:?}")]
    SchemaViolation { errors: Vec<String> },
}

/// Returns the body of the first fenced json block in `text`.
pub fn extract_fenced_json(text: &str) -> Result<&str, AnswerError> {
    let open = text.find(FENCE_OPEN).ok_or(AnswerError::NoEmbeddedJson)?;
    let body = &text[open + FENCE_OPEN.len()..];
    let close = body.find(FENCE_CLOSE).ok_or(AnswerError::UnterminatedBlock)?;
    Ok(body[..close].trim())
}

pub fn parse_agent_answer(text: &str) -> Result<AgentAnswer, AnswerError> {
    let raw_json = extract_fenced_json(text)?;
    let payload: Value = serde_json::from_str(raw_json)?;
    validate_answer_value(&payload)
}

pub fn validate_answer_value(payload: &Value) -> Result<AgentAnswer, AnswerError> {
    let validator = AGENT_ANSWER_VALIDATOR
        .as_ref()
        .map_err(|message| AnswerError::SchemaCompile(message.clone()))?;

    if let Err(validation_errors) = validator.validate(payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(AnswerError::SchemaViolation { errors });
    }

    serde_json::from_value(payload.clone()).map_err(AnswerError::from)
}

/// Rewrites every `followUpQuestion` string value in a transcript entry to
/// the `none` sentinel so the model stops asking once the search runs.
pub fn close_follow_up(entry: &str) -> String {
    FOLLOW_UP_FIELD
        .replace_all(entry, format!("\"followUpQuestion\": \"{FOLLOW_UP_NONE}\"").as_str())
        .into_owned()
}

static AGENT_ANSWER_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    let schema = agent_answer_schema().map_err(|err| err.to_string())?;
    JSONSchema::compile(&schema).map_err(|err| err.to_string())
});

static FOLLOW_UP_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""followUpQuestion"\s*:\s*"(?:[^"\\]|\\.)*""#)
        .expect("follow-up field pattern should compile")
});
