use serde_json::Value;
use std::sync::Arc;

use crate::client::{display_value, is_truthy, EvalBackend};
use crate::config::ToolKind;
use crate::error::ClientError;

pub const UNKNOWN_PATH: &str = "Unknown JSONPath";

/// Outcome of one evaluation round trip. Never persisted, only displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationResult {
    /// Rendered text (Jinja) or the predicate's value as text.
    Success(String),
    /// The service rejected the input; messages are shown verbatim.
    AppError(Vec<String>),
    /// The data pane is not valid JSON; nothing was sent.
    InputError(String),
    /// The call failed or its reply was unreadable.
    NetworkError(String),
}

impl EvaluationResult {
    /// Commented rendering used in the output pane for the error classes.
    /// Success text is returned unchanged; the Jinja tool formats it first.
    pub fn to_pane_text(&self, tool: ToolKind) -> String {
        match self {
            EvaluationResult::Success(text) => text.clone(),
            EvaluationResult::AppError(messages) => {
                let heading = match tool {
                    ToolKind::Jinja => "// Render error",
                    ToolKind::Predicate => "// Predicate error",
                };
                format!("{}\n{}", heading, messages.join("\n"))
            }
            EvaluationResult::InputError(msg) => format!("// Input data error:\n{}", msg),
            EvaluationResult::NetworkError(msg) => format!("// Network error:\n{}", msg),
        }
    }
}

/// Result of the secondary JSONPath query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathQueryResult {
    Value(String),
    /// The path matched nothing. Not an error.
    UnknownPath,
    /// Error reported by the service, shown verbatim.
    Error(String),
    /// Local parse failure or transport failure.
    Failed(String),
}

impl PathQueryResult {
    pub fn to_pane_text(&self) -> String {
        match self {
            PathQueryResult::Value(text) => text.clone(),
            PathQueryResult::UnknownPath => UNKNOWN_PATH.to_string(),
            PathQueryResult::Error(msg) => msg.clone(),
            PathQueryResult::Failed(msg) => format!("// JSONPath error:\n{}", msg),
        }
    }
}

fn transport_message(error: &ClientError) -> String {
    match error {
        ClientError::Network(e) => e.to_string(),
        other => other.to_string(),
    }
}

/// Maps the service's reply shapes onto [`EvaluationResult`]s.
#[derive(Clone)]
pub struct Evaluator {
    tool: ToolKind,
    backend: Arc<dyn EvalBackend>,
}

impl Evaluator {
    pub fn new(tool: ToolKind, backend: Arc<dyn EvalBackend>) -> Self {
        Self { tool, backend }
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub async fn evaluate(&self, primary: &str, data_text: &str) -> EvaluationResult {
        let data: Value = match serde_json::from_str(data_text) {
            Ok(data) => data,
            Err(e) => return EvaluationResult::InputError(e.to_string()),
        };

        match self.tool {
            ToolKind::Jinja => self.render(primary, &data).await,
            ToolKind::Predicate => self.predicate(primary, &data).await,
        }
    }

    async fn render(&self, template: &str, data: &Value) -> EvaluationResult {
        match self.backend.render(template, data).await {
            Ok(reply) if is_truthy(&reply.ok) => {
                EvaluationResult::Success(reply.result.as_ref().map(display_value).unwrap_or_default())
            }
            Ok(reply) => EvaluationResult::AppError(vec![reply
                .error
                .as_ref()
                .map(display_value)
                .unwrap_or_else(|| "Unknown error".to_string())]),
            Err(e) => {
                log::warn!("Render call failed: {}", e);
                EvaluationResult::NetworkError(transport_message(&e))
            }
        }
    }

    async fn predicate(&self, condition: &str, data: &Value) -> EvaluationResult {
        // The service expects a single-line condition.
        let condition = condition.replace(['\r', '\n'], " ");

        match self.backend.predicate(&condition, data).await {
            Ok(reply) if is_truthy(&reply.ok) => {
                EvaluationResult::Success(reply.result.as_ref().map(display_value).unwrap_or_default())
            }
            Ok(reply) => {
                let messages = match reply.errors.or(reply.error) {
                    Some(Value::Array(items)) => items.iter().map(display_value).collect(),
                    Some(Value::Null) | None => vec!["Unknown error".to_string()],
                    Some(other) => vec![display_value(&other)],
                };
                EvaluationResult::AppError(messages)
            }
            Err(e) => {
                log::warn!("Predicate call failed: {}", e);
                EvaluationResult::NetworkError(transport_message(&e))
            }
        }
    }

    /// Run `path` against `json_text` (the formatted output).
    pub async fn query_path(&self, json_text: &str, path: &str) -> PathQueryResult {
        let json: Value = match serde_json::from_str(json_text) {
            Ok(json) => json,
            Err(e) => return PathQueryResult::Failed(e.to_string()),
        };

        match self.backend.jsonpath(&json, path).await {
            Ok(reply) => {
                if let Some(error) = reply.error.filter(|e| !e.is_null()) {
                    return PathQueryResult::Error(display_value(&error));
                }
                // A falsy first match (null, false, 0, "") reads as no match.
                match reply.result.and_then(|items| items.into_iter().next()) {
                    Some(value) if is_truthy(&value) => PathQueryResult::Value(display_value(&value)),
                    _ => PathQueryResult::UnknownPath,
                }
            }
            Err(e) => {
                log::warn!("JSONPath call failed: {}", e);
                PathQueryResult::Failed(transport_message(&e))
            }
        }
    }
}
