//! HTTP client for the remote rendering service.
//!
//! Three JSON endpoints, no authentication, no retries:
//! `POST /render`, `POST /jsonpath` and `POST /predicate`.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EvalpadConfig;
use crate::error::{ClientError, ClientResult};

// ---- Wire types ----

#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest<'a> {
    pub template: &'a str,
    pub data: &'a Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderResponse {
    #[serde(default)]
    pub ok: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonPathRequest<'a> {
    pub json: &'a Value,
    pub path: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonPathResponse {
    #[serde(default)]
    pub result: Option<Vec<Value>>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredicateRequest<'a> {
    pub condition: &'a str,
    pub data: &'a Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredicateResponse {
    #[serde(default)]
    pub ok: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub errors: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Success flags arrive as booleans or strings; read them the way a
/// browser would (`true`, non-empty string, non-zero number).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Plain display text for a JSON value: strings unquoted, scalars as
/// written, containers as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---- Backend seam ----

#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSend for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSend for T {}

/// The remote evaluation service. [`EvalClient`] talks HTTP; tests swap in
/// their own implementations.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait EvalBackend: MaybeSend {
    async fn render(&self, template: &str, data: &Value) -> ClientResult<RenderResponse>;
    async fn jsonpath(&self, json: &Value, path: &str) -> ClientResult<JsonPathResponse>;
    async fn predicate(&self, condition: &str, data: &Value) -> ClientResult<PredicateResponse>;
}

#[derive(Debug, Clone)]
pub struct EvalClient {
    client: Client,
    base_url: String,
}

impl EvalClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &EvalpadConfig) -> Self {
        Self::new(&config.api.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` as JSON and decode the reply. A non-2xx status is only
    /// an error when its body is not a reply we understand.
    async fn post<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        route: &str,
        body: &T,
    ) -> ClientResult<R> {
        let url = format!("{}/{}", self.base_url, route);
        log::debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<R>(&text) {
            Ok(reply) => Ok(reply),
            Err(_) if !status.is_success() => Err(ClientError::ServerError {
                status: status.as_u16(),
            }),
            Err(e) => Err(ClientError::Serialization(e)),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl EvalBackend for EvalClient {
    async fn render(&self, template: &str, data: &Value) -> ClientResult<RenderResponse> {
        self.post("render", &RenderRequest { template, data }).await
    }

    async fn jsonpath(&self, json: &Value, path: &str) -> ClientResult<JsonPathResponse> {
        self.post("jsonpath", &JsonPathRequest { json, path }).await
    }

    async fn predicate(&self, condition: &str, data: &Value) -> ClientResult<PredicateResponse> {
        self.post("predicate", &PredicateRequest { condition, data }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("true")));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&Value::Null));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("plain")), "plain");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!(2.5)), "2.5");
        assert_eq!(display_value(&json!({"a": [1]})), r#"{"a":[1]}"#);
    }

    #[test]
    fn test_request_shapes() {
        let data = json!({"x": 1});
        let render = serde_json::to_value(RenderRequest { template: "{{ x }}", data: &data }).unwrap();
        assert_eq!(render, json!({"template": "{{ x }}", "data": {"x": 1}}));

        let pred = serde_json::to_value(PredicateRequest { condition: "x > 0", data: &data }).unwrap();
        assert_eq!(pred, json!({"condition": "x > 0", "data": {"x": 1}}));

        let path = serde_json::to_value(JsonPathRequest { json: &data, path: "$.x" }).unwrap();
        assert_eq!(path, json!({"json": {"x": 1}, "path": "$.x"}));
    }

    #[test]
    fn test_responses_tolerate_missing_fields() {
        let r: RenderResponse = serde_json::from_str(r#"{"ok": false}"#).unwrap();
        assert!(r.result.is_none() && r.error.is_none());

        let p: JsonPathResponse = serde_json::from_str("{}").unwrap();
        assert!(p.result.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(EvalClient::new("http://h:1/").base_url(), "http://h:1");
    }
}
