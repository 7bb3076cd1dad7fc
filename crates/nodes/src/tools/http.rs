//! `http_request` tool backed by `reqwest`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{Tool, ToolError, ToolResponse};
use crate::context::ExecutionContext;

pub const HTTP_TOOL_ID: &str = "http_request";

#[derive(Debug, Deserialize)]
struct HttpRequestParams {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_owned()
}

/// Performs one HTTP request per call.
///
/// Non-2xx responses come back as `success = false` with the decoded body as
/// partial output, so the calling block can surface what the server said.
#[derive(Debug, Clone, Default)]
pub struct HttpTool {
    client: reqwest::Client,
}

impl HttpTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn id(&self) -> &str {
        HTTP_TOOL_ID
    }

    async fn call(&self, params: Value, _ctx: &ExecutionContext) -> Result<ToolResponse, ToolError> {
        let request: HttpRequestParams =
            serde_json::from_value(params).map_err(|e| invalid_params(e.to_string()))?;
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| invalid_params(format!("unsupported method '{}'", request.method)))?;

        let mut builder = self.client.request(method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.params.is_empty() {
            let query: Vec<(String, String)> = request
                .params
                .iter()
                .map(|(k, v)| (k.clone(), query_value(v)))
                .collect();
            builder = builder.query(&query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(%method, url = %request.url, "sending http request");
        let response = builder.send().await.map_err(transport)?;

        let status = response.status();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), Value::String(v.to_owned())))
            })
            .collect();
        let text = response.text().await.map_err(transport)?;

        let output = json!({
            "data": decode_body(&text),
            "status": status.as_u16(),
            "headers": headers,
        });

        if status.is_success() {
            Ok(ToolResponse::ok(output))
        } else {
            warn!(%status, url = %request.url, "http request returned an error status");
            Ok(ToolResponse::failed(format!("HTTP {status}"), output))
        }
    }
}

/// Parse a response body as JSON, falling back to the raw text.
///
/// Numbers keep their exact digits (serde_json is built with
/// `arbitrary_precision`), so identifiers beyond 2^53 survive decoding.
pub fn decode_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn invalid_params(message: String) -> ToolError {
    ToolError::InvalidParams {
        tool_id: HTTP_TOOL_ID.to_owned(),
        message,
    }
}

fn transport(err: reqwest::Error) -> ToolError {
    ToolError::Transport {
        tool_id: HTTP_TOOL_ID.to_owned(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowGraph;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn large_numeric_ids_keep_every_digit() {
        let body = decode_body(r#"{"id": 1234567890123456789012, "user": {"id": 9007199254740993}}"#);
        assert_eq!(body["id"].to_string(), "1234567890123456789012");
        assert_eq!(body["user"]["id"].to_string(), "9007199254740993");
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"id":1234567890123456789012,"user":{"id":9007199254740993}}"#
        );
    }

    #[test]
    fn non_json_body_is_kept_as_text() {
        assert_eq!(decode_body("plain text"), json!("plain text"));
    }

    #[tokio::test]
    async fn missing_url_is_invalid_params() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Arc::new(WorkflowGraph::default()));
        let err = HttpTool::default()
            .call(json!({ "method": "GET" }), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }
}
