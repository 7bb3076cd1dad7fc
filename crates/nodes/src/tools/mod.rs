//! Tool invocation gateway.
//!
//! Handlers and the router never perform I/O themselves; they ask a
//! [`ToolGateway`] to run a named tool with fully-qualified parameters.  The
//! gateway is opaque to the rest of the crate and applies no retry policy.

pub mod http;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::context::ExecutionContext;

pub use http::{HttpTool, HTTP_TOOL_ID};

/// Result of a tool call that reached the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResponse {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    /// A failed call; `output` carries whatever partial result exists.
    pub fn failed(error: impl Into<String>, output: Value) -> Self {
        Self {
            success: false,
            output,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool not found: '{0}'")]
    NotFound(String),

    #[error("invalid parameters for tool '{tool_id}': {message}")]
    InvalidParams { tool_id: String, message: String },

    #[error("transport error in tool '{tool_id}': {message}")]
    Transport { tool_id: String, message: String },
}

/// External-facing capability interface used by handlers.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn invoke(
        &self,
        tool_id: &str,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResponse, ToolError>;
}

/// A single capability reachable through a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> &str;

    async fn call(&self, params: Value, ctx: &ExecutionContext) -> Result<ToolResponse, ToolError>;
}

/// Gateway backed by an explicit set of tools keyed by id.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `tool`, replacing any tool with the same id.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.id().to_owned(), tool);
        self
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    pub fn tool_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl ToolGateway for ToolRegistry {
    async fn invoke(
        &self,
        tool_id: &str,
        params: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResponse, ToolError> {
        let tool = self
            .tools
            .get(tool_id)
            .ok_or_else(|| ToolError::NotFound(tool_id.to_owned()))?;
        debug!(tool_id, execution_id = %ctx.execution_id, "invoking tool");
        tool.call(params, ctx).await
    }
}
