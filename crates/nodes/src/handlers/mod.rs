//! Built-in block handlers.

pub mod agent;
pub mod api;
pub mod router;
pub mod starter;

use serde_json::Value;
use tracing::warn;

use crate::context::ExecutionContext;
use crate::models::Block;
use crate::tools::{ToolError, ToolGateway};
use crate::BlockError;

pub use agent::{AgentHandler, CHAT_TOOL_ID};
pub use api::ApiHandler;
pub use router::RouterHandler;
pub use starter::StarterHandler;

/// Invoke `tool_id` on behalf of `block`, mapping every failure mode onto the
/// block error taxonomy.
pub(crate) async fn invoke_tool(
    gateway: &dyn ToolGateway,
    block: &Block,
    tool_id: &str,
    params: Value,
    ctx: &ExecutionContext,
) -> Result<Value, BlockError> {
    match gateway.invoke(tool_id, params, ctx).await {
        Ok(response) if response.success => Ok(response.output),
        Ok(response) => {
            let message = response
                .error
                .unwrap_or_else(|| format!("tool '{tool_id}' reported failure"));
            warn!(block_id = %block.id, tool_id, %message, "tool call failed");
            Err(BlockError::Execution {
                block_id: block.id.clone(),
                block_name: block.display_name().to_owned(),
                message,
                partial_output: (!response.output.is_null()).then_some(response.output),
            })
        }
        Err(ToolError::NotFound(tool_id)) => Err(BlockError::ToolNotFound { tool_id }),
        Err(err) => Err(BlockError::Execution {
            block_id: block.id.clone(),
            block_name: block.display_name().to_owned(),
            message: err.to_string(),
            partial_output: None,
        }),
    }
}

/// Text of a model-style tool output: its `content` field, or the output
/// itself when it is a bare string.
pub(crate) fn response_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => match other.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(content) => content.to_string(),
            None => other.to_string(),
        },
    }
}

pub(crate) fn str_input<'a>(inputs: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    inputs.get(key).and_then(Value::as_str)
}
