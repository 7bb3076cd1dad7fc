//! Agent block: a single model call through the `chat_completion` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{invoke_tool, response_text, str_input};
use crate::context::ExecutionContext;
use crate::models::{Block, BlockKind};
use crate::tools::ToolGateway;
use crate::traits::BlockHandler;
use crate::BlockError;

/// Tool id of the model gateway shared by agents and routers.
pub const CHAT_TOOL_ID: &str = "chat_completion";

pub(crate) const DEFAULT_MODEL: &str = "gpt-4o";

pub struct AgentHandler {
    gateway: Arc<dyn ToolGateway>,
}

impl AgentHandler {
    pub fn new(gateway: Arc<dyn ToolGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl BlockHandler for AgentHandler {
    fn kind(&self) -> BlockKind {
        BlockKind::Agent
    }

    async fn execute(
        &self,
        block: &Block,
        inputs: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, BlockError> {
        let model = str_input(inputs, "model").unwrap_or(DEFAULT_MODEL);
        let params = json!({
            "model": model,
            "systemPrompt": str_input(inputs, "systemPrompt").unwrap_or_default(),
            "context": str_input(inputs, "context").unwrap_or_default(),
            "apiKey": inputs.get("apiKey").cloned().unwrap_or(Value::Null),
        });

        let output = invoke_tool(self.gateway.as_ref(), block, CHAT_TOOL_ID, params, ctx).await?;
        Ok(json!({
            "content": response_text(&output),
            "model": model,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::models::WorkflowGraph;
    use crate::tools::ToolResponse;
    use uuid::Uuid;

    #[tokio::test]
    async fn content_is_extracted_from_tool_output() {
        let gateway = Arc::new(
            MockGateway::new().reply(CHAT_TOOL_ID, ToolResponse::ok(json!({ "content": "Hi there", "tokens": 12 }))),
        );
        let ctx = ExecutionContext::new(Uuid::new_v4(), Arc::new(WorkflowGraph::default()));
        let block = Block::new("agent", BlockKind::Agent)
            .with_config("model", json!("claude-haiku"))
            .with_config("context", json!("Say hi"));

        let output = AgentHandler::new(gateway.clone())
            .execute(&block, &block.config, &ctx)
            .await
            .unwrap();

        assert_eq!(output, json!({ "content": "Hi there", "model": "claude-haiku" }));
        assert_eq!(gateway.calls()[0].1["context"], "Say hi");
    }

    #[tokio::test]
    async fn bare_string_output_is_used_as_content() {
        let gateway = Arc::new(MockGateway::new().reply(CHAT_TOOL_ID, ToolResponse::ok(json!("plain"))));
        let ctx = ExecutionContext::new(Uuid::new_v4(), Arc::new(WorkflowGraph::default()));
        let block = Block::new("agent", BlockKind::Agent);

        let output = AgentHandler::new(gateway).execute(&block, &block.config, &ctx).await.unwrap();
        assert_eq!(output["content"], "plain");
        assert_eq!(output["model"], DEFAULT_MODEL);
    }
}
