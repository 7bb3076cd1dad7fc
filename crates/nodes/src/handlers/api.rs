//! API block: one HTTP request through the `http_request` tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{invoke_tool, str_input};
use crate::context::ExecutionContext;
use crate::models::{Block, BlockKind};
use crate::tools::{ToolGateway, HTTP_TOOL_ID};
use crate::traits::BlockHandler;
use crate::BlockError;

pub struct ApiHandler {
    gateway: Arc<dyn ToolGateway>,
}

impl ApiHandler {
    pub fn new(gateway: Arc<dyn ToolGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl BlockHandler for ApiHandler {
    fn kind(&self) -> BlockKind {
        BlockKind::Api
    }

    async fn execute(
        &self,
        block: &Block,
        inputs: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, BlockError> {
        let url = str_input(inputs, "url")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| BlockError::InvalidInput {
                block_id: block.id.clone(),
                message: "missing required input 'url'".to_owned(),
            })?;

        let params = json!({
            "url": url,
            "method": str_input(inputs, "method").unwrap_or("GET"),
            "headers": inputs.get("headers").cloned().unwrap_or_else(|| json!({})),
            "params": inputs.get("params").cloned().unwrap_or_else(|| json!({})),
            "body": inputs.get("body").cloned().unwrap_or(Value::Null),
        });

        invoke_tool(self.gateway.as_ref(), block, HTTP_TOOL_ID, params, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::models::WorkflowGraph;
    use crate::tools::ToolResponse;
    use uuid::Uuid;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(Uuid::new_v4(), Arc::new(WorkflowGraph::default()))
    }

    #[tokio::test]
    async fn request_params_are_forwarded_to_the_gateway() {
        let gateway = Arc::new(
            MockGateway::new().reply(HTTP_TOOL_ID, ToolResponse::ok(json!({ "status": 200, "data": "ok" }))),
        );
        let handler = ApiHandler::new(gateway.clone());
        let block = Block::new("fetch", BlockKind::Api)
            .with_config("url", json!("https://example.com/users"))
            .with_config("method", json!("POST"))
            .with_config("body", json!({ "name": "ada" }));

        let output = handler.execute(&block, &block.config, &ctx()).await.unwrap();
        assert_eq!(output["status"], 200);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, HTTP_TOOL_ID);
        assert_eq!(calls[0].1["method"], "POST");
        assert_eq!(calls[0].1["body"], json!({ "name": "ada" }));
        assert_eq!(calls[0].1["headers"], json!({}));
    }

    #[tokio::test]
    async fn failed_request_carries_block_identity_and_partial_output() {
        let gateway = Arc::new(MockGateway::new().reply(
            HTTP_TOOL_ID,
            ToolResponse::failed("HTTP 503 Service Unavailable", json!({ "status": 503 })),
        ));
        let handler = ApiHandler::new(gateway);
        let block = Block::new("fetch", BlockKind::Api)
            .with_title("Fetch users")
            .with_config("url", json!("https://example.com"));

        match handler.execute(&block, &block.config, &ctx()).await {
            Err(BlockError::Execution { block_id, block_name, message, partial_output }) => {
                assert_eq!(block_id, "fetch");
                assert_eq!(block_name, "Fetch users");
                assert!(message.contains("503"));
                assert_eq!(partial_output, Some(json!({ "status": 503 })));
            }
            other => panic!("expected Execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_url_is_invalid_input() {
        let handler = ApiHandler::new(Arc::new(MockGateway::new()));
        let block = Block::new("fetch", BlockKind::Api);
        assert!(matches!(
            handler.execute(&block, &block.config, &ctx()).await,
            Err(BlockError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn unregistered_tool_is_tool_not_found() {
        let handler = ApiHandler::new(Arc::new(MockGateway::new()));
        let block = Block::new("fetch", BlockKind::Api).with_config("url", json!("https://example.com"));
        assert!(matches!(
            handler.execute(&block, &block.config, &ctx()).await,
            Err(BlockError::ToolNotFound { tool_id }) if tool_id == HTTP_TOOL_ID
        ));
    }
}
