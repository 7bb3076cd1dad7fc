//! Router block: asks the model gateway which single downstream block runs
//! next.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use super::agent::DEFAULT_MODEL;
use super::{invoke_tool, response_text, str_input, CHAT_TOOL_ID};
use crate::context::ExecutionContext;
use crate::models::{Block, BlockKind};
use crate::path::{DecisionRequest, PathTracker, RoutingRule};
use crate::tools::ToolGateway;
use crate::traits::BlockHandler;
use crate::BlockError;

pub struct RouterHandler {
    gateway: Arc<dyn ToolGateway>,
}

impl RouterHandler {
    pub fn new(gateway: Arc<dyn ToolGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl BlockHandler for RouterHandler {
    fn kind(&self) -> BlockKind {
        BlockKind::Router
    }

    /// Inputs: `prompt` (text to classify), optional `model`, `apiKey` and
    /// `routes` (keyword hints). Output is a
    /// [`RoutingDecision`](crate::path::RoutingDecision).
    async fn execute(
        &self,
        block: &Block,
        inputs: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, BlockError> {
        let prompt = str_input(inputs, "prompt").unwrap_or_default();
        let rules: Vec<RoutingRule> = match inputs.get("routes") {
            None | Some(Value::Null) => Vec::new(),
            Some(routes) => serde_json::from_value(routes.clone()).map_err(|e| BlockError::InvalidInput {
                block_id: block.id.clone(),
                message: format!("malformed routes: {e}"),
            })?,
        };

        let candidates = PathTracker::new(ctx).candidates(&block.id);
        let request = DecisionRequest::new(&candidates, &rules, prompt);

        let params = json!({
            "model": str_input(inputs, "model").unwrap_or(DEFAULT_MODEL),
            "systemPrompt": request.system_prompt(),
            "context": prompt,
            "apiKey": inputs.get("apiKey").cloned().unwrap_or(Value::Null),
        });

        let output = invoke_tool(self.gateway.as_ref(), block, CHAT_TOOL_ID, params, ctx).await?;
        let decision = PathTracker::resolve(&candidates, &response_text(&output))?;

        info!(
            router = %block.id,
            selected = %decision.selected_block_id,
            "router selected a path"
        );

        serde_json::to_value(&decision).map_err(|e| BlockError::Execution {
            block_id: block.id.clone(),
            block_name: block.display_name().to_owned(),
            message: e.to_string(),
            partial_output: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use crate::models::{Edge, WorkflowGraph};
    use crate::tools::ToolResponse;
    use uuid::Uuid;

    fn routing_ctx() -> ExecutionContext {
        let graph = WorkflowGraph::new(
            vec![
                Block::new("start", BlockKind::Starter),
                Block::new("triage", BlockKind::Router),
                Block::new("billing", BlockKind::Agent).with_title("Billing"),
                Block::new("support", BlockKind::Agent).with_title("Support"),
            ],
            vec![
                Edge::between("start", "triage"),
                Edge::between("triage", "billing"),
                Edge::between("triage", "support"),
            ],
        );
        ExecutionContext::new(Uuid::new_v4(), Arc::new(graph))
    }

    fn triage_block() -> Block {
        Block::new("triage", BlockKind::Router)
            .with_config("prompt", json!("I was charged twice"))
            .with_config("routes", json!([{ "keywords": "charge, refund", "target": "billing" }]))
    }

    #[tokio::test]
    async fn selects_the_named_candidate() {
        let gateway = Arc::new(MockGateway::new().reply(CHAT_TOOL_ID, ToolResponse::ok(json!({ "content": " Billing\n" }))));
        let block = triage_block();

        let output = RouterHandler::new(gateway.clone())
            .execute(&block, &block.config, &routing_ctx())
            .await
            .unwrap();

        assert_eq!(
            output,
            json!({
                "selectedBlockId": "billing",
                "selectedBlockType": "agent",
                "selectedBlockTitle": "Billing"
            })
        );

        let calls = gateway.calls();
        let system_prompt = calls[0].1["systemPrompt"].as_str().unwrap();
        assert!(system_prompt.contains("charge, refund -> billing"));
        assert!(!system_prompt.contains("\"id\":\"start\""));
        assert_eq!(calls[0].1["context"], "I was charged twice");
    }

    #[tokio::test]
    async fn reply_outside_candidates_is_fatal() {
        let gateway = Arc::new(MockGateway::new().reply(CHAT_TOOL_ID, ToolResponse::ok(json!("start"))));
        let block = triage_block();

        match RouterHandler::new(gateway).execute(&block, &block.config, &routing_ctx()).await {
            Err(BlockError::InvalidRoutingDecision { raw_response, candidate_ids }) => {
                assert_eq!(raw_response, "start");
                assert_eq!(candidate_ids, vec!["billing", "support"]);
            }
            other => panic!("expected InvalidRoutingDecision, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn gateway_failure_is_an_execution_error() {
        let gateway = Arc::new(MockGateway::new().reply(CHAT_TOOL_ID, ToolResponse::failed("rate limited", Value::Null)));
        let block = triage_block();

        assert!(matches!(
            RouterHandler::new(gateway).execute(&block, &block.config, &routing_ctx()).await,
            Err(BlockError::Execution { partial_output: None, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_routes_are_invalid_input() {
        let gateway = Arc::new(MockGateway::new());
        let block = Block::new("triage", BlockKind::Router).with_config("routes", json!("not a list"));

        assert!(matches!(
            RouterHandler::new(gateway).execute(&block, &block.config, &routing_ctx()).await,
            Err(BlockError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn back_edges_only_still_consults_the_gateway_and_fails() {
        // triage's only outgoing edge points back at its predecessor.
        let graph = WorkflowGraph::new(
            vec![Block::new("start", BlockKind::Starter), Block::new("triage", BlockKind::Router)],
            vec![Edge::between("start", "triage"), Edge::between("triage", "start")],
        );
        let ctx = ExecutionContext::new(Uuid::new_v4(), Arc::new(graph));
        let gateway = Arc::new(MockGateway::new().reply(CHAT_TOOL_ID, ToolResponse::ok(json!({ "content": "start" }))));
        let block = triage_block();

        let result = RouterHandler::new(gateway.clone()).execute(&block, &block.config, &ctx).await;

        assert_eq!(gateway.calls().len(), 1);
        match result {
            Err(BlockError::InvalidRoutingDecision { candidate_ids, .. }) => assert!(candidate_ids.is_empty()),
            other => panic!("expected InvalidRoutingDecision, got {other:?}"),
        }
    }
}
