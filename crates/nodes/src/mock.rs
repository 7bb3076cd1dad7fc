//! Test doubles for `BlockHandler` and `ToolGateway`.
//!
//! Useful in unit and integration tests where a real handler or a live
//! external integration is either unavailable or irrelevant.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::context::ExecutionContext;
use crate::models::{Block, BlockKind};
use crate::tools::{ToolError, ToolGateway, ToolResponse};
use crate::traits::BlockHandler;
use crate::BlockError;

// ---------------------------------------------------------------------------
// MockHandler
// ---------------------------------------------------------------------------

/// Behaviour injected into `MockHandler` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value, tagged with the block id.
    ReturnValue(Value),
    /// Fail with an `Execution` error.
    Fail(String),
}

/// A mock handler that records every block it runs and returns a
/// programmer-specified result.
pub struct MockHandler {
    pub kind: BlockKind,
    pub behaviour: MockBehaviour,
    /// Block ids that fail regardless of `behaviour`.
    pub failing_blocks: Vec<String>,
    /// Ids of every block executed (in call order).
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockHandler {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(kind: BlockKind, value: Value) -> Self {
        Self {
            kind,
            behaviour: MockBehaviour::ReturnValue(value),
            failing_blocks: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails.
    pub fn failing(kind: BlockKind, msg: impl Into<String>) -> Self {
        Self {
            behaviour: MockBehaviour::Fail(msg.into()),
            ..Self::returning(kind, Value::Null)
        }
    }

    /// Fail only for the given block id; other blocks follow `behaviour`.
    pub fn failing_for(mut self, block_id: impl Into<String>) -> Self {
        self.failing_blocks.push(block_id.into());
        self
    }

    /// Ids of the blocks this handler executed, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of times this handler has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BlockHandler for MockHandler {
    fn kind(&self) -> BlockKind {
        self.kind
    }

    async fn execute(
        &self,
        block: &Block,
        _inputs: &Map<String, Value>,
        _ctx: &ExecutionContext,
    ) -> Result<Value, BlockError> {
        self.calls.lock().unwrap().push(block.id.clone());

        let fail = |msg: &str| BlockError::Execution {
            block_id: block.id.clone(),
            block_name: block.display_name().to_owned(),
            message: msg.to_owned(),
            partial_output: None,
        };

        if self.failing_blocks.contains(&block.id) {
            return Err(fail("mock failure"));
        }

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => {
                // Tag the output with the block id so tests can trace which
                // block produced it.
                let mut out = json!({ "block": block.id });
                if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
                    for (k, val) in v_obj {
                        out_obj.insert(k.clone(), val.clone());
                    }
                }
                Ok(out)
            }
            MockBehaviour::Fail(msg) => Err(fail(msg.as_str())),
        }
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

enum MockReply {
    Respond(ToolResponse),
    Error(ToolError),
}

/// Gateway with scripted replies per tool id; unknown ids are `NotFound`.
#[derive(Default)]
pub struct MockGateway {
    replies: HashMap<String, MockReply>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, tool_id: impl Into<String>, response: ToolResponse) -> Self {
        self.replies.insert(tool_id.into(), MockReply::Respond(response));
        self
    }

    pub fn fail(mut self, tool_id: impl Into<String>, error: ToolError) -> Self {
        self.replies.insert(tool_id.into(), MockReply::Error(error));
        self
    }

    /// Every `(tool_id, params)` pair received, in call order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolGateway for MockGateway {
    async fn invoke(
        &self,
        tool_id: &str,
        params: Value,
        _ctx: &ExecutionContext,
    ) -> Result<ToolResponse, ToolError> {
        self.calls.lock().unwrap().push((tool_id.to_owned(), params));
        match self.replies.get(tool_id) {
            Some(MockReply::Respond(response)) => Ok(response.clone()),
            Some(MockReply::Error(error)) => Err(error.clone()),
            None => Err(ToolError::NotFound(tool_id.to_owned())),
        }
    }
}
