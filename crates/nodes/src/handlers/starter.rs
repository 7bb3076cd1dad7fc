//! Starter block: exposes the trigger payload to the rest of the graph.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::models::{Block, BlockKind};
use crate::traits::BlockHandler;
use crate::BlockError;

#[derive(Debug, Default, Clone, Copy)]
pub struct StarterHandler;

#[async_trait]
impl BlockHandler for StarterHandler {
    fn kind(&self) -> BlockKind {
        BlockKind::Starter
    }

    /// A payload already stored for this block (e.g. seeded by a webhook)
    /// is returned as is.  Otherwise the output is the block's own inputs
    /// plus the run's trigger payload under `input`.
    async fn execute(
        &self,
        block: &Block,
        inputs: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, BlockError> {
        if let Some(seeded) = ctx.output(&block.id) {
            return Ok(seeded);
        }

        let mut output = inputs.clone();
        output.insert("input".to_owned(), ctx.input.clone());
        Ok(Value::Object(output))
    }
}
