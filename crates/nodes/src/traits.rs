//! The `BlockHandler` trait — the contract every block handler must fulfil.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::models::{Block, BlockKind};
use crate::BlockError;

/// The core handler trait.
///
/// A handler owns the side-effecting work of running one kind of block.
/// Handlers are collected into a [`HandlerRegistry`](crate::HandlerRegistry)
/// at process start; no two of them may accept the same kind.
#[async_trait]
pub trait BlockHandler: Send + Sync {
    /// The kind this handler is registered for.
    fn kind(&self) -> BlockKind;

    /// Pure predicate over the block's type tag.
    fn can_handle(&self, block: &Block) -> bool {
        block.kind == self.kind()
    }

    /// Run `block` with its fully resolved `inputs` and return its output.
    async fn execute(
        &self,
        block: &Block,
        inputs: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, BlockError>;
}
