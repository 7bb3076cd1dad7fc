//! Handler registry — maps each block to the one handler that runs it.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::RegistryError;
use crate::handlers::{AgentHandler, ApiHandler, RouterHandler, StarterHandler};
use crate::models::{Block, BlockKind};
use crate::tools::ToolGateway;
use crate::traits::BlockHandler;
use crate::BlockError;

/// Explicit list of handlers, built once at process start and injected into
/// whoever dispatches blocks.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn BlockHandler>>,
}

impl HandlerRegistry {
    /// Build a registry from `handlers`.
    ///
    /// Every [`BlockKind`] is checked against every handler's `can_handle`.
    ///
    /// # Errors
    /// [`RegistryError::DuplicateHandler`] if two handlers accept the same
    /// kind.
    pub fn new(handlers: Vec<Arc<dyn BlockHandler>>) -> Result<Self, RegistryError> {
        for kind in BlockKind::ALL {
            let sample = Block::new(format!("__check_{kind}"), kind);
            let claims = handlers.iter().filter(|h| h.can_handle(&sample)).count();
            if claims > 1 {
                return Err(RegistryError::DuplicateHandler { kind });
            }
        }
        Ok(Self { handlers })
    }

    /// The unique handler accepting `block`, if any.
    pub fn handler_for(&self, block: &Block) -> Option<&Arc<dyn BlockHandler>> {
        self.handlers.iter().find(|h| h.can_handle(block))
    }

    /// Kinds that have a handler, in declaration order.
    pub fn kinds(&self) -> Vec<BlockKind> {
        BlockKind::ALL
            .into_iter()
            .filter(|kind| {
                let sample = Block::new(String::new(), *kind);
                self.handler_for(&sample).is_some()
            })
            .collect()
    }

    /// Run `block` on its handler.
    ///
    /// # Errors
    /// [`BlockError::HandlerNotFound`] if nothing accepts the block, or
    /// whatever the handler itself returns.
    pub async fn dispatch(
        &self,
        block: &Block,
        inputs: &Map<String, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, BlockError> {
        let handler = self.handler_for(block).ok_or_else(|| BlockError::HandlerNotFound {
            block_id: block.id.clone(),
            kind: block.kind,
        })?;
        debug!(block_id = %block.id, kind = %block.kind, "dispatching block");
        handler.execute(block, inputs, ctx).await
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// Registry with the built-in handlers, all sharing one tool gateway.
pub fn default_registry(gateway: Arc<dyn ToolGateway>) -> Result<HandlerRegistry, RegistryError> {
    HandlerRegistry::new(vec![
        Arc::new(StarterHandler),
        Arc::new(AgentHandler::new(gateway.clone())),
        Arc::new(ApiHandler::new(gateway.clone())),
        Arc::new(RouterHandler::new(gateway)),
    ])
}
