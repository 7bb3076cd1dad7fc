//! Block-level error types.

use serde_json::Value;
use thiserror::Error;

use crate::models::BlockKind;

/// Errors returned by dispatch or by a handler's `execute` method.
///
/// Every variant is terminal for the block that raised it: the engine marks
/// the block failed and prunes everything causally downstream of it.
#[derive(Debug, Error, Clone)]
pub enum BlockError {
    /// No registered handler accepts the block's type.
    #[error("no handler registered for block '{block_id}' of type '{kind}'")]
    HandlerNotFound { block_id: String, kind: BlockKind },

    /// The tool gateway does not know the requested tool.
    #[error("tool not found: '{tool_id}'")]
    ToolNotFound { tool_id: String },

    /// Runtime failure inside a handler, usually a failed tool call.
    #[error("block '{block_name}' ({block_id}) failed: {message}")]
    Execution {
        block_id: String,
        block_name: String,
        message: String,
        /// Whatever the failing call produced before it gave up.
        partial_output: Option<Value>,
    },

    /// The router's decision did not name one of its candidates.
    #[error("routing response '{raw_response}' matches none of {candidate_ids:?}")]
    InvalidRoutingDecision {
        raw_response: String,
        candidate_ids: Vec<String>,
    },

    /// The block's resolved inputs are missing or malformed.
    #[error("invalid input for block '{block_id}': {message}")]
    InvalidInput { block_id: String, message: String },

    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors from the per-run block state store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A block id may be written once per run.
    #[error("block '{block_id}' already has an output for this run")]
    AlreadyWritten { block_id: String },
}

/// Errors detected while building a [`HandlerRegistry`](crate::HandlerRegistry).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("more than one handler claims block type '{kind}'")]
    DuplicateHandler { kind: BlockKind },
}
