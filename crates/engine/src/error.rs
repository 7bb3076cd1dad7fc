//! Engine-level error types.

use nodes::RegistryError;
use thiserror::Error;

/// Errors produced by the workflow engine (validation + orchestration).
///
/// Failures of individual blocks are not engine errors: they are recorded in
/// the [`ExecutionReport`](crate::ExecutionReport) and only prune the failed
/// block's downstream.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more blocks share the same ID.
    #[error("duplicate block ID: '{0}'")]
    DuplicateBlockId(String),

    /// An edge references a block ID that doesn't exist in the graph.
    #[error("edge '{edge_id}' references unknown block '{block_id}' ({side} side)")]
    UnknownBlockReference {
        edge_id: String,
        block_id: String,
        side: &'static str,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    // ------ Orchestration errors ------

    /// The handler set could not be assembled.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A block task panicked; the run cannot account for its downstream.
    #[error("block task panicked: {0}")]
    TaskPanicked(String),
}
