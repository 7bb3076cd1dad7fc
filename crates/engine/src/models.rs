//! Run-result types produced by the executor.
//!
//! The graph itself (blocks, edges) lives in the `nodes` crate so handlers
//! can see it; it is re-exported from here for convenience.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub use nodes::{Block, BlockKind, Edge, WorkflowGraph};

use nodes::{BlockError, BlockState};

// ---------------------------------------------------------------------------
// BlockStatus
// ---------------------------------------------------------------------------

/// Final state of one block in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// Handler ran and returned an output.
    Succeeded,
    /// Output was already present in the state store when the block became
    /// ready (e.g. a pre-seeded trigger payload); the handler was not called.
    Reused,
    /// Handler (or dispatch) failed; downstream was pruned.
    Failed,
    /// Never reached: every incoming edge was pruned.
    Skipped,
}

// ---------------------------------------------------------------------------
// BlockRun
// ---------------------------------------------------------------------------

/// What happened to one block.
#[derive(Debug, Clone)]
pub struct BlockRun {
    pub block_id: String,
    pub block_name: String,
    pub status: BlockStatus,
    pub output: Option<Value>,
    pub error: Option<BlockError>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ExecutionReport
// ---------------------------------------------------------------------------

/// The result of running a full workflow.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub workflow_id: Uuid,
    pub execution_id: Uuid,
    /// One entry per block, in the order the engine settled them.
    pub runs: Vec<BlockRun>,
    /// Final contents of the block state store.
    pub block_states: HashMap<String, BlockState>,
}

impl ExecutionReport {
    pub fn run(&self, block_id: &str) -> Option<&BlockRun> {
        self.runs.iter().find(|r| r.block_id == block_id)
    }

    pub fn status(&self, block_id: &str) -> Option<BlockStatus> {
        self.run(block_id).map(|r| r.status)
    }

    pub fn output(&self, block_id: &str) -> Option<&Value> {
        self.block_states.get(block_id).map(|s| &s.output)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BlockRun> {
        self.runs.iter().filter(|r| r.status == BlockStatus::Failed)
    }

    /// `true` when no block failed.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Block ids with `status`, in settle order.
    pub fn blocks_with(&self, status: BlockStatus) -> Vec<&str> {
        self.runs
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.block_id.as_str())
            .collect()
    }
}
