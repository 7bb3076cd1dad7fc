//! Per-run execution context and the block state store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StateError;
use crate::models::{Block, Edge, WorkflowGraph};

/// Recorded result of one executed block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    pub output: Value,
    pub executed_at: DateTime<Utc>,
}

/// Write-once map from block id to its output for a single run.
///
/// Reads of any key and writes to distinct keys may happen concurrently.
/// A second write to the same key is refused and leaves the first value in
/// place.
#[derive(Debug, Default)]
pub struct BlockStateStore {
    states: DashMap<String, BlockState>,
}

impl BlockStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means the block has not executed in this run.
    pub fn get(&self, block_id: &str) -> Option<BlockState> {
        self.states.get(block_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, block_id: &str) -> bool {
        self.states.contains_key(block_id)
    }

    /// Record `output` for `block_id`.
    ///
    /// # Errors
    /// [`StateError::AlreadyWritten`] if the block already has an output.
    pub fn set(&self, block_id: impl Into<String>, output: Value) -> Result<(), StateError> {
        match self.states.entry(block_id.into()) {
            Entry::Occupied(occupied) => Err(StateError::AlreadyWritten {
                block_id: occupied.key().clone(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(BlockState {
                    output,
                    executed_at: Utc::now(),
                });
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Point-in-time copy of every recorded state.
    pub fn snapshot(&self) -> HashMap<String, BlockState> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

/// Shared context passed to every handler during a run.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// handlers can use it without a circular dependency.  Cloning is cheap: the
/// graph and the state store are shared.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current run.
    pub execution_id: Uuid,
    /// Trigger payload supplied when the run started.
    pub input: Value,
    workflow: Arc<WorkflowGraph>,
    block_states: Arc<BlockStateStore>,
}

impl ExecutionContext {
    pub fn new(workflow_id: Uuid, workflow: Arc<WorkflowGraph>) -> Self {
        Self {
            workflow_id,
            execution_id: Uuid::new_v4(),
            input: Value::Null,
            workflow,
            block_states: Arc::new(BlockStateStore::new()),
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    pub fn workflow(&self) -> &WorkflowGraph {
        &self.workflow
    }

    pub fn blocks(&self) -> &[Block] {
        &self.workflow.blocks
    }

    pub fn edges(&self) -> &[Edge] {
        &self.workflow.edges
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        self.workflow.block(block_id)
    }

    pub fn block_states(&self) -> &BlockStateStore {
        &self.block_states
    }

    pub fn get(&self, block_id: &str) -> Option<BlockState> {
        self.block_states.get(block_id)
    }

    /// Shorthand for the recorded output of `block_id`.
    pub fn output(&self, block_id: &str) -> Option<Value> {
        self.block_states.get(block_id).map(|state| state.output)
    }

    pub fn set(&self, block_id: impl Into<String>, output: Value) -> Result<(), StateError> {
        self.block_states.set(block_id, output)
    }
}
