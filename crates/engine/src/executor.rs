//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the reference orchestrator:
//! 1. Validates the graph (unique ids, valid edges, acyclic).
//! 2. Starts every block without incoming edges.
//! 3. When a block settles, resolves its outgoing edges: all of them on
//!    success, only the selected one for a router, none on failure.
//! 4. A block becomes ready once every incoming edge is resolved and at least
//!    one of them is live; if none is live it is skipped and its own outgoing
//!    edges are pruned in turn.  A block with any incoming edge from a failed
//!    (or failure-skipped) block is skipped even if another edge is live.
//!
//! Independent branches run concurrently on tokio tasks.  A failure only
//! affects the failed block's causal downstream.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use nodes::{
    default_registry, Block, BlockError, BlockKind, ExecutionContext, HandlerRegistry,
    PathTracker, ToolGateway, WorkflowGraph,
};

use crate::dag::validate_graph;
use crate::models::{BlockRun, BlockStatus, ExecutionReport};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound on handlers running at the same time within one run.
    pub max_parallel_blocks: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel_blocks: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge resolution bookkeeping
// ---------------------------------------------------------------------------

/// Which outgoing edges of a settled block are live.
enum Taken {
    All,
    Only(String),
    /// Not selected by a router, or unreachable: the target may still run
    /// through another live edge.
    Nothing,
    /// The source failed: everything downstream is skipped.
    Failed,
}

#[derive(Default)]
struct Settled {
    ready: Vec<String>,
    skipped: Vec<String>,
}

/// Counts unresolved and live incoming edges per block, and remembers which
/// blocks sit downstream of a failure.
struct Walk<'g> {
    graph: &'g WorkflowGraph,
    pending: HashMap<&'g str, usize>,
    live: HashMap<&'g str, usize>,
    poisoned: HashSet<&'g str>,
}

impl<'g> Walk<'g> {
    fn new(graph: &'g WorkflowGraph) -> Self {
        let mut pending: HashMap<&str, usize> =
            graph.blocks.iter().map(|b| (b.id.as_str(), 0)).collect();
        for edge in &graph.edges {
            *pending.entry(edge.target.as_str()).or_insert(0) += 1;
        }
        Self {
            graph,
            pending,
            live: HashMap::new(),
            poisoned: HashSet::new(),
        }
    }

    /// Blocks with no incoming edges, in declaration order.
    fn roots(&self) -> VecDeque<String> {
        self.graph
            .blocks
            .iter()
            .filter(|b| self.pending.get(b.id.as_str()) == Some(&0))
            .map(|b| b.id.clone())
            .collect()
    }

    /// Resolve the outgoing edges of `block_id`, cascading skips.
    fn settle(&mut self, block_id: &str, taken: Taken) -> Settled {
        let graph: &'g WorkflowGraph = self.graph;
        let mut settled = Settled::default();
        let mut worklist = vec![(block_id.to_owned(), taken)];

        while let Some((source, taken)) = worklist.pop() {
            for edge in graph.edges.iter().filter(|e| e.source == source) {
                let target = edge.target.as_str();
                let is_live = match &taken {
                    Taken::All => true,
                    Taken::Only(selected) => selected == target,
                    Taken::Nothing | Taken::Failed => false,
                };
                if is_live {
                    *self.live.entry(target).or_insert(0) += 1;
                }
                if matches!(taken, Taken::Failed) {
                    self.poisoned.insert(target);
                }

                let Some(remaining) = self.pending.get_mut(target) else {
                    continue;
                };
                *remaining = remaining.saturating_sub(1);
                if *remaining > 0 {
                    continue;
                }

                if self.poisoned.contains(target) {
                    settled.skipped.push(target.to_owned());
                    worklist.push((target.to_owned(), Taken::Failed));
                } else if self.live.get(target).copied().unwrap_or(0) > 0 {
                    settled.ready.push(target.to_owned());
                } else {
                    settled.skipped.push(target.to_owned());
                    worklist.push((target.to_owned(), Taken::Nothing));
                }
            }
        }

        settled
    }
}

/// Live edges of a block that produced `output`.
fn taken_edges(block: &Block, output: &Value) -> Taken {
    if block.kind == BlockKind::Router {
        match PathTracker::selected_target(output) {
            Some(target) => Taken::Only(target.to_owned()),
            None => Taken::Nothing,
        }
    } else {
        Taken::All
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator that runs workflow graphs through a handler
/// registry.
///
/// Construct one executor per process and call [`WorkflowExecutor::run`]
/// for every run.
pub struct WorkflowExecutor {
    registry: Arc<HandlerRegistry>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(registry: Arc<HandlerRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// Executor over the built-in handlers, all talking to `gateway`.
    pub fn with_builtin_handlers(
        gateway: Arc<dyn ToolGateway>,
        config: ExecutorConfig,
    ) -> Result<Self, EngineError> {
        let registry = default_registry(gateway)?;
        Ok(Self::new(Arc::new(registry), config))
    }

    /// Run `graph` with `initial_input` as the trigger payload.
    ///
    /// # Errors
    /// Returns `EngineError` for validation failures or a panicking handler.
    /// Block failures are reported in the [`ExecutionReport`].
    pub async fn run(
        &self,
        workflow_id: Uuid,
        graph: WorkflowGraph,
        initial_input: Value,
    ) -> Result<ExecutionReport, EngineError> {
        let ctx = ExecutionContext::new(workflow_id, Arc::new(graph)).with_input(initial_input);
        self.execute(ctx).await
    }

    /// Run with a caller-built context.  Blocks whose output is already in
    /// the context's state store are not dispatched again.
    #[instrument(skip(self, ctx), fields(workflow_id = %ctx.workflow_id, execution_id = %ctx.execution_id))]
    pub async fn execute(&self, ctx: ExecutionContext) -> Result<ExecutionReport, EngineError> {
        let order = validate_graph(ctx.workflow())?;
        info!("graph validated, {} blocks: {:?}", order.len(), order);

        let graph = ctx.workflow();
        let mut walk = Walk::new(graph);
        let mut ready = walk.roots();
        let mut runs: Vec<BlockRun> = Vec::with_capacity(graph.blocks.len());
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_blocks.max(1)));
        let mut tasks: JoinSet<(String, Result<Value, BlockError>)> = JoinSet::new();

        loop {
            // ------------------------------------------------------------------
            // Start everything that is ready.
            // ------------------------------------------------------------------
            while let Some(block_id) = ready.pop_front() {
                let Some(block) = ctx.block(&block_id) else {
                    warn!("ready block '{}' missing from graph", block_id);
                    continue;
                };

                if let Some(existing) = ctx.output(&block_id) {
                    debug!("block '{}' already has an output, reusing it", block_id);
                    let settled = walk.settle(&block_id, taken_edges(block, &existing));
                    runs.push(block_run(block, BlockStatus::Reused, Some(existing), None));
                    absorb(&ctx, settled, &mut ready, &mut runs);
                    continue;
                }

                let registry = self.registry.clone();
                let task_ctx = ctx.clone();
                let block = block.clone();
                let semaphore = semaphore.clone();
                tasks.spawn(async move {
                    let _permit = semaphore.acquire_owned().await;
                    let result = registry.dispatch(&block, &block.config, &task_ctx).await;
                    (block.id, result)
                });
            }

            // ------------------------------------------------------------------
            // Wait for the next block to settle.
            // ------------------------------------------------------------------
            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let (block_id, result) = joined.map_err(|e| EngineError::TaskPanicked(e.to_string()))?;
            let Some(block) = ctx.block(&block_id) else {
                continue;
            };

            let result = result.and_then(|output| {
                ctx.set(&block_id, output.clone())?;
                Ok(output)
            });

            let settled = match result {
                Ok(output) => {
                    info!("block '{}' succeeded", block_id);
                    let settled = walk.settle(&block_id, taken_edges(block, &output));
                    runs.push(block_run(block, BlockStatus::Succeeded, Some(output), None));
                    settled
                }
                Err(err) => {
                    error!("block '{}' failed: {}", block_id, err);
                    let settled = walk.settle(&block_id, Taken::Failed);
                    runs.push(block_run(block, BlockStatus::Failed, None, Some(err)));
                    settled
                }
            };
            absorb(&ctx, settled, &mut ready, &mut runs);
        }

        let report = ExecutionReport {
            workflow_id: ctx.workflow_id,
            execution_id: ctx.execution_id,
            runs,
            block_states: ctx.block_states().snapshot(),
        };

        if report.is_success() {
            info!("execution {} succeeded", ctx.execution_id);
        } else {
            warn!(
                "execution {} finished with {} failed block(s)",
                ctx.execution_id,
                report.failures().count()
            );
        }

        Ok(report)
    }
}

fn absorb(ctx: &ExecutionContext, settled: Settled, ready: &mut VecDeque<String>, runs: &mut Vec<BlockRun>) {
    for block_id in settled.skipped {
        debug!("block '{}' skipped, no live incoming edge", block_id);
        if let Some(block) = ctx.block(&block_id) {
            runs.push(block_run(block, BlockStatus::Skipped, None, None));
        }
    }
    ready.extend(settled.ready);
}

fn block_run(
    block: &Block,
    status: BlockStatus,
    output: Option<Value>,
    error: Option<BlockError>,
) -> BlockRun {
    BlockRun {
        block_id: block.id.clone(),
        block_name: block.display_name().to_owned(),
        status,
        output,
        error,
        finished_at: Utc::now(),
    }
}
