//! Graph validation — run this before deploying or executing a workflow.
//!
//! Rules enforced:
//! 1. Block IDs must be unique within the graph.
//! 2. Every edge must reference valid block IDs (both `source` and `target`).
//! 3. For execution, the directed graph must be acyclic.
//!
//! Returns a topologically-sorted list of block IDs on success.

use std::collections::{HashMap, HashSet, VecDeque};

use nodes::WorkflowGraph;

use crate::EngineError;

/// Check rules 1 and 2 only.  Cyclic graphs pass; they are valid snapshots
/// even though the executor refuses to run them.
///
/// # Errors
/// - [`EngineError::DuplicateBlockId`] if two blocks share an ID.
/// - [`EngineError::UnknownBlockReference`] if an edge references a missing block.
pub fn check_references(graph: &WorkflowGraph) -> Result<(), EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for block in &graph.blocks {
        if !seen_ids.insert(block.id.as_str()) {
            return Err(EngineError::DuplicateBlockId(block.id.clone()));
        }
    }

    for edge in &graph.edges {
        for (block_id, side) in [(&edge.source, "source"), (&edge.target, "target")] {
            if !seen_ids.contains(block_id.as_str()) {
                return Err(EngineError::UnknownBlockReference {
                    edge_id: edge.id.clone(),
                    block_id: block_id.clone(),
                    side,
                });
            }
        }
    }

    Ok(())
}

/// Validate the graph and return blocks in topological execution order.
///
/// Ties are broken by declaration order, so the result is deterministic.
///
/// # Errors
/// Everything [`check_references`] reports, plus
/// [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_graph(graph: &WorkflowGraph) -> Result<Vec<String>, EngineError> {
    check_references(graph)?;

    // Kahn's algorithm over the declared blocks.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = graph
        .blocks
        .iter()
        .map(|b| (b.id.as_str(), 0))
        .collect();

    for edge in &graph.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = graph
        .blocks
        .iter()
        .map(|b| b.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(graph.blocks.len());

    while let Some(block_id) = queue.pop_front() {
        sorted.push(block_id.to_owned());

        if let Some(neighbours) = adjacency.get(block_id) {
            for &neighbour in neighbours {
                if let Some(deg) = in_degree.get_mut(neighbour) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(neighbour);
                    }
                }
            }
        }
    }

    // If we didn't visit every block the graph contains a cycle.
    if sorted.len() != graph.blocks.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(sorted)
}
