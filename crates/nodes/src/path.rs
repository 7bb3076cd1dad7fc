//! Path tracker — candidate selection and decision resolution for router
//! blocks.
//!
//! For a router `R`:
//! 1. Predecessors are the direct sources of edges into `R`.
//! 2. Candidates are the targets of edges out of `R`, minus the predecessors,
//!    deduplicated in edge order.  Back-edges to whoever fed the router can
//!    therefore never be chosen.
//! 3. The external decision must name exactly one candidate id (after
//!    trimming and lower-casing), otherwise the router fails.
//!
//! An empty candidate set is not special-cased; resolution simply can never
//! succeed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ExecutionContext;
use crate::models::BlockKind;
use crate::BlockError;

/// What the decision maker is told about one downstream option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub title: String,
    pub description: String,
    pub config: Map<String, Value>,
    /// Output of the candidate if it already ran in this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<Value>,
}

/// Caller-declared keyword hint. Passed to the decision maker verbatim and
/// never enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Comma-separated keyword list.
    pub keywords: String,
    pub target: String,
}

/// Output of a router block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub selected_block_id: String,
    pub selected_block_type: BlockKind,
    pub selected_block_title: String,
}

const ROUTING_INSTRUCTIONS: &str = "You are a routing component inside a workflow. \
Read the request below and choose the single block that should handle it next. \
Reply with the id of the chosen block and nothing else: no punctuation, no explanation.";

/// Prompt sent to the decision maker.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub candidates: &'a [CandidateDescriptor],
    pub rules: &'a [RoutingRule],
    pub text: &'a str,
}

impl<'a> DecisionRequest<'a> {
    pub fn new(candidates: &'a [CandidateDescriptor], rules: &'a [RoutingRule], text: &'a str) -> Self {
        Self {
            candidates,
            rules,
            text,
        }
    }

    /// Static instructions followed by the candidate list and keyword hints.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from(ROUTING_INSTRUCTIONS);

        prompt.push_str("\n\nAvailable blocks:\n");
        for candidate in self.candidates {
            let described = serde_json::to_string(candidate).unwrap_or_else(|_| candidate.id.clone());
            prompt.push_str("- ");
            prompt.push_str(&described);
            prompt.push('\n');
        }

        if !self.rules.is_empty() {
            prompt.push_str("\nKeyword hints (keywords -> block id):\n");
            for rule in self.rules {
                prompt.push_str(&format!("- {} -> {}\n", rule.keywords.trim(), rule.target));
            }
        }

        prompt
    }

    pub fn candidate_ids(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.id.clone()).collect()
    }
}

/// Read-only view over the graph and block states of one run.
#[derive(Debug, Clone, Copy)]
pub struct PathTracker<'a> {
    ctx: &'a ExecutionContext,
}

impl<'a> PathTracker<'a> {
    pub fn new(ctx: &'a ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Direct predecessors of `block_id`, deduplicated in edge order.
    pub fn predecessors(&self, block_id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.ctx
            .workflow()
            .incoming(block_id)
            .filter(|edge| seen.insert(edge.source.as_str()))
            .map(|edge| edge.source.clone())
            .collect()
    }

    /// Outgoing targets of the router that are not also its predecessors.
    pub fn candidate_ids(&self, router_id: &str) -> Vec<String> {
        let predecessors: HashSet<String> = self.predecessors(router_id).into_iter().collect();
        let mut seen = HashSet::new();
        self.ctx
            .workflow()
            .outgoing(router_id)
            .map(|edge| edge.target.as_str())
            .filter(|target| !predecessors.contains(*target))
            .filter(|target| seen.insert(*target))
            .map(str::to_owned)
            .collect()
    }

    /// Descriptors for every candidate of `router_id`.
    pub fn candidates(&self, router_id: &str) -> Vec<CandidateDescriptor> {
        self.candidate_ids(router_id)
            .into_iter()
            .filter_map(|id| {
                let block = self.ctx.block(&id)?;
                Some(CandidateDescriptor {
                    current_state: self.ctx.output(&id),
                    id,
                    kind: block.kind,
                    title: block.title.clone(),
                    description: block.description.clone(),
                    config: block.config.clone(),
                })
            })
            .collect()
    }

    /// Match the decision maker's reply against the candidate ids.
    ///
    /// # Errors
    /// [`BlockError::InvalidRoutingDecision`] when the normalised reply is
    /// not exactly one of the candidate ids.
    pub fn resolve(
        candidates: &[CandidateDescriptor],
        raw_response: &str,
    ) -> Result<RoutingDecision, BlockError> {
        let chosen = raw_response.trim().to_lowercase();
        candidates
            .iter()
            .find(|candidate| candidate.id == chosen)
            .map(|candidate| RoutingDecision {
                selected_block_id: candidate.id.clone(),
                selected_block_type: candidate.kind,
                selected_block_title: candidate.title.clone(),
            })
            .ok_or_else(|| BlockError::InvalidRoutingDecision {
                raw_response: raw_response.to_owned(),
                candidate_ids: candidates.iter().map(|c| c.id.clone()).collect(),
            })
    }

    /// The block id a router output selected, if the output is a decision.
    pub fn selected_target(router_output: &Value) -> Option<&str> {
        router_output.get("selectedBlockId").and_then(Value::as_str)
    }
}
