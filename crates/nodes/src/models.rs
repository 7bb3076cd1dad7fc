//! Graph model shared by handlers, the router and the engine.
//!
//! A [`WorkflowGraph`] is the read-only description of one workflow snapshot:
//! an ordered list of blocks plus the directed edges between them.  The same
//! shape is serialised into the `state` column of a deployment version.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// BlockKind
// ---------------------------------------------------------------------------

/// Closed set of block types understood by the handler registry.
///
/// Unknown type strings are rejected when a graph is deserialised, so a
/// dispatch can never see a kind that was not known at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Entry point; exposes the trigger payload.
    Starter,
    /// Model call through the tool gateway.
    Agent,
    /// HTTP request through the tool gateway.
    Api,
    /// Picks exactly one outgoing edge at run time.
    Router,
}

impl BlockKind {
    /// Every kind, in declaration order.
    pub const ALL: [BlockKind; 4] = [
        BlockKind::Starter,
        BlockKind::Agent,
        BlockKind::Api,
        BlockKind::Router,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Agent => "agent",
            Self::Api => "api",
            Self::Router => "router",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A single executable unit in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier within the graph (referenced by edges).
    pub id: String,
    /// Type tag used only for handler dispatch.
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Resolved parameters. References to upstream outputs have already been
    /// substituted by the time a run starts.
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            title: String::new(),
            description: String::new(),
            config: Map::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Name used in error messages: the title, or the id when untitled.
    pub fn display_name(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one block's output to another block's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Edge whose id is derived from its endpoints (`source->target`).
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// Ordered blocks and edges for one workflow snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub blocks: Vec<Block>,
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn new(blocks: Vec<Block>, edges: Vec<Edge>) -> Self {
        Self { blocks, edges }
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Edges whose target is `block_id`, in declaration order.
    pub fn incoming<'a>(&'a self, block_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == block_id)
    }

    /// Edges whose source is `block_id`, in declaration order.
    pub fn outgoing<'a>(&'a self, block_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == block_id)
    }
}
