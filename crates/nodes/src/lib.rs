//! `nodes` crate — the graph model, the per-run execution context, the
//! `BlockHandler` trait with its registry, the built-in handlers, the router
//! path tracker and the tool gateway.
//!
//! Every handler — built-in and custom alike — implements [`BlockHandler`].
//! The engine crate dispatches execution through a [`HandlerRegistry`].

pub mod context;
pub mod error;
pub mod handlers;
pub mod mock;
pub mod models;
pub mod path;
pub mod registry;
pub mod tools;
pub mod traits;

pub use context::{BlockState, BlockStateStore, ExecutionContext};
pub use error::{BlockError, RegistryError, StateError};
pub use models::{Block, BlockKind, Edge, WorkflowGraph};
pub use path::{PathTracker, RoutingDecision, RoutingRule};
pub use registry::{default_registry, HandlerRegistry};
pub use tools::{ToolError, ToolGateway, ToolRegistry, ToolResponse};
pub use traits::BlockHandler;
