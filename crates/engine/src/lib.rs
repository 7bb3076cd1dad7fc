//! `engine` crate — graph validation and the reference execution engine.

pub mod dag;
pub mod error;
pub mod executor;
pub mod models;

pub use dag::{check_references, validate_graph};
pub use error::EngineError;
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use models::{BlockRun, BlockStatus, ExecutionReport};
pub use models::{Block, BlockKind, Edge, WorkflowGraph};
