//! `blockflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — run migrations, then start the deployments API.
//! - `migrate`  — run pending database migrations.
//! - `validate` — validate a workflow graph JSON file.
//! - `run`      — execute a workflow graph file once and print the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use engine::{validate_graph, BlockKind, BlockStatus, ExecutorConfig, WorkflowExecutor, WorkflowGraph};
use nodes::handlers::CHAT_TOOL_ID;
use nodes::tools::HttpTool;
use nodes::ToolRegistry;

#[derive(Parser)]
#[command(name = "blockflow", about = "Workflow block execution core", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://blockflow.db")]
    database_url: String,

    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "BIND", default_value = "0.0.0.0:8080")]
        bind: String,

        #[command(flatten)]
        db: DbArgs,
    },
    /// Run pending database migrations.
    Migrate {
        #[command(flatten)]
        db: DbArgs,
    },
    /// Validate a workflow graph JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Execute a workflow graph JSON file once.
    ///
    /// Only the `http_request` tool is available, so agent and router blocks
    /// fail unless a model gateway is registered.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,

        /// Trigger payload handed to the starter block (JSON).
        #[arg(long, default_value = "{}")]
        input: String,

        #[arg(long, default_value_t = ExecutorConfig::default().max_parallel_blocks)]
        max_parallel_blocks: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, db } => {
            let pool = connect(&db).await?;
            db::run_migrations(&pool).await?;
            info!("Starting API server on {bind}");
            api::serve(api::AppState::new(pool), &bind).await?;
        }
        Command::Migrate { db } => {
            info!("Running migrations against {}", db.database_url);
            let pool = connect(&db).await?;
            db::run_migrations(&pool).await.context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let graph = load_graph(&path)?;
            match validate_graph(&graph) {
                Ok(order) => println!("✅ Workflow is valid. Execution order: {order:?}"),
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run {
            path,
            input,
            max_parallel_blocks,
        } => {
            let graph = load_graph(&path)?;
            let input: Value = serde_json::from_str(&input).context("--input is not valid JSON")?;

            let mut tools = ToolRegistry::new();
            tools.register(Arc::new(HttpTool::default()));
            let needs_model = graph
                .blocks
                .iter()
                .any(|b| matches!(b.kind, BlockKind::Agent | BlockKind::Router));
            if needs_model && !tools.contains(CHAT_TOOL_ID) {
                warn!(
                    tools = ?tools.tool_ids(),
                    "no {CHAT_TOOL_ID} tool registered; agent and router blocks will fail"
                );
            }
            let executor = WorkflowExecutor::with_builtin_handlers(
                Arc::new(tools),
                ExecutorConfig { max_parallel_blocks },
            )?;

            let report = executor.run(Uuid::new_v4(), graph, input).await?;
            for run in &report.runs {
                match (&run.status, &run.error) {
                    (BlockStatus::Failed, Some(err)) => println!("{:<10} {} ({}): {err}", "failed", run.block_id, run.block_name),
                    (status, _) => println!("{:<10} {} ({})", format!("{status:?}").to_lowercase(), run.block_id, run.block_name),
                }
            }
            println!("{}", serde_json::to_string_pretty(&report.block_states)?);

            if !report.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn connect(args: &DbArgs) -> anyhow::Result<db::DbPool> {
    db::create_pool(&args.database_url, args.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", args.database_url))
}

fn load_graph(path: &Path) -> anyhow::Result<WorkflowGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid workflow JSON")
}
