//! `api` crate — HTTP surface for deployment versions.
//!
//! Exposes:
//!   GET    /workflows/:id/deployments
//!   POST   /workflows/:id/deployments
//!   GET    /workflows/:id/deployments/:version
//!   PATCH  /workflows/:id/deployments/:version
//!   POST   /workflows/:id/deployments/:version/activate
//!
//! The caller's identity comes from the `x-user-id` header set by the
//! upstream auth layer; access is checked against the workflow's workspace.

pub mod auth;
pub mod error;
pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use db::DbPool;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
}

impl AppState {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    use handlers::deployments;

    Router::new()
        .route(
            "/workflows/:id/deployments",
            get(deployments::list).post(deployments::deploy),
        )
        .route(
            "/workflows/:id/deployments/:version",
            get(deployments::get).patch(deployments::rename),
        )
        .route(
            "/workflows/:id/deployments/:version/activate",
            post(deployments::activate),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on `bind` until Ctrl-C.
pub async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!(%bind, "API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}

#[cfg(test)]
mod routes_tests;
