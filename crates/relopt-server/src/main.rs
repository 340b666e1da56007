//! # relopt-server: HTTP Service for the Heuristic Planner
//!
//! Accepts logical plans as JSON, rewrites them with the built-in rules and
//! returns the chosen plan.
//!
//! ## Endpoints
//!
//! - `GET  /health`   - Health check
//! - `GET  /rules`    - List registered rules and their operands
//! - `POST /optimize` - Optimize a JSON plan
//!
//! ## Configuration
//!
//! The server listens on `RELOPT_ADDR` (default `0.0.0.0:3000`). Logging is
//! controlled by the `RUST_LOG` environment variable (defaults to
//! `relopt=debug`).

mod plan_json;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

fn router(state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/rules", get(routes::list_rules))
        .route("/optimize", post(routes::optimize))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("relopt=debug".parse()?))
        .init();

    let state = Arc::new(state::AppState::new());
    let app = router(state);

    let addr = std::env::var("RELOPT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("relopt-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
