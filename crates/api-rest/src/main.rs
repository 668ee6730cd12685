//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own, with the same environment as the workspace's
//! `telecare-run` binary. Useful for development when only the HTTP surface and Swagger UI
//! are needed.

use api_rest::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts the REST API on `TELECARE_REST_ADDR` (default: "0.0.0.0:3000").
///
/// See [`AppState::from_env`] for the remaining environment variables.
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration or store cannot be loaded,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("telecare_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("TELECARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("-- Starting Telecare REST API on {}", addr);

    let state = AppState::from_env().await?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
