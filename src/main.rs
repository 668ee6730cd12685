use api_rest::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the telecare service
///
/// Loads `.env`, opens the consultation store and serves the REST API until interrupted.
///
/// # Environment Variables
/// - `TELECARE_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `TELECARE_DATA_DIR`: data directory (default: "telecare_data")
/// - `TELECARE_STORE`: `file` or `memory` (default: `file`)
/// - `TELECARE_AUDIT_READ_LIMIT`: maximum audit events per read
/// - `API_KEY`: when set, required in the `x-api-key` header
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telecare_run=info".parse()?)
                .add_directive("telecare_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("TELECARE_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting Telecare REST on {}", rest_addr);

    let state = AppState::from_env().await?;
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let failures = state.service().audit_write_failures();
    if failures > 0 {
        tracing::warn!("{} audit event(s) could not be written this run", failures);
    }
    tracing::info!("-- Telecare stopped");
    Ok(())
}
