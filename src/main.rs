use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use tunebridge::api::{create_auth_router, create_tool_router, AuthAppState, ToolAppState};
use tunebridge::config::Config;
use tunebridge::credentials::open_store;
use tunebridge::session::{build_http_client, SessionServices};
use tunebridge::tools::ToolDispatcher;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tunebridge=info".into()),
        )
        .init();

    info!("Tunebridge starting...");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        bind = %config.server.bind,
        database = config.storage.database.as_deref().unwrap_or("<memory>"),
        api_base_url = %config.api_base_url,
        refresh_skew_seconds = config.session.refresh_skew_seconds,
        "Configuration loaded"
    );

    let store = open_store(&config.storage).context("Failed to open credential store")?;
    info!(sessions = store.count()?, "Credential store initialized");

    let http = build_http_client(&config)?;
    let services = SessionServices::new(&config, store, http);
    let dispatcher = ToolDispatcher::new(Arc::clone(&services.resolver));

    let router = create_auth_router(AuthAppState {
        flow: Arc::clone(&services.flow),
    })
    .merge(create_tool_router(ToolAppState { dispatcher }))
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Tunebridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl_c signal");
        return;
    }
    info!("Shutdown signal received");
}
