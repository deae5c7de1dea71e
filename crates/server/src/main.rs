use anyhow::Context;
use db::DBService;
use server::{AppState, app};
use services::services::config::{LocationConfig, parse_or};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::logging::init_tracing("info");

    let config = LocationConfig::from_env();
    let lookup = |key: &str| std::env::var(key).ok();
    let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = parse_or(&lookup, "PORT", 3001);

    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    let state = AppState::new(&db, &config)?;

    // Warm the directory in the background; requests that arrive first wait for this load.
    let _initial = state.directory.spawn_load();

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
