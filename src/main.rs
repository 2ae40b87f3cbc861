use axum::{extract::Request, ServiceExt};
use cognicity_server::{build_app, Config, PgStore};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("cognicity_server=info,tower_http=info")
            }),
        )
        .init();

    let config = Config::from_env()?;
    let store = match PgStore::connect(&config.database).await {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(error = %err, "could not connect to database");
            return Err(err.into());
        }
    };

    let app = build_app(&config, Arc::new(store));
    let listener = TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    tracing::info!(
        version = %config.api.version,
        cache = config.cache.enabled,
        "cognicity server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
