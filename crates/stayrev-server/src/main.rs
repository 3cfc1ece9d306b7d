mod api;
mod middleware;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState, EmbeddingService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = stayrev_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = stayrev_db::PoolConfig::from_app_config(&config);
    let pool = stayrev_db::connect_pool(&config.database_url, pool_config).await?;
    stayrev_db::run_migrations(&pool).await?;

    let embedding = match EmbeddingService::from_app_config(&config)? {
        Some(service) => {
            if let Err(e) = service.store().ensure_collection().await {
                tracing::warn!(
                    error = %e,
                    collection = %config.qdrant_collection,
                    "vector collection unavailable at startup"
                );
            }
            Some(Arc::new(service))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set; embedding routes disabled");
            None
        }
    };

    let app = build_app(AppState { pool, embedding });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "stayrev-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
