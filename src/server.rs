//! HTTP server initialization and runtime setup.
//!
//! Builds storage, codec, deletion pipeline and services from [`Config`], then
//! serves the router until Ctrl-C or SIGTERM.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use tokio::net::TcpListener;

use crate::application::services::{AuthService, LinkService};
use crate::config::{Config, StorageBackend};
use crate::domain::deletion_worker::DeletionPipeline;
use crate::domain::repositories::ShortUrlRepository;
use crate::infrastructure::persistence::{FileRepository, MemoryRepository, PgRepository};
use crate::routes::app_router;
use crate::state::AppState;
use crate::utils::uid_codec::UidCodec;

/// Opens the backend selected by [`Config::storage_backend`].
///
/// # Errors
///
/// Returns an error if the database is unreachable, migrations fail or the
/// storage file cannot be replayed.
pub async fn build_repository(
    config: &Config,
    codec: Arc<UidCodec>,
) -> Result<Arc<dyn ShortUrlRepository>> {
    let repository: Arc<dyn ShortUrlRepository> = match config.storage_backend() {
        StorageBackend::Postgres(dsn) => {
            let repository = PgRepository::connect(&dsn, codec)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");
            Arc::new(repository)
        }
        StorageBackend::File(path) => {
            let repository = FileRepository::open(&path, codec)
                .await
                .with_context(|| format!("Failed to open storage file {}", path.display()))?;
            tracing::info!("Using file storage at {}", path.display());
            Arc::new(repository)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, records are lost on restart");
            Arc::new(MemoryRepository::new(codec))
        }
    };

    Ok(repository)
}

/// Runs the HTTP server with the given configuration.
///
/// Pending deletions are flushed after the server stops accepting requests.
///
/// # Errors
///
/// Returns an error if:
/// - storage cannot be opened
/// - the codec or signing key is rejected
/// - the listener cannot bind
/// - the server fails at runtime
pub async fn run(config: Config) -> Result<()> {
    let codec = Arc::new(
        UidCodec::new(
            &config.hash_salt,
            config.hash_min_length,
            config.uid_strategy,
        )
        .context("Failed to build code codec")?,
    );

    let repository = build_repository(&config, Arc::clone(&codec)).await?;

    let pipeline = Arc::new(DeletionPipeline::start(
        Arc::clone(&repository),
        Arc::clone(&codec),
        config.deletion_settings(),
    ));
    tracing::info!("Deletion worker started");

    let link_service = Arc::new(LinkService::new(
        repository,
        codec,
        Arc::clone(&pipeline),
        config.base_url.clone(),
    ));
    let auth_service = AuthService::new(&config.auth_signature_key)
        .map_err(|e| anyhow::anyhow!("Invalid AUTH_SIGNATURE_KEY: {e}"))?;

    let state = AppState::new(link_service, Arc::new(auth_service));
    let app = app_router(state, config.compression_level);

    let listener = TcpListener::bind(&config.server_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server_address))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, flushing pending deletions");
    pipeline.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = until_signal("Ctrl-C", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Resolves when `signal` fires. A listener that fails to register never
/// resolves, so it cannot stop the server by itself.
async fn until_signal(name: &str, signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_failed_signal_listener_never_triggers_shutdown() {
        let failing = async { Err(io::Error::other("signal driver unavailable")) };

        let waited = tokio::time::timeout(Duration::from_secs(3600), until_signal("Ctrl-C", failing)).await;

        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_delivered_signal_triggers_shutdown() {
        until_signal("Ctrl-C", async { Ok(()) }).await;
    }
}
