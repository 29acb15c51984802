use crate::error::IngestError;
use crate::port::BatchPersister;
use crate::session::{SessionConfig, run_session};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info, info_span, warn};

/// Pause after a failed accept (e.g. out of file descriptors) before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the ingestion listener.
pub async fn bind(address: &str) -> Result<TcpListener, IngestError> {
    TcpListener::bind(address)
        .await
        .map_err(|e| IngestError::Bind {
            address: address.to_string(),
            source: e,
        })
}

/// Accept connections and run one session per connection until `shutdown` is cancelled.
///
/// At most `max_connections` sessions run at once; further connections wait in
/// the listen backlog. On shutdown every live session performs its final flush
/// before this returns.
pub async fn serve(
    listener: TcpListener,
    config: SessionConfig,
    persister: Arc<dyn BatchPersister>,
    max_connections: usize,
    shutdown: CancellationToken,
) -> Result<(), IngestError> {
    info!("Ingestion server listening on {}", listener.local_addr()?);

    let limiter = Arc::new(Semaphore::new(max_connections));
    let sessions = TaskTracker::new();

    loop {
        let permit = tokio::select! {
            () = shutdown.cancelled() => break,
            permit = limiter.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let (stream, peer) = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            },
        };

        let persister = persister.clone();
        let session_shutdown = shutdown.child_token();
        sessions.spawn(
            async move {
                let _permit = permit;
                info!("Accepted connection");
                run_session(stream, config, persister, session_shutdown).await;
            }
            .instrument(info_span!("session", %peer)),
        );
    }

    sessions.close();
    if !sessions.is_empty() {
        warn!(
            active = sessions.len(),
            "Waiting for sessions to flush before shutdown"
        );
    }
    sessions.wait().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) for graceful shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
