//! Per-connection ingestion pipeline.
//!
//! A session is two tasks sharing one buffer:
//!
//! - the [`LineReader`] (the session task itself) reads lines into the buffer
//!   and, on every flush tick, hands the buffer over through its [`FlushCoordinator`];
//! - the [`BatchExtractor`] (spawned) decodes and groups the handed-over buffer,
//!   persists the groups and hands the buffer back.
//!
//! The buffer is moved through the hand-off channels, so at any moment it is
//! owned by exactly one of the two.

pub mod coordinator;
pub mod extractor;
pub mod reader;

pub use coordinator::{BufferState, FlushCoordinator, HandOffReceiver, hand_off};
pub use extractor::{BatchExtractor, ExtractorStats, Extraction, extract};
pub use reader::{LineReader, SessionEnd};

use crate::config::Settings;
use crate::port::BatchPersister;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info};

/// Timing policy of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub flush_interval: Duration,
    pub idle_timeout: Duration,
    pub read_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            read_backoff: Duration::from_secs(10),
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            flush_interval: settings.flush_interval(),
            idle_timeout: settings.idle_timeout(),
            read_backoff: settings.read_backoff(),
        }
    }
}

/// Run one session over `stream` until it ends, then wait for its extractor.
///
/// `shutdown` ends the session from outside; the session-closed token given to
/// the extractor is cancelled once the reader has finished its final flush.
pub async fn run_session<S>(
    stream: S,
    config: SessionConfig,
    persister: Arc<dyn BatchPersister>,
    shutdown: CancellationToken,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (coordinator, receiver) = hand_off(config.flush_interval);
    let closed = CancellationToken::new();

    let extractor = tokio::spawn(
        BatchExtractor::new(persister, receiver, closed.clone())
            .run()
            .in_current_span(),
    );

    let end = LineReader::new(stream, coordinator, &config, shutdown, closed)
        .run()
        .await;

    match extractor.await {
        Ok(stats) => info!(
            reason = %end,
            cycles = stats.cycles,
            accepted = stats.accepted,
            discarded = stats.discarded,
            failed_groups = stats.failed_groups,
            bytes = stats.bytes_written,
            "Session ended"
        ),
        Err(e) => error!(reason = %end, error = %e, "Batch extractor task failed"),
    }

    end
}
