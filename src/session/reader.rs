use super::SessionConfig;
use super::coordinator::FlushCoordinator;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, warn};

/// Why a session's reader stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed the connection.
    Closed,
    /// No line arrived within the idle window.
    IdleTimeout,
    /// Daemon shutdown.
    Shutdown,
    /// The extractor stopped taking buffers.
    ExtractorGone,
    ReadFailed(io::Error),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Closed => write!(f, "connection closed by peer"),
            SessionEnd::IdleTimeout => write!(f, "idle timeout"),
            SessionEnd::Shutdown => write!(f, "shutdown"),
            SessionEnd::ExtractorGone => write!(f, "extractor gone"),
            SessionEnd::ReadFailed(e) => write!(f, "read failed: {e}"),
        }
    }
}

/// Reader half of a session: turns the byte stream into terminated lines in the session buffer.
pub struct LineReader<S> {
    stream: BufReader<S>,
    line: Vec<u8>,
    coordinator: FlushCoordinator,
    idle_timeout: Duration,
    read_backoff: Duration,
    shutdown: CancellationToken,
    // Cancels the session-closed token however the reader exits.
    _closed: DropGuard,
}

impl<S> LineReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    #[must_use]
    pub fn new(
        stream: S,
        coordinator: FlushCoordinator,
        config: &SessionConfig,
        shutdown: CancellationToken,
        closed: CancellationToken,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            line: Vec::new(),
            coordinator,
            idle_timeout: config.idle_timeout,
            read_backoff: config.read_backoff,
            shutdown,
            _closed: closed.drop_guard(),
        }
    }

    pub async fn run(mut self) -> SessionEnd {
        let mut deadline = Instant::now() + self.idle_timeout;
        let mut resume_reading_at = Instant::now();

        let end = loop {
            // The flush tick is checked before every read attempt, so no line
            // can land in the buffer while it is being drained.
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break SessionEnd::Shutdown,
                () = self.coordinator.tick() => {
                    if let Err(e) = self.coordinator.flush().await {
                        error!(error = %e, "Flush hand-off failed");
                        break SessionEnd::ExtractorGone;
                    }
                }
                () = sleep_until(deadline) => break SessionEnd::IdleTimeout,
                read = read_line(&mut self.stream, &mut self.line, resume_reading_at) => match read {
                    Ok(0) => {
                        self.accept_line();
                        break SessionEnd::Closed;
                    }
                    Ok(_) => {
                        if self.accept_line() {
                            deadline = Instant::now() + self.idle_timeout;
                        }
                    }
                    Err(e) if is_transient(&e) => {
                        warn!(error = %e, backoff = ?self.read_backoff, "No data available, backing off");
                        resume_reading_at = Instant::now() + self.read_backoff;
                    }
                    Err(e) => break SessionEnd::ReadFailed(e),
                },
            }
        };

        if !self.line.is_empty() {
            debug!(bytes = self.line.len(), "Dropping unterminated partial line");
        }

        if !matches!(end, SessionEnd::ExtractorGone) && self.coordinator.pending_bytes() > 0 {
            if let Err(e) = self.coordinator.flush().await {
                error!(error = %e, "Final flush failed");
            }
        }

        if let Err(e) = self.stream.get_mut().shutdown().await {
            debug!(error = %e, "Failed to shut down connection");
        }

        end
    }

    /// Normalize the line just read and append it. Returns `true` for a non-empty line.
    fn accept_line(&mut self) -> bool {
        let mut len = self.line.len();
        if self.line[..len].ends_with(b"\n") {
            len -= 1;
        }
        if self.line[..len].ends_with(b"\r") {
            len -= 1;
        }
        if len == 0 {
            self.line.clear();
            return false;
        }

        self.line.truncate(len);
        self.line.push(b'\n');
        if !self.coordinator.append(&self.line) {
            warn!("Buffer is being drained, dropping line");
        }
        self.line.clear();
        true
    }
}

/// Wait out any back-off, then read up to and including the next `\n`.
///
/// Cancel safe as long as `line` is kept between calls: partially read bytes stay in it.
async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>, not_before: Instant) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    sleep_until(not_before).await;
    reader.read_until(b'\n', line).await
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
