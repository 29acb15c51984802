//! Timer-driven hand-off of the session buffer.
//!
//! The buffer itself travels through the hand-off channels: `ready` carries
//! it to the extractor, `resume` brings it back. While it is away the
//! coordinator is `Draining` and has nothing the reader could append to.

use crate::error::IngestError;
use bytes::BytesMut;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Who currently owns the accumulation buffer.
#[derive(Debug)]
pub enum BufferState {
    Reading(BytesMut),
    Draining,
}

/// Reader-side end of the hand-off channels.
pub struct FlushCoordinator {
    ticker: Interval,
    state: BufferState,
    ready: mpsc::Sender<BytesMut>,
    resume: mpsc::Receiver<BytesMut>,
}

/// Extractor-side end of the hand-off channels.
pub struct HandOffReceiver {
    pub ready: mpsc::Receiver<BytesMut>,
    pub resume: mpsc::Sender<BytesMut>,
}

/// Create both ends of a session's hand-off. The first tick fires one `period` from now.
#[must_use]
pub fn hand_off(period: Duration) -> (FlushCoordinator, HandOffReceiver) {
    // Capacity 1 plus the reader awaiting `resume` makes each exchange a rendezvous.
    let (ready_tx, ready_rx) = mpsc::channel(1);
    let (resume_tx, resume_rx) = mpsc::channel(1);

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let coordinator = FlushCoordinator {
        ticker,
        state: BufferState::Reading(BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY)),
        ready: ready_tx,
        resume: resume_rx,
    };
    let receiver = HandOffReceiver {
        ready: ready_rx,
        resume: resume_tx,
    };
    (coordinator, receiver)
}

impl FlushCoordinator {
    /// Wait for the next flush tick. Cancel safe.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Append one terminated line. Returns `false` if the buffer is away being drained.
    pub fn append(&mut self, line: &[u8]) -> bool {
        match &mut self.state {
            BufferState::Reading(buffer) => {
                buffer.extend_from_slice(line);
                true
            }
            BufferState::Draining => false,
        }
    }

    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        match &self.state {
            BufferState::Reading(buffer) => buffer.len(),
            BufferState::Draining => 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &BufferState {
        &self.state
    }

    /// Run one flush cycle: hand the buffer over, wait for resume, reset the buffer.
    pub async fn flush(&mut self) -> Result<(), IngestError> {
        let buffer = match std::mem::replace(&mut self.state, BufferState::Draining) {
            BufferState::Reading(buffer) => buffer,
            BufferState::Draining => return Err(IngestError::ExtractorGone),
        };

        if let Err(mpsc::error::SendError(buffer)) = self.ready.send(buffer).await {
            self.state = BufferState::Reading(buffer);
            return Err(IngestError::ExtractorGone);
        }

        match self.resume.recv().await {
            Some(mut buffer) => {
                buffer.clear();
                self.state = BufferState::Reading(buffer);
                Ok(())
            }
            None => Err(IngestError::ExtractorGone),
        }
    }
}
