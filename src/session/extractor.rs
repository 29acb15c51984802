use super::coordinator::HandOffReceiver;
use crate::domain::{GroupBatches, LogRecord};
use crate::port::BatchPersister;
use bytes::BytesMut;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of scanning one frozen buffer.
#[derive(Debug, Default)]
pub struct Extraction {
    pub batches: GroupBatches,
    pub discarded: usize,
}

/// Split `buffer` into lines, decode each one and bucket the raw line by group.
///
/// Malformed lines are logged and skipped; they never end the scan.
#[must_use]
pub fn extract(buffer: &[u8]) -> Extraction {
    let mut extraction = Extraction::default();

    for line in buffer.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        match LogRecord::from_line(line) {
            Ok(record) => extraction.batches.push(&record.group, line),
            Err(e) => {
                warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(line),
                    "Discarding malformed log line"
                );
                extraction.discarded += 1;
            }
        }
    }

    extraction
}

/// Lifetime counters of one extractor task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorStats {
    pub cycles: u64,
    pub accepted: u64,
    pub discarded: u64,
    pub failed_groups: u64,
    pub bytes_written: u64,
}

/// Extractor half of a session: waits for a frozen buffer, drains it, persists, resumes.
pub struct BatchExtractor {
    persister: Arc<dyn BatchPersister>,
    hand_off: HandOffReceiver,
    closed: CancellationToken,
}

impl BatchExtractor {
    #[must_use]
    pub fn new(
        persister: Arc<dyn BatchPersister>,
        hand_off: HandOffReceiver,
        closed: CancellationToken,
    ) -> Self {
        Self {
            persister,
            hand_off,
            closed,
        }
    }

    /// Run until the session closes or the reader drops its end of the hand-off.
    pub async fn run(mut self) -> ExtractorStats {
        let mut stats = ExtractorStats::default();

        loop {
            let buffer = tokio::select! {
                biased;
                ready = self.hand_off.ready.recv() => match ready {
                    Some(buffer) => buffer,
                    None => break,
                },
                () = self.closed.cancelled() => break,
            };

            self.drain(&buffer, &mut stats).await;

            if self.hand_off.resume.send(buffer).await.is_err() {
                debug!("Reader gone before resume, stopping extractor");
                break;
            }
        }

        debug!(?stats, "Batch extractor stopped");
        stats
    }

    async fn drain(&self, buffer: &BytesMut, stats: &mut ExtractorStats) {
        stats.cycles += 1;
        if buffer.is_empty() {
            return;
        }

        let Extraction { batches, discarded } = extract(buffer);
        let accepted = batches.line_count();
        let groups = batches.len();
        stats.accepted += accepted as u64;
        stats.discarded += discarded as u64;

        if batches.is_empty() {
            info!(discarded, "Flush cycle had no valid records");
            return;
        }

        let report = self.persister.persist(batches).await;
        stats.failed_groups += report.failed.len() as u64;
        stats.bytes_written += report.bytes_written;

        info!(
            accepted,
            discarded,
            groups,
            failed = report.failed.len(),
            bytes = report.bytes_written,
            "Flush cycle complete"
        );
    }
}
