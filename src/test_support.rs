//! Shared test support utilities
//!
//! Provides `RecordingPersister`, an in-memory `BatchPersister` that captures
//! every persisted group and can be told to fail specific groups.

use crate::domain::{GroupBatches, PersistReport};
use crate::port::BatchPersister;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct RecordingPersister {
    persisted: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl RecordingPersister {
    pub fn new() -> Self {
        Self::failing_groups(std::iter::empty::<&str>())
    }

    /// A persister that reports the named groups as failed and drops their bytes.
    pub fn failing_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            persisted: Mutex::new(BTreeMap::new()),
            failing: groups.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of non-empty cycles handed to the persister.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Persisted lines of `group`, without terminators, across all cycles.
    pub fn lines_for(&self, group: &str) -> Vec<String> {
        let persisted = self.persisted.lock().unwrap();
        persisted
            .get(group)
            .map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .lines()
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn groups(&self) -> Vec<String> {
        self.persisted.lock().unwrap().keys().cloned().collect()
    }
}

impl BatchPersister for RecordingPersister {
    fn persist(
        &self,
        mut batches: GroupBatches,
    ) -> Pin<Box<dyn Future<Output = PersistReport> + Send + '_>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut report = PersistReport::default();
            while let Some((group, bytes)) = batches.pop_first() {
                if self.failing.contains(&group) {
                    report.record_failure(group);
                    continue;
                }
                self.persisted
                    .lock()
                    .unwrap()
                    .entry(group.clone())
                    .or_default()
                    .extend_from_slice(&bytes);
                report.record_success(group, bytes.len());
            }
            report
        })
    }
}
