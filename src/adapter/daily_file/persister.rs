// Append each group's batch to its dated log file.
// One file handle is open at a time: open, write, flush, sync, close, next group.
// A failed group is logged and dropped; the remaining groups still get their attempt.

use super::layout::LogFileKey;
use crate::domain::{GroupBatches, PersistReport};
use crate::error::IngestError;
use crate::port::BatchPersister;
use chrono::{Local, NaiveDate};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct DailyFilePersister {
    base_dir: PathBuf,
}

impl DailyFilePersister {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Persist every group under `date`, consuming the batches.
    pub async fn persist_on(&self, mut batches: GroupBatches, date: NaiveDate) -> PersistReport {
        let mut report = PersistReport::default();

        while let Some((group, bytes)) = batches.pop_first() {
            match self.append_group(&group, &bytes, date).await {
                Ok(path) => {
                    info!(
                        group = %group,
                        bytes = bytes.len(),
                        path = %path.display(),
                        "Persisted group batch"
                    );
                    report.record_success(group, bytes.len());
                }
                Err(e) => {
                    error!(
                        group = %group,
                        bytes = bytes.len(),
                        error = %e,
                        "Failed to persist group batch, dropping it"
                    );
                    report.record_failure(group);
                }
            }
        }

        report
    }

    async fn append_group(
        &self,
        group: &str,
        bytes: &[u8],
        date: NaiveDate,
    ) -> Result<PathBuf, IngestError> {
        let key = LogFileKey::new(group, date)?;
        let path = key.path_in(&self.base_dir);

        let persist_err = |source: io::Error| IngestError::Persist {
            path: path.clone(),
            source,
        };

        let mut file = open_append(&path).await.map_err(persist_err)?;
        file.write_all(bytes).await.map_err(persist_err)?;
        file.flush().await.map_err(persist_err)?;
        file.sync_data().await.map_err(persist_err)?;

        Ok(path)
    }
}

/// Open for append, creating the whole directory tree once if it is missing.
async fn open_append(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);

    match options.open(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).await?;
            }
            options.open(path).await
        }
        other => other,
    }
}

impl BatchPersister for DailyFilePersister {
    fn persist(
        &self,
        batches: GroupBatches,
    ) -> Pin<Box<dyn Future<Output = PersistReport> + Send + '_>> {
        Box::pin(async move {
            let today = Local::now().date_naive();
            self.persist_on(batches, today).await
        })
    }
}
