// Dated file layout: <base>/<YYYY>/<MM>/<DD>/<group>_<YYYY>-<MM>-<DD>.log
// Month and day are always zero-padded so paths sort and compare the same on every platform.

use crate::error::IngestError;
use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

/// Identifies the log file of one group on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFileKey<'a> {
    group: &'a str,
    date: NaiveDate,
}

impl<'a> LogFileKey<'a> {
    /// Groups become part of a file name; separators and NUL would escape the day directory.
    pub fn new(group: &'a str, date: NaiveDate) -> Result<Self, IngestError> {
        if group.contains(['/', '\\', '\0']) {
            return Err(IngestError::InvalidGroup(group.to_owned()));
        }
        Ok(Self { group, date })
    }

    #[must_use]
    pub fn group(&self) -> &str {
        self.group
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}_{}.log", self.group, self.date.format("%Y-%m-%d"))
    }

    #[must_use]
    pub fn relative_dir(&self) -> PathBuf {
        PathBuf::from(format!("{:04}", self.date.year()))
            .join(format!("{:02}", self.date.month()))
            .join(format!("{:02}", self.date.day()))
    }

    #[must_use]
    pub fn path_in(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(self.relative_dir()).join(self.file_name())
    }
}
