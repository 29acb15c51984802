use bytes::BytesMut;
use std::collections::BTreeMap;

/// Raw record lines of one flush cycle, bucketed by group.
///
/// Each bucket holds newline-terminated lines in the order they were read.
/// Buckets are visited in lexical group order.
#[derive(Debug, Default)]
pub struct GroupBatches {
    groups: BTreeMap<String, BytesMut>,
    lines: usize,
}

impl GroupBatches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one raw line to the bucket of `group`. A missing terminator is added.
    pub fn push(&mut self, group: &str, line: &[u8]) {
        if let Some(bucket) = self.groups.get_mut(group) {
            append_line(bucket, line);
        } else {
            let mut bucket = BytesMut::with_capacity(line.len() + 1);
            append_line(&mut bucket, line);
            self.groups.insert(group.to_owned(), bucket);
        }
        self.lines += 1;
    }

    /// Remove and return the next bucket.
    pub fn pop_first(&mut self) -> Option<(String, BytesMut)> {
        self.groups.pop_first()
    }

    pub fn get(&self, group: &str) -> Option<&[u8]> {
        self.groups.get(group).map(|bucket| &bucket[..])
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Number of lines pushed since creation.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines
    }

    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.groups.values().map(BytesMut::len).sum()
    }
}

fn append_line(bucket: &mut BytesMut, line: &[u8]) {
    bucket.extend_from_slice(line);
    if !line.ends_with(b"\n") {
        bucket.extend_from_slice(b"\n");
    }
}

/// Outcome of one persistence cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub persisted: Vec<String>,
    pub failed: Vec<String>,
    pub bytes_written: u64,
}

impl PersistReport {
    pub fn record_success(&mut self, group: String, bytes: usize) {
        self.persisted.push(group);
        self.bytes_written += bytes as u64;
    }

    pub fn record_failure(&mut self, group: String) {
        self.failed.push(group);
    }
}
