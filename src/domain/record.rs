use serde::{Deserialize, Serialize};

/// One inbound log entry as sent over the wire.
///
/// Every field is optional on the wire; a missing `group` collapses into the
/// empty-string group. `time` is kept as the sender formatted it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LogRecord {
    pub group: String,
    pub time: String,
    pub level: String,
    pub message: String,
}

impl LogRecord {
    /// Decode a single line (without its terminator).
    pub fn from_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(line)
    }
}
