pub mod batch;
pub mod record;

pub use batch::{GroupBatches, PersistReport};
pub use record::LogRecord;
