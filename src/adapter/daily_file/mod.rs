pub mod layout;
pub mod persister;

pub use layout::LogFileKey;
pub use persister::DailyFilePersister;
