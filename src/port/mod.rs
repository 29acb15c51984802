pub mod batch_persister;

pub use batch_persister::BatchPersister;
