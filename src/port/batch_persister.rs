//! Storage seam between the batch extractor and the destination of a cycle.

use crate::domain::{GroupBatches, PersistReport};
use std::future::Future;
use std::pin::Pin;

/// Persists the grouped lines of one flush cycle.
///
/// This trait is dyn-compatible by using boxed futures instead of `impl Future`.
/// Implementations consume every group, successful or not; failures are
/// reported, never returned, so one bad group cannot stall a session.
pub trait BatchPersister: Send + Sync {
    fn persist(
        &self,
        batches: GroupBatches,
    ) -> Pin<Box<dyn Future<Output = PersistReport> + Send + '_>>;
}
