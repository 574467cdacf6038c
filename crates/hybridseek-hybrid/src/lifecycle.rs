use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hybridseek_core::error::{Error, Result};
use hybridseek_core::traits::ChunkStore;
use hybridseek_core::types::{IndexDescriptor, IndexKind};

/// Keeps the indexes hybrid retrieval depends on in place.
///
/// `ensure_indexes` is idempotent and may run concurrently with itself and
/// with searches; the store serializes catalog writes.
pub struct IndexLifecycle<S: ChunkStore + ?Sized> {
    store: Arc<S>,
    descriptors: Vec<IndexDescriptor>,
    timeout: Duration,
    ensured: AtomicBool,
}

impl<S: ChunkStore + ?Sized> IndexLifecycle<S> {
    pub fn new(store: Arc<S>, descriptors: Vec<IndexDescriptor>, timeout: Duration) -> Self {
        Self { store, descriptors, timeout, ensured: AtomicBool::new(false) }
    }

    pub fn is_ensured(&self) -> bool {
        self.ensured.load(Ordering::Acquire)
    }

    /// Create every missing index. A conflicting live definition fails with
    /// `ConfigurationFault` and leaves the remaining descriptors untouched.
    pub async fn ensure_indexes(&self) -> Result<()> {
        for descriptor in &self.descriptors {
            check_descriptor(descriptor)?;
            match tokio::time::timeout(self.timeout, self.store.create_index(descriptor)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(Error::upstream(
                        "storage",
                        format!("creating {descriptor} timed out after {:?}", self.timeout),
                    ))
                }
            }
            tracing::debug!(index = %descriptor.name, "index ensured");
        }
        self.ensured.store(true, Ordering::Release);
        Ok(())
    }

    /// Run [`Self::ensure_indexes`] unless a previous call already succeeded.
    pub async fn ensure_once(&self) -> Result<()> {
        if self.is_ensured() {
            return Ok(());
        }
        self.ensure_indexes().await
    }
}

/// Shape checks that need no store round-trip.
fn check_descriptor(descriptor: &IndexDescriptor) -> Result<()> {
    match descriptor.kind {
        IndexKind::Vector => match descriptor.dimensions {
            Some(d) if d > 0 => Ok(()),
            _ => Err(Error::configuration(descriptor, "vector index needs a positive dimension")),
        },
        IndexKind::Fulltext if descriptor.dimensions.is_some() || descriptor.similarity.is_some() => {
            Err(Error::configuration(descriptor, "fulltext index takes no dimensions or similarity"))
        }
        IndexKind::Fulltext => Ok(()),
    }
}
