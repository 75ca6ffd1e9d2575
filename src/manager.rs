use crate::{ManagerConfig, MessageTree};
use bucketry_core::{
    BucketCache, BucketFactory, BucketHandle, BucketRegistry, Result, FILE_NAMESPACE,
    HDFS_LOGVIEW_NAMESPACE, HDFS_NAMESPACE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "stats")]
use bucketry_core::BucketStats;

/// Entry point for obtaining buckets.
///
/// Each typed accessor fixes the value type and namespace of the request and
/// delegates to a [`BucketCache`]: the first call for a path constructs the
/// bucket through the registry, later calls return the same handle.
///
/// | Accessor | Value type | Namespace |
/// |---|---|---|
/// | [`bytes_bucket`](Self::bytes_bucket) | `Vec<u8>` | `"file"` |
/// | [`hdfs_bucket`](Self::hdfs_bucket) | `Vec<u8>` | `"hdfs"` |
/// | [`logview_bucket`](Self::logview_bucket) | `Vec<u8>` | `"hdfs-logview"` |
/// | [`message_bucket`](Self::message_bucket) | [`MessageTree`] | `"file"` |
/// | [`string_bucket`](Self::string_bucket) | `String` | `"file"` |
///
/// Dropping the manager disposes it.
///
/// # Examples
///
/// ```
/// use bucketry::{Bucket, BucketManager, BucketRegistry, ManagerConfig, ValueType};
/// use std::any::Any;
/// use std::io;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// struct Noop;
///
/// impl Bucket for Noop {
///     fn initialize(&mut self, _: &ValueType, _: &Path, _: &str) -> io::Result<()> {
///         Ok(())
///     }
///     fn close(&self) -> io::Result<()> {
///         Ok(())
///     }
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// let registry = Arc::new(BucketRegistry::new());
/// registry.register_for::<String, _>(|| Ok(Box::new(Noop) as Box<dyn Bucket>));
///
/// let manager = BucketManager::new(registry, ManagerConfig::new("/tmp/buckets"));
/// let a = manager.string_bucket("20240101/12/cat").unwrap();
/// let b = manager.string_bucket("20240101/12/cat").unwrap();
/// assert!(a.same_bucket(&b));
///
/// assert_eq!(manager.dispose(), 1);
/// assert!(a.is_released());
/// ```
pub struct BucketManager {
    cache: BucketCache,
    factory: BucketFactory,
}

impl BucketManager {
    pub fn new(registry: Arc<BucketRegistry>, config: ManagerConfig) -> Self {
        Self {
            cache: BucketCache::new(),
            factory: BucketFactory::new(registry, config.base_dir()),
        }
    }

    /// Creates a manager backed by [`BucketRegistry::global`].
    pub fn with_global_registry(config: ManagerConfig) -> Self {
        Self::new(BucketRegistry::global(), config)
    }

    pub fn base_dir(&self) -> &Path {
        self.factory.base_dir()
    }

    /// Changes the base directory for buckets constructed from now on.
    ///
    /// Requires exclusive access, so it can only happen before the manager is
    /// shared. Buckets already cached keep their original location.
    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.factory.set_base_dir(base_dir);
    }

    pub fn registry(&self) -> &Arc<BucketRegistry> {
        self.factory.registry()
    }

    pub fn cache(&self) -> &BucketCache {
        &self.cache
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &BucketStats {
        self.cache.stats()
    }

    /// Returns the bucket of `T` values at `path` in `namespace`.
    ///
    /// # Errors
    ///
    /// * [`BucketError::InvalidArgument`](crate::BucketError::InvalidArgument) - `path` is empty
    /// * [`BucketError::ManagerClosed`](crate::BucketError::ManagerClosed) - the manager was disposed
    /// * [`BucketError::Resolution`](crate::BucketError::Resolution) / [`BucketError::Initialization`](crate::BucketError::Initialization) - construction failed
    /// * [`BucketError::CyclicConstruction`](crate::BucketError::CyclicConstruction) - a constructor asked for its own bucket
    pub fn bucket<T: 'static>(&self, path: &str, namespace: &str) -> Result<BucketHandle<T>> {
        self.cache.get_or_create_typed::<T>(path, namespace, &self.factory)
    }

    pub fn bytes_bucket(&self, path: &str) -> Result<BucketHandle<Vec<u8>>> {
        self.bucket::<Vec<u8>>(path, FILE_NAMESPACE)
    }

    pub fn hdfs_bucket(&self, path: &str) -> Result<BucketHandle<Vec<u8>>> {
        self.bucket::<Vec<u8>>(path, HDFS_NAMESPACE)
    }

    pub fn logview_bucket(&self, path: &str) -> Result<BucketHandle<Vec<u8>>> {
        self.bucket::<Vec<u8>>(path, HDFS_LOGVIEW_NAMESPACE)
    }

    pub fn message_bucket(&self, path: &str) -> Result<BucketHandle<MessageTree>> {
        self.bucket::<MessageTree>(path, FILE_NAMESPACE)
    }

    pub fn string_bucket(&self, path: &str) -> Result<BucketHandle<String>> {
        self.bucket::<String>(path, FILE_NAMESPACE)
    }

    /// Closes `handle` and releases it back to the registry.
    ///
    /// A failing close is logged and counted but never returned; the release
    /// happens either way. The cache entry is kept, so later lookups of the
    /// same key get this closed handle back.
    ///
    /// A handle obtained from another manager is left alone: it is neither
    /// closed nor released, and a warning is logged.
    pub fn close_bucket<T>(&self, handle: &BucketHandle<T>) {
        if !self.cache.owns(handle.raw()) {
            tracing::warn!(
                path = handle.path(),
                namespace = handle.namespace(),
                instance_id = handle.id(),
                "Ignoring close of bucket owned by another manager"
            );
            return;
        }
        if let Err(e) = handle.raw().close() {
            tracing::warn!(
                path = handle.path(),
                namespace = handle.namespace(),
                instance_id = handle.id(),
                error = %e,
                "Failed to close bucket"
            );
            #[cfg(feature = "stats")]
            self.cache.stats().record_close_failure();
        }
        self.cache.release(handle.raw(), self.factory.registry());
    }

    /// Releases every cached bucket and refuses new lookups afterwards.
    ///
    /// Returns the number of buckets released. Calling it again is a no-op
    /// returning 0.
    pub fn dispose(&self) -> usize {
        if self.cache.is_closed() {
            return 0;
        }
        let released = self.cache.release_all(self.factory.registry());
        tracing::info!(released, base_dir = %self.base_dir().display(), "Disposed bucket manager");
        released
    }

    pub fn is_disposed(&self) -> bool {
        self.cache.is_closed()
    }
}

impl Drop for BucketManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for BucketManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketManager")
            .field("base_dir", &self.base_dir())
            .field("cache", &self.cache)
            .finish()
    }
}
