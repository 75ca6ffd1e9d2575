use crate::bucket::{BucketHandle, RawHandle};
use crate::error::{BucketError, Result};
use crate::{BucketFactory, BucketKey, BucketRegistry};
use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "stats")]
use crate::BucketStats;

/// A thread-safe cache of constructed buckets, one per [`BucketKey`].
///
/// # Construction guarantee
///
/// However many threads ask for the same key for the first time, the
/// constructor runs exactly once and every caller receives a clone of the same
/// [`RawHandle`]. A failed construction stores nothing, so the next lookup for
/// that key tries again.
///
/// # Thread Safety
///
/// - **Hits** read the `DashMap` directly and never touch the construction lock
/// - **Misses** take a single `parking_lot::ReentrantMutex` scoped to the whole
///   cache, re-check the map, then construct and insert while still holding it
/// - **Teardown** ([`release_all`](Self::release_all)) holds the same mutex for
///   the whole iteration and leaves the cache closed
///
/// The lock is coarse: misses on different keys serialize with each other.
/// Steady-state lookups do not.
///
/// # Lifecycle of an entry
///
/// `Absent -> Constructing -> Live -> Closed (optional) -> Released`
///
/// `Constructing` only exists inside the thread holding the lock; other
/// callers either wait on the lock and then see `Live`, or see `Absent`. The
/// keys in that state are tracked under the lock to detect cyclic lookups.
///
/// # Examples
///
/// ```
/// use bucketry_core::{Bucket, BucketCache, BucketFactory, BucketKey, BucketRegistry, ValueType};
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
/// let factory = BucketFactory::new(registry.clone(), "/tmp/buckets");
/// let cache = BucketCache::new();
///
/// let key = BucketKey::new::<String>("20240101/12", "file");
/// let first = cache.get_or_create(&key, &factory).unwrap();
/// let second = cache.get_or_create(&key, &factory).unwrap();
/// assert!(first.same_bucket(&second));
///
/// assert_eq!(cache.release_all(&registry), 1);
/// assert!(first.is_released());
/// ```
pub struct BucketCache {
    map: DashMap<BucketKey, RawHandle>,
    /// Construction lock; guards the keys being constructed by its holder
    lock: ReentrantMutex<RefCell<HashSet<BucketKey>>>,
    closed: AtomicBool,
    #[cfg(feature = "stats")]
    stats: BucketStats,
}

impl BucketCache {
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
            lock: ReentrantMutex::new(RefCell::new(HashSet::new())),
            closed: AtomicBool::new(false),
            #[cfg(feature = "stats")]
            stats: BucketStats::new(),
        }
    }

    /// Returns the bucket for `key`, constructing it through `factory` on first use.
    ///
    /// # Errors
    ///
    /// * [`BucketError::InvalidArgument`] - `key` has an empty path
    /// * [`BucketError::ManagerClosed`] - [`release_all`](Self::release_all) already ran
    /// * [`BucketError::Resolution`] / [`BucketError::Initialization`] - from the factory
    pub fn get_or_create(&self, key: &BucketKey, factory: &BucketFactory) -> Result<RawHandle> {
        self.get_or_create_with(key, |key| factory.construct_key(key))
    }

    /// Like [`get_or_create`](Self::get_or_create), typed by the key's value type.
    ///
    /// The key is built from `T`, so the returned handle always carries `T`.
    pub fn get_or_create_typed<T: 'static>(
        &self,
        path: &str,
        namespace: &str,
        factory: &BucketFactory,
    ) -> Result<BucketHandle<T>> {
        let key = BucketKey::new::<T>(path, namespace);
        let raw = self.get_or_create(&key, factory)?;
        Ok(raw.typed_unchecked::<T>())
    }

    /// Like [`get_or_create`](Self::get_or_create) with an arbitrary constructor.
    ///
    /// `construct` is called at most once per key over the life of the cache,
    /// counting only successful calls.
    ///
    /// # Re-entrancy
    ///
    /// `construct` runs with the construction lock held, and that lock is
    /// re-entrant: a constructor (or a bucket's `initialize`) may look up other
    /// keys on the same cache from the same thread, e.g. an index bucket next to
    /// its data bucket. Looking up the key that is currently being constructed
    /// fails with [`BucketError::CyclicConstruction`] instead of deadlocking.
    pub fn get_or_create_with<F>(&self, key: &BucketKey, construct: F) -> Result<RawHandle>
    where
        F: FnOnce(&BucketKey) -> Result<RawHandle>,
    {
        if key.path().is_empty() {
            return Err(BucketError::invalid_argument(format!(
                "path of {} bucket can't be empty",
                key.value_type()
            )));
        }
        if self.is_closed() {
            return Err(BucketError::ManagerClosed);
        }

        if let Some(handle) = self.get(key) {
            #[cfg(feature = "stats")]
            self.stats.record_hit();
            return Ok(handle);
        }

        let guard = self.lock.lock();

        // Teardown may have finished while we waited for the lock.
        if self.is_closed() {
            return Err(BucketError::ManagerClosed);
        }
        // Another thread constructed it while we waited.
        if let Some(handle) = self.get(key) {
            #[cfg(feature = "stats")]
            self.stats.record_hit();
            return Ok(handle);
        }

        #[cfg(feature = "stats")]
        self.stats.record_miss();

        let _in_flight = InFlight::enter(&guard, key)?;

        match construct(key) {
            Ok(handle) => {
                self.map.insert(key.clone(), handle.clone());
                #[cfg(feature = "stats")]
                self.stats.record_construction();
                Ok(handle)
            }
            Err(e) => {
                tracing::warn!(
                    path = key.path(),
                    namespace = key.namespace(),
                    value_type = key.value_type().name(),
                    error = %e,
                    "Failed to construct bucket"
                );
                #[cfg(feature = "stats")]
                self.stats.record_construction_failure();
                Err(e)
            }
        }
    }

    /// Returns the cached bucket for `key` without constructing anything.
    pub fn get(&self, key: &BucketKey) -> Option<RawHandle> {
        self.map.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &BucketKey) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Snapshot of the keys currently cached
    pub fn keys(&self) -> Vec<BucketKey> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns `true` once [`release_all`](Self::release_all) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` if `handle` is the one cached for its key.
    pub fn owns(&self, handle: &RawHandle) -> bool {
        self.get(handle.key()).map_or(false, |cached| cached.same_bucket(handle))
    }

    /// Releases one handle back to `registry`, exactly once.
    ///
    /// The entry stays in the map: a later lookup of the same key returns the
    /// released handle rather than constructing a second bucket. Handles this
    /// cache doesn't hold are not released.
    pub fn release(&self, handle: &RawHandle, registry: &BucketRegistry) -> bool {
        self.owns(handle) && self.release_entry(handle, registry)
    }

    fn release_entry(&self, handle: &RawHandle, registry: &BucketRegistry) -> bool {
        let released = registry.release_handle(handle);
        #[cfg(feature = "stats")]
        {
            if released {
                self.stats.record_release();
            }
        }
        released
    }

    /// Releases every cached bucket and closes the cache.
    ///
    /// Holds the construction lock for the whole iteration, so no bucket can
    /// be constructed concurrently and missed. Entries stay in the map. Handles
    /// released earlier through [`release`](Self::release) are skipped.
    ///
    /// Returns the number of handles released by this call; a second call
    /// returns 0.
    ///
    /// Called from inside a constructor running on this cache, it does nothing
    /// and returns 0: the bucket under construction would otherwise be
    /// inserted after teardown and never released.
    pub fn release_all(&self, registry: &BucketRegistry) -> usize {
        let guard = self.lock.lock();
        if !guard.borrow().is_empty() {
            tracing::warn!(
                in_flight = guard.borrow().len(),
                "Ignoring teardown requested during bucket construction"
            );
            return 0;
        }
        self.closed.store(true, Ordering::Release);

        let mut released = 0;
        for entry in self.map.iter() {
            if self.release_entry(entry.value(), registry) {
                released += 1;
            }
        }
        released
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &BucketStats {
        &self.stats
    }
}

/// Marks a key as under construction until dropped.
struct InFlight<'a> {
    keys: &'a RefCell<HashSet<BucketKey>>,
    key: &'a BucketKey,
}

impl<'a> InFlight<'a> {
    fn enter(keys: &'a RefCell<HashSet<BucketKey>>, key: &'a BucketKey) -> Result<Self> {
        if !keys.borrow_mut().insert(key.clone()) {
            return Err(BucketError::CyclicConstruction {
                key: key.to_string(),
            });
        }
        Ok(Self { keys, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.keys.borrow_mut().remove(self.key);
    }
}

impl Default for BucketCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BucketCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketCache")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
