//! # Bucket Registry
//!
//! Name-based resolution of bucket constructors.
//!
//! The embedding application registers one constructor per name at startup.
//! Names are either a backend literal (`"hdfs"`, `"hdfs-logview"`) or the
//! fully-qualified name of a value type. The registry also tracks every
//! bucket instance it handed out until that instance is released.
//!
//! # Examples
//!
//! ```rust
//! use bucketry_core::{Bucket, BucketRegistry, ValueType};
//! use std::any::Any;
//! use std::io;
//! use std::path::Path;
//!
//! struct Noop;
//!
//! impl Bucket for Noop {
//!     fn initialize(&mut self, _: &ValueType, _: &Path, _: &str) -> io::Result<()> {
//!         Ok(())
//!     }
//!     fn close(&self) -> io::Result<()> {
//!         Ok(())
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//! }
//!
//! let registry = BucketRegistry::new();
//! registry.register("hdfs", || Ok(Box::new(Noop) as Box<dyn Bucket>));
//! registry.register_for::<String, _>(|| Ok(Box::new(Noop) as Box<dyn Bucket>));
//!
//! assert!(registry.is_registered("hdfs"));
//! assert!(registry.is_registered("alloc::string::String"));
//! ```

use crate::bucket::{Bucket, RawHandle};
use crate::error::{BucketError, Result};
use crate::ValueType;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A bucket constructor: produces a fresh, uninitialized bucket.
pub type Constructor = Arc<dyn Fn() -> io::Result<Box<dyn Bucket>> + Send + Sync>;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL_REGISTRY: Lazy<Arc<BucketRegistry>> = Lazy::new(|| Arc::new(BucketRegistry::new()));

/// Registry mapping names to bucket constructors.
///
/// # Thread Safety
///
/// Registration takes a write lock on the constructor table; lookups only
/// read it. Live instances are tracked in a `DashMap` so releases from
/// different threads do not contend with lookups.
pub struct BucketRegistry {
    /// Identifies this registry in the handles it hands out
    id: u64,
    constructors: RwLock<HashMap<String, Constructor>>,
    /// Instance id -> constructor name, for every bucket not yet released
    live: DashMap<u64, String>,
    next_id: AtomicU64,
}

impl BucketRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            constructors: RwLock::new(HashMap::new()),
            live: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Process-unique id of this registry.
    ///
    /// Instance ids are only unique within one registry; handles carry this id
    /// so they can't be released into a registry that didn't create them.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the process-wide registry
    pub fn global() -> Arc<BucketRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Registers a constructor under `name`, replacing any previous one.
    pub fn register<F>(&self, name: &str, constructor: F)
    where
        F: Fn() -> io::Result<Box<dyn Bucket>> + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(name.to_string(), Arc::new(constructor));
    }

    /// Registers a constructor under the fully-qualified name of `T`.
    pub fn register_for<T, F>(&self, constructor: F)
    where
        T: ?Sized + 'static,
        F: Fn() -> io::Result<Box<dyn Bucket>> + Send + Sync + 'static,
    {
        self.register(ValueType::of::<T>().name(), constructor);
    }

    /// Removes the constructor registered under `name`.
    ///
    /// Buckets already handed out stay live until released.
    pub fn unregister(&self, name: &str) -> bool {
        self.constructors.write().remove(name).is_some()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// List all registered constructor names
    pub fn names(&self) -> Vec<String> {
        self.constructors.read().keys().cloned().collect()
    }

    /// Resolves `name` and runs its constructor.
    ///
    /// The new instance is tracked as live under the returned id.
    ///
    /// # Errors
    ///
    /// [`BucketError::Resolution`] if nothing is registered under `name` or
    /// the constructor itself fails.
    pub fn lookup(&self, name: &str) -> Result<(u64, Box<dyn Bucket>)> {
        // Clone the Arc so the constructor runs without holding the table lock.
        let constructor = self.constructors.read().get(name).cloned();
        let constructor = constructor.ok_or_else(|| BucketError::Resolution {
            name: name.to_string(),
            reason: "no constructor registered".to_string(),
            source: None,
        })?;

        let bucket = constructor().map_err(|e| BucketError::Resolution {
            name: name.to_string(),
            reason: "constructor failed".to_string(),
            source: Some(e),
        })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.insert(id, name.to_string());
        Ok((id, bucket))
    }

    /// Returns the instance `id` to the registry.
    ///
    /// Returns `true` if the instance was live.
    pub fn release(&self, id: u64) -> bool {
        self.live.remove(&id).is_some()
    }

    /// Releases the bucket behind `handle` exactly once.
    ///
    /// Returns `false` if the handle had already been released or was
    /// created by another registry. A foreign handle is left untouched.
    pub fn release_handle(&self, handle: &RawHandle) -> bool {
        if handle.registry_id() != self.id {
            tracing::warn!(
                instance_id = handle.id(),
                owner_registry = handle.registry_id(),
                registry = self.id,
                "Refusing to release bucket created by another registry"
            );
            return false;
        }
        if !handle.mark_released() {
            return false;
        }
        let was_live = self.release(handle.id());
        tracing::debug!(
            instance_id = handle.id(),
            constructor = handle.constructor(),
            was_live,
            "Released bucket"
        );
        true
    }

    pub fn is_live(&self, id: u64) -> bool {
        self.live.contains_key(&id)
    }

    /// Number of instances handed out and not yet released
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Default for BucketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BucketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketRegistry")
            .field("names", &self.names())
            .field("live", &self.live_count())
            .finish()
    }
}
