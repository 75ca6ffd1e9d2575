//! # Bucketry
//!
//! A thread-safe bucket manager: hands out shared handles to storage buckets,
//! constructing each one lazily and exactly once.
//!
//! ## Features
//!
//! - **At-most-once construction**: concurrent first lookups of the same bucket
//!   build it once and all receive the same handle
//! - **Cheap hits**: cached lookups never take the construction lock
//! - **Namespace routing**: `"hdfs"` and `"hdfs-logview"` have dedicated
//!   constructors, everything else resolves by value type
//! - **Explicit lifecycle**: close-and-release per handle, bulk release on dispose
//!
//! ## Quick Start
//!
//! Register constructors at startup, then ask the manager for buckets:
//!
//! ```rust
//! use bucketry::{Bucket, BucketManager, BucketRegistry, ManagerConfig, ValueType};
//! use std::any::Any;
//! use std::io;
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct LocalBucket {
//!     root: PathBuf,
//! }
//!
//! impl Bucket for LocalBucket {
//!     fn initialize(&mut self, _: &ValueType, base_dir: &Path, path: &str) -> io::Result<()> {
//!         self.root = base_dir.join(path);
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
//! let registry = Arc::new(BucketRegistry::new());
//! registry.register_for::<Vec<u8>, _>(|| Ok(Box::new(LocalBucket::default()) as Box<dyn Bucket>));
//!
//! let manager = BucketManager::new(registry, ManagerConfig::new("/data/bucket"));
//! let bucket = manager.bytes_bucket("20240101/12/cat").unwrap();
//!
//! let local = bucket.downcast_ref::<LocalBucket>().unwrap();
//! assert_eq!(local.root, Path::new("/data/bucket/20240101/12/cat"));
//!
//! manager.close_bucket(&bucket);
//! assert!(bucket.is_closed() && bucket.is_released());
//! ```
//!
//! ## Error Handling
//!
//! Construction errors are returned to the caller and nothing is cached, so
//! the next lookup retries. Close errors in
//! [`BucketManager::close_bucket`] are logged through `tracing` and never
//! returned.

mod config;
mod manager;
mod message;

pub use bucketry_core::*;
pub use config::{ManagerConfig, BASE_DIR_ENV, DEFAULT_BASE_DIR};
pub use manager::BucketManager;
pub use message::MessageTree;

/// Register a bucket constructor in the global registry
///
/// # Arguments
///
/// * `name` - A backend literal (`"hdfs"`, `"hdfs-logview"`) or a type name
/// * `constructor` - Builds a fresh, uninitialized bucket
///
/// # Examples
///
/// ```rust
/// use bucketry::{register_bucket, Bucket, BucketRegistry};
/// # use bucketry::ValueType;
/// # use std::{any::Any, io, path::Path};
/// # struct Hdfs;
/// # impl Bucket for Hdfs {
/// #     fn initialize(&mut self, _: &ValueType, _: &Path, _: &str) -> io::Result<()> { Ok(()) }
/// #     fn close(&self) -> io::Result<()> { Ok(()) }
/// #     fn as_any(&self) -> &dyn Any { self }
/// # }
///
/// register_bucket("hdfs", || Ok(Box::new(Hdfs) as Box<dyn Bucket>));
/// assert!(BucketRegistry::global().is_registered("hdfs"));
/// ```
pub fn register_bucket<F>(name: &str, constructor: F)
where
    F: Fn() -> std::io::Result<Box<dyn Bucket>> + Send + Sync + 'static,
{
    BucketRegistry::global().register(name, constructor);
}

/// Register a bucket constructor for values of type `T` in the global registry
///
/// The constructor serves every namespace other than `"hdfs"` and
/// `"hdfs-logview"` for `T`.
pub fn register_bucket_for<T, F>(constructor: F)
where
    T: ?Sized + 'static,
    F: Fn() -> std::io::Result<Box<dyn Bucket>> + Send + Sync + 'static,
{
    BucketRegistry::global().register_for::<T, F>(constructor);
}
