use crate::bucket::RawHandle;
use crate::error::{BucketError, Result};
use crate::{BucketKey, BucketRegistry, ValueType};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Namespace of buckets stored on the local filesystem.
pub const FILE_NAMESPACE: &str = "file";

/// Namespace (and constructor name) of HDFS-backed buckets.
pub const HDFS_NAMESPACE: &str = "hdfs";

/// Namespace (and constructor name) of HDFS-backed logview buckets.
pub const HDFS_LOGVIEW_NAMESPACE: &str = "hdfs-logview";

/// Returns the registry name that serves `namespace` for `value_type`.
///
/// The HDFS namespaces each have a dedicated constructor regardless of the
/// value type. Every other namespace, `"file"` included, is served by the
/// constructor registered under the value type's fully-qualified name.
///
/// # Examples
///
/// ```
/// use bucketry_core::{resolve_name, ValueType};
///
/// let bytes = ValueType::of::<Vec<u8>>();
/// assert_eq!(resolve_name("hdfs", &bytes), "hdfs");
/// assert_eq!(resolve_name("hdfs-logview", &bytes), "hdfs-logview");
/// assert_eq!(resolve_name("file", &bytes), bytes.name());
/// assert_eq!(resolve_name("anything", &bytes), bytes.name());
/// ```
pub fn resolve_name<'a>(namespace: &'a str, value_type: &ValueType) -> &'a str {
    match namespace {
        HDFS_NAMESPACE => HDFS_NAMESPACE,
        HDFS_LOGVIEW_NAMESPACE => HDFS_LOGVIEW_NAMESPACE,
        _ => value_type.name(),
    }
}

/// Builds initialized buckets from a registry and a base directory.
#[derive(Debug, Clone)]
pub struct BucketFactory {
    registry: Arc<BucketRegistry>,
    base_dir: PathBuf,
}

impl BucketFactory {
    pub fn new(registry: Arc<BucketRegistry>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            base_dir: base_dir.into(),
        }
    }

    pub fn registry(&self) -> &Arc<BucketRegistry> {
        &self.registry
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn set_base_dir(&mut self, base_dir: impl Into<PathBuf>) {
        self.base_dir = base_dir.into();
    }

    /// Resolves and initializes a bucket for `(path, value_type, namespace)`.
    ///
    /// A bucket whose initialization fails is released back to the registry
    /// before the error is returned, so it never shows up as live.
    ///
    /// # Errors
    ///
    /// * [`BucketError::Resolution`] - no usable constructor for the resolved name
    /// * [`BucketError::Initialization`] - the bucket rejected its location
    pub fn construct(&self, path: &str, value_type: ValueType, namespace: &str) -> Result<RawHandle> {
        let name = resolve_name(namespace, &value_type);
        let (id, mut bucket) = self.registry.lookup(name)?;

        if let Err(source) = bucket.initialize(&value_type, &self.base_dir, path) {
            self.registry.release(id);
            return Err(BucketError::Initialization {
                name: name.to_string(),
                path: path.to_string(),
                source,
            });
        }

        tracing::debug!(
            path,
            namespace,
            constructor = name,
            instance_id = id,
            "Constructed bucket"
        );

        Ok(RawHandle::new(
            self.registry.id(),
            id,
            name.to_string(),
            BucketKey::with_type(value_type, path, namespace),
            bucket,
        ))
    }

    /// Shorthand for [`construct`](Self::construct) driven by a key.
    pub fn construct_key(&self, key: &BucketKey) -> Result<RawHandle> {
        self.construct(key.path(), key.value_type(), key.namespace())
    }
}
