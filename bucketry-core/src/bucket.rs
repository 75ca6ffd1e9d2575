use crate::BucketKey;
use crate::ValueType;
use std::any::Any;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Capability set every bucket implementation must expose.
///
/// Concrete buckets (local file, HDFS, ...) live outside this crate and are
/// made available through a [`BucketRegistry`](crate::BucketRegistry). A
/// bucket is created unconfigured by its constructor, initialized exactly
/// once, then shared read-only between every caller of the same key.
///
/// # Examples
///
/// ```
/// use bucketry_core::{Bucket, ValueType};
/// use std::any::Any;
/// use std::io;
/// use std::path::{Path, PathBuf};
///
/// #[derive(Default)]
/// struct LocalBucket {
///     root: PathBuf,
/// }
///
/// impl Bucket for LocalBucket {
///     fn initialize(&mut self, _: &ValueType, base_dir: &Path, path: &str) -> io::Result<()> {
///         self.root = base_dir.join(path);
///         Ok(())
///     }
///
///     fn close(&self) -> io::Result<()> {
///         Ok(())
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait Bucket: Send + Sync + 'static {
    /// Binds the bucket to its value type and location.
    fn initialize(&mut self, value_type: &ValueType, base_dir: &Path, path: &str)
        -> io::Result<()>;

    /// Flushes and closes the underlying storage.
    fn close(&self) -> io::Result<()>;

    /// Gives access to the concrete bucket for downcasting.
    fn as_any(&self) -> &dyn Any;
}

struct HandleInner {
    registry_id: u64,
    id: u64,
    constructor: String,
    key: BucketKey,
    bucket: Box<dyn Bucket>,
    closed: AtomicBool,
    released: AtomicBool,
}

/// Untyped shared handle to a constructed bucket.
///
/// This is what the cache stores. Cloning is cheap and every clone refers to
/// the same bucket and the same lifecycle flags.
#[derive(Clone)]
pub struct RawHandle {
    inner: Arc<HandleInner>,
}

impl RawHandle {
    pub(crate) fn new(
        registry_id: u64,
        id: u64,
        constructor: String,
        key: BucketKey,
        bucket: Box<dyn Bucket>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                registry_id,
                id,
                constructor,
                key,
                bucket,
                closed: AtomicBool::new(false),
                released: AtomicBool::new(false),
            }),
        }
    }

    /// Registry instance id assigned when the bucket was resolved.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Id of the [`BucketRegistry`](crate::BucketRegistry) that created the bucket.
    pub fn registry_id(&self) -> u64 {
        self.inner.registry_id
    }

    /// Name of the constructor the bucket was resolved from.
    pub fn constructor(&self) -> &str {
        &self.inner.constructor
    }

    pub fn key(&self) -> &BucketKey {
        &self.inner.key
    }

    pub fn bucket(&self) -> &dyn Bucket {
        self.inner.bucket.as_ref()
    }

    /// Downcasts to the concrete bucket implementation.
    pub fn downcast_ref<B: Bucket>(&self) -> Option<&B> {
        self.inner.bucket.as_any().downcast_ref::<B>()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles refer to the same constructed bucket.
    pub fn same_bucket(&self, other: &RawHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Closes the underlying bucket.
    ///
    /// The handle is only marked closed when the bucket's own close succeeds.
    pub fn close(&self) -> io::Result<()> {
        self.inner.bucket.close()?;
        self.inner.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Flips the released flag, returning `true` only for the first caller.
    pub(crate) fn mark_released(&self) -> bool {
        !self.inner.released.swap(true, Ordering::AcqRel)
    }

    /// Attaches `T` to a handle whose key is known to be built from `T`.
    pub(crate) fn typed_unchecked<T: 'static>(self) -> BucketHandle<T> {
        debug_assert!(self.inner.key.value_type().is::<T>());
        BucketHandle {
            raw: self,
            _marker: PhantomData,
        }
    }

    /// Attaches the value type `T`, failing if the key was built for another type.
    pub fn typed<T: 'static>(self) -> Option<BucketHandle<T>> {
        if self.inner.key.value_type().is::<T>() {
            Some(BucketHandle {
                raw: self,
                _marker: PhantomData,
            })
        } else {
            None
        }
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawHandle")
            .field("id", &self.inner.id)
            .field("constructor", &self.inner.constructor)
            .field("key", &self.inner.key)
            .field("closed", &self.is_closed())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Shared handle to a bucket holding values of type `T`.
///
/// Returned by the manager's typed accessors. Multiple callers asking for the
/// same key receive clones of one handle; none of them owns it exclusively.
pub struct BucketHandle<T> {
    raw: RawHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> BucketHandle<T> {
    pub fn raw(&self) -> &RawHandle {
        &self.raw
    }

    pub fn into_raw(self) -> RawHandle {
        self.raw
    }

    pub fn id(&self) -> u64 {
        self.raw.id()
    }

    pub fn key(&self) -> &BucketKey {
        self.raw.key()
    }

    pub fn path(&self) -> &str {
        self.raw.key().path()
    }

    pub fn namespace(&self) -> &str {
        self.raw.key().namespace()
    }

    pub fn constructor(&self) -> &str {
        self.raw.constructor()
    }

    pub fn bucket(&self) -> &dyn Bucket {
        self.raw.bucket()
    }

    pub fn downcast_ref<B: Bucket>(&self) -> Option<&B> {
        self.raw.downcast_ref::<B>()
    }

    pub fn is_closed(&self) -> bool {
        self.raw.is_closed()
    }

    pub fn is_released(&self) -> bool {
        self.raw.is_released()
    }

    pub fn same_bucket(&self, other: &BucketHandle<T>) -> bool {
        self.raw.same_bucket(&other.raw)
    }
}

impl<T> Clone for BucketHandle<T> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for BucketHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BucketHandle").field(&self.raw).finish()
    }
}

impl<T> From<BucketHandle<T>> for RawHandle {
    fn from(handle: BucketHandle<T>) -> Self {
        handle.raw
    }
}
