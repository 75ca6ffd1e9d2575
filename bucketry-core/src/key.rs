use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of the value type a bucket stores.
///
/// Pairs the `TypeId` used for equality with the fully-qualified type name
/// used to resolve a bucket constructor.
///
/// # Examples
///
/// ```
/// use bucketry_core::ValueType;
///
/// let bytes = ValueType::of::<Vec<u8>>();
/// assert_eq!(bytes, ValueType::of::<Vec<u8>>());
/// assert_ne!(bytes, ValueType::of::<String>());
/// assert_eq!(ValueType::of::<String>().name(), "alloc::string::String");
/// ```
#[derive(Clone, Copy)]
pub struct ValueType {
    id: TypeId,
    name: &'static str,
}

impl ValueType {
    /// Returns the value type for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Returns the fully-qualified name of the type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns `true` if this value type is `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

// Names are not guaranteed unique, so only the TypeId takes part in identity.
impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a cached bucket: value type, storage path and namespace.
///
/// Two keys are equal iff all three parts are equal. Keys are immutable once
/// built and only ever used to address the cache.
///
/// # Examples
///
/// ```
/// use bucketry_core::BucketKey;
///
/// let a = BucketKey::new::<Vec<u8>>("20240101/12", "file");
/// let b = BucketKey::new::<Vec<u8>>("20240101/12", "hdfs");
///
/// assert_ne!(a, b);
/// assert_eq!(a, BucketKey::new::<Vec<u8>>("20240101/12", "file"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BucketKey {
    value_type: ValueType,
    path: String,
    namespace: String,
}

impl BucketKey {
    /// Creates a key for values of type `T`.
    pub fn new<T: ?Sized + 'static>(path: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::with_type(ValueType::of::<T>(), path, namespace)
    }

    /// Creates a key from an already resolved value type.
    pub fn with_type(
        value_type: ValueType,
        path: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            value_type,
            path: path.into(),
            namespace: namespace.into(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}<{}>", self.namespace, self.path, self.value_type)
    }
}
