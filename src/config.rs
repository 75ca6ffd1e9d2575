use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the base directory in [`ManagerConfig::from_env`].
pub const BASE_DIR_ENV: &str = "BUCKETRY_BASE_DIR";

/// Default base directory for buckets.
pub const DEFAULT_BASE_DIR: &str = "target/bucket";

/// Configuration of a [`BucketManager`](crate::BucketManager).
///
/// Every bucket is initialized relative to `base_dir`.
///
/// # Examples
///
/// ```
/// use bucketry::ManagerConfig;
/// use std::path::Path;
///
/// let config = ManagerConfig::default().with_base_dir("/data/appdatas/cat/bucket");
/// assert_eq!(config.base_dir(), Path::new("/data/appdatas/cat/bucket"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManagerConfig {
    base_dir: PathBuf,
}

impl ManagerConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Reads the base directory from `BUCKETRY_BASE_DIR`, falling back to the default.
    pub fn from_env() -> Self {
        match env::var_os(BASE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::default(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR)
    }
}
