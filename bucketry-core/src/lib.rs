//! # Bucketry Core
//!
//! Core types for the bucketry bucket manager.
//!
//! A *bucket* is a handle over some external storage (a local file, an HDFS
//! path, ...) holding values of one type. This crate provides the pieces that
//! decide which bucket serves a request and make sure each one is built once:
//!
//! - **Keys**: `(value type, path, namespace)` identities for cached buckets
//! - **Registry**: name-based constructor lookup and live-instance tracking
//! - **Factory**: namespace routing plus initialization against a base directory
//! - **Cache**: at-most-once construction per key under concurrent access
//!
//! ## Module Organization
//!
//! - [`key`] - [`ValueType`] and [`BucketKey`]
//! - [`bucket`] - the [`Bucket`] capability trait and shared handles
//! - [`registry`] - [`BucketRegistry`], the constructor table
//! - [`factory`] - [`BucketFactory`] and the namespace resolution rule
//! - [`cache`] - [`BucketCache`] with its coarse construction lock
//!
pub mod bucket;
pub mod cache;
pub mod error;
pub mod factory;
pub mod key;
pub mod registry;

#[cfg(feature = "stats")]
mod stats;

pub use bucket::{Bucket, BucketHandle, RawHandle};
pub use cache::BucketCache;
pub use error::{BucketError, Result};
pub use factory::{
    resolve_name, BucketFactory, FILE_NAMESPACE, HDFS_LOGVIEW_NAMESPACE, HDFS_NAMESPACE,
};
pub use key::{BucketKey, ValueType};
pub use registry::{BucketRegistry, Constructor};

#[cfg(feature = "stats")]
pub use stats::BucketStats;
