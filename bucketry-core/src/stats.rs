use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how a bucket cache has been used.
///
/// Lookups are split into hits (served from the cache) and misses (the caller
/// went on to construct the bucket). A lookup that waited on the construction
/// lock and then found the entry built by another thread counts as a hit.
/// Lookups refused because the cache was closed count as neither.
///
/// # Thread Safety
///
/// All counters are atomics updated with `Relaxed` ordering; they are
/// monitoring data, not synchronization.
///
/// # Examples
///
/// ```
/// use bucketry_core::BucketStats;
///
/// let stats = BucketStats::new();
/// stats.record_miss();
/// stats.record_construction();
/// stats.record_hit();
/// stats.record_hit();
///
/// assert_eq!(stats.total_lookups(), 3);
/// assert_eq!(stats.constructions(), 1);
/// assert!((stats.hit_rate() - 0.6666).abs() < 0.001);
/// ```
#[derive(Debug)]
pub struct BucketStats {
    hits: AtomicU64,
    misses: AtomicU64,
    constructions: AtomicU64,
    construction_failures: AtomicU64,
    releases: AtomicU64,
    close_failures: AtomicU64,
}

impl BucketStats {
    /// Creates a new `BucketStats` instance with zero counters.
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            constructions: AtomicU64::new(0),
            construction_failures: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            close_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_construction(&self) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_construction_failure(&self) {
        self.construction_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a bucket whose close failed during close-and-release.
    #[inline]
    pub fn record_close_failure(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Number of buckets successfully constructed and stored.
    #[inline]
    pub fn constructions(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn construction_failures(&self) -> u64 {
        self.construction_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn close_failures(&self) -> u64 {
        self.close_failures.load(Ordering::Relaxed)
    }

    /// Returns the total number of lookups (hits + misses).
    #[inline]
    pub fn total_lookups(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Fraction of lookups served without construction (0.0 to 1.0).
    ///
    /// Returns 0.0 if there have been no lookups.
    #[inline]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.constructions.store(0, Ordering::Relaxed);
        self.construction_failures.store(0, Ordering::Relaxed);
        self.releases.store(0, Ordering::Relaxed);
        self.close_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for BucketStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for BucketStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            constructions: AtomicU64::new(self.constructions()),
            construction_failures: AtomicU64::new(self.construction_failures()),
            releases: AtomicU64::new(self.releases()),
            close_failures: AtomicU64::new(self.close_failures()),
        }
    }
}
