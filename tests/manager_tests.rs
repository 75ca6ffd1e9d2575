use bucketry::{
    Bucket, BucketError, BucketManager, BucketRegistry, ManagerConfig, MessageTree, ValueType,
};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Weak};
use std::thread;
use std::time::Duration;

/// Bucket that remembers where it was initialized and can be told to fail.
#[derive(Default)]
struct FakeBucket {
    location: Mutex<Option<PathBuf>>,
    value_type: Mutex<Option<&'static str>>,
    fail_close: bool,
    closes: AtomicUsize,
}

impl Bucket for FakeBucket {
    fn initialize(&mut self, value_type: &ValueType, base_dir: &Path, path: &str) -> io::Result<()> {
        thread::sleep(Duration::from_millis(10));
        *self.location.lock() = Some(base_dir.join(path));
        *self.value_type.lock() = Some(value_type.name());
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::Other, "flush failed"))
        } else {
            Ok(())
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Constructor invocation counts per registered name.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    fn count(&self, name: &str) -> usize {
        self.0.lock().iter().filter(|n| n.as_str() == name).count()
    }

    fn total(&self) -> usize {
        self.0.lock().len()
    }
}

fn register(registry: &BucketRegistry, calls: &Calls, name: &str, fail_close: bool) {
    let calls = calls.clone();
    let recorded = name.to_string();
    registry.register(name, move || -> io::Result<Box<dyn Bucket>> {
        calls.0.lock().push(recorded.clone());
        Ok(Box::new(FakeBucket {
            fail_close,
            ..FakeBucket::default()
        }))
    });
}

fn manager_with(fail_close: bool) -> (BucketManager, Arc<BucketRegistry>, Calls) {
    let registry = Arc::new(BucketRegistry::new());
    let calls = Calls::default();
    register(&registry, &calls, "hdfs", fail_close);
    register(&registry, &calls, "hdfs-logview", fail_close);
    register(&registry, &calls, ValueType::of::<Vec<u8>>().name(), fail_close);
    register(&registry, &calls, ValueType::of::<String>().name(), fail_close);
    register(&registry, &calls, ValueType::of::<MessageTree>().name(), fail_close);

    let manager = BucketManager::new(registry.clone(), ManagerConfig::new("/data/bucket"));
    (manager, registry, calls)
}

fn manager() -> (BucketManager, Arc<BucketRegistry>, Calls) {
    manager_with(false)
}

#[test]
fn test_concurrent_first_access_constructs_once() {
    let (manager, _, calls) = manager();
    let manager = Arc::new(manager);
    let barrier = Arc::new(Barrier::new(12));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.bytes_bucket("20240101/12/cat").unwrap()
            })
        })
        .collect();

    let buckets: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.total(), 1);
    assert_eq!(buckets.len(), 12);
    assert!(buckets.iter().all(|b| b.same_bucket(&buckets[0])));
}

#[test]
fn test_concurrent_distinct_keys_each_construct_once() {
    let (manager, _, calls) = manager();
    let manager = Arc::new(manager);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.string_bucket(&format!("path-{}", i % 4)).unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(calls.total(), 4);
    assert_eq!(manager.cache().len(), 4);
}

#[test]
fn test_repeated_lookup_returns_same_handle() {
    let (manager, _, calls) = manager();

    let first = manager.string_bucket("a/b").unwrap();
    let second = manager.string_bucket("a/b").unwrap();
    let third = manager.bucket::<String>("a/b", "file").unwrap();

    assert!(first.same_bucket(&second));
    assert!(first.same_bucket(&third));
    assert_eq!(calls.total(), 1);
}

#[test]
fn test_typed_accessors_route_to_constructors() {
    let (manager, _, calls) = manager();

    let bytes = manager.bytes_bucket("p").unwrap();
    let hdfs = manager.hdfs_bucket("p").unwrap();
    let logview = manager.logview_bucket("p").unwrap();
    let message = manager.message_bucket("p").unwrap();
    let string = manager.string_bucket("p").unwrap();

    assert_eq!(bytes.constructor(), "alloc::vec::Vec<u8>");
    assert_eq!(hdfs.constructor(), "hdfs");
    assert_eq!(logview.constructor(), "hdfs-logview");
    assert_eq!(message.constructor(), ValueType::of::<MessageTree>().name());
    assert_eq!(string.constructor(), "alloc::string::String");

    assert_eq!(calls.count("hdfs"), 1);
    assert_eq!(calls.count("hdfs-logview"), 1);
    assert_eq!(calls.total(), 5);

    assert_eq!(bytes.namespace(), "file");
    assert_eq!(hdfs.namespace(), "hdfs");
    assert!(!bytes.same_bucket(&hdfs));
}

#[test]
fn test_unknown_namespace_resolves_by_value_type() {
    let (manager, _, calls) = manager();

    let local = manager.bucket::<String>("p", "local").unwrap();
    let hdfs_like = manager.bucket::<String>("p", "hdfs2").unwrap();

    assert_eq!(local.constructor(), "alloc::string::String");
    assert_eq!(hdfs_like.constructor(), "alloc::string::String");
    assert_eq!(calls.count("alloc::string::String"), 2);
    assert_eq!(calls.count("hdfs"), 0);
}

#[test]
fn test_keys_differing_in_one_part_are_distinct() {
    let (manager, _, calls) = manager();

    let base = manager.bytes_bucket("p").unwrap();
    let other_path = manager.bytes_bucket("q").unwrap();
    let other_namespace = manager.hdfs_bucket("p").unwrap();
    let other_type = manager.string_bucket("p").unwrap();

    assert_eq!(calls.total(), 4);
    assert!(!base.same_bucket(&other_path));
    assert!(!base.same_bucket(&other_namespace));
    assert!(!base.raw().same_bucket(other_type.raw()));
}

#[test]
fn test_bucket_initialized_against_base_dir() {
    let (mut manager, _, _) = manager();
    manager.set_base_dir("/var/cat/bucket");

    let bucket = manager.message_bucket("20240101/12/cat").unwrap();
    let fake = bucket.downcast_ref::<FakeBucket>().unwrap();

    assert_eq!(
        fake.location.lock().clone(),
        Some(PathBuf::from("/var/cat/bucket/20240101/12/cat"))
    );
    assert_eq!(
        *fake.value_type.lock(),
        Some(ValueType::of::<MessageTree>().name())
    );
    assert_eq!(manager.base_dir(), Path::new("/var/cat/bucket"));
}

#[test]
fn test_empty_path_is_rejected() {
    let (manager, _, calls) = manager();

    let err = manager.bytes_bucket("").err().unwrap();

    assert!(matches!(err, BucketError::InvalidArgument { .. }));
    assert_eq!(calls.total(), 0);
    assert!(manager.cache().is_empty());
}

#[test]
fn test_missing_constructor_is_not_cached_and_retried() {
    let registry = Arc::new(BucketRegistry::new());
    let calls = Calls::default();
    let manager = BucketManager::new(registry.clone(), ManagerConfig::default());

    let err = manager.string_bucket("p").err().unwrap();
    assert!(matches!(err, BucketError::Resolution { .. }));
    assert!(manager.cache().is_empty());

    register(&registry, &calls, ValueType::of::<String>().name(), false);
    let bucket = manager.string_bucket("p").unwrap();

    assert_eq!(calls.total(), 1);
    assert!(!bucket.is_released());
}

#[test]
fn test_initialization_failure_propagates() {
    struct Unwritable;

    impl Bucket for Unwritable {
        fn initialize(&mut self, _: &ValueType, _: &Path, _: &str) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only fs"))
        }
        fn close(&self) -> io::Result<()> {
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    let registry = Arc::new(BucketRegistry::new());
    registry.register("hdfs", || -> io::Result<Box<dyn Bucket>> { Ok(Box::new(Unwritable)) });
    let manager = BucketManager::new(registry.clone(), ManagerConfig::default());

    let err = manager.hdfs_bucket("p").err().unwrap();

    assert!(matches!(err, BucketError::Initialization { .. }));
    assert!(manager.cache().is_empty());
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn test_close_bucket_closes_and_releases() {
    let (manager, registry, _) = manager();
    let bucket = manager.string_bucket("p").unwrap();
    assert!(registry.is_live(bucket.id()));

    manager.close_bucket(&bucket);

    assert!(bucket.is_closed());
    assert!(bucket.is_released());
    assert!(!registry.is_live(bucket.id()));
}

#[test]
fn test_close_failure_still_releases() {
    let (manager, registry, _) = manager_with(true);
    let bucket = manager.bytes_bucket("p").unwrap();

    manager.close_bucket(&bucket);

    let fake = bucket.downcast_ref::<FakeBucket>().unwrap();
    assert_eq!(fake.closes.load(Ordering::SeqCst), 1);
    assert!(!bucket.is_closed());
    assert!(bucket.is_released());
    assert_eq!(registry.live_count(), 0);
    #[cfg(feature = "stats")]
    assert_eq!(manager.stats().close_failures(), 1);
}

#[test]
fn test_closed_bucket_stays_cached() {
    let (manager, _, calls) = manager();
    let bucket = manager.string_bucket("p").unwrap();
    manager.close_bucket(&bucket);

    let again = manager.string_bucket("p").unwrap();

    assert!(again.same_bucket(&bucket));
    assert!(again.is_released());
    assert_eq!(calls.total(), 1);
}

#[test]
fn test_close_bucket_from_other_manager_is_ignored() {
    let (a, registry_a, _) = manager();
    let (b, registry_b, _) = manager();
    let ha = a.string_bucket("p").unwrap();
    let hb = b.string_bucket("p").unwrap();
    // Each registry numbers its instances from 1.
    assert_eq!(ha.id(), hb.id());

    b.close_bucket(&ha);

    assert!(!ha.is_closed());
    assert!(!ha.is_released());
    assert!(registry_a.is_live(ha.id()));
    assert!(registry_b.is_live(hb.id()));
    assert_eq!(ha.downcast_ref::<FakeBucket>().unwrap().closes.load(Ordering::SeqCst), 0);

    assert_eq!(a.dispose(), 1);
    assert_eq!(b.dispose(), 1);
    assert_eq!(registry_a.live_count(), 0);
    assert_eq!(registry_b.live_count(), 0);
}

#[test]
fn test_close_bucket_from_manager_sharing_registry_is_ignored() {
    let (a, registry, _) = manager();
    let b = BucketManager::new(registry.clone(), ManagerConfig::default());
    let ha = a.bytes_bucket("p").unwrap();
    let hb = b.bytes_bucket("p").unwrap();

    b.close_bucket(&ha);

    assert!(!ha.is_released());
    assert!(registry.is_live(ha.id()));
    assert!(registry.is_live(hb.id()));

    assert_eq!(a.dispose(), 1);
    assert_eq!(b.dispose(), 1);
    assert_eq!(registry.live_count(), 0);
}

/// Registers a constructor under `name` that first looks up `path` through
/// the manager in `slot`, reporting whether that nested lookup succeeded.
fn register_nested<F>(
    registry: &BucketRegistry,
    name: &str,
    slot: &Arc<Mutex<Weak<BucketManager>>>,
    nested: F,
) where
    F: Fn(&BucketManager) -> bucketry::Result<()> + Send + Sync + 'static,
{
    let slot = slot.clone();
    registry.register(name, move || -> io::Result<Box<dyn Bucket>> {
        let manager = slot
            .lock()
            .upgrade()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "manager gone"))?;
        nested(&manager).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(Box::new(FakeBucket::default()))
    });
}

#[test]
fn test_constructor_may_request_another_bucket() {
    let (manager, registry, calls) = manager();
    let manager = Arc::new(manager);
    let slot = Arc::new(Mutex::new(Arc::downgrade(&manager)));
    register_nested(&registry, "hdfs-logview", &slot, |manager| {
        manager.bytes_bucket("20240101/12/cat.idx").map(|_| ())
    });

    let logview = manager.logview_bucket("20240101/12/cat").unwrap();

    assert_eq!(logview.constructor(), "hdfs-logview");
    assert_eq!(calls.count("alloc::vec::Vec<u8>"), 1);
    assert_eq!(manager.cache().len(), 2);
    let index = manager.bytes_bucket("20240101/12/cat.idx").unwrap();
    assert_eq!(calls.count("alloc::vec::Vec<u8>"), 1);
    assert_eq!(index.path(), "20240101/12/cat.idx");
    assert_eq!(manager.dispose(), 2);
}

#[test]
fn test_constructor_requesting_its_own_bucket_fails() {
    let (manager, registry, _) = manager();
    let manager = Arc::new(manager);
    let slot = Arc::new(Mutex::new(Arc::downgrade(&manager)));
    let cyclic = Arc::new(AtomicUsize::new(0));
    let seen = cyclic.clone();
    register_nested(&registry, "hdfs", &slot, move |manager| {
        let err = manager.hdfs_bucket("loop").err().unwrap();
        if matches!(err, BucketError::CyclicConstruction { .. }) {
            seen.fetch_add(1, Ordering::SeqCst);
        }
        Err(err)
    });

    let err = manager.hdfs_bucket("loop").err().unwrap();

    assert!(matches!(err, BucketError::Resolution { .. }));
    assert_eq!(cyclic.load(Ordering::SeqCst), 1);
    assert!(manager.cache().is_empty());
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn test_dispose_releases_every_bucket_once() {
    let (manager, registry, _) = manager();
    let a = manager.bytes_bucket("a").unwrap();
    let b = manager.hdfs_bucket("a").unwrap();
    let c = manager.string_bucket("c").unwrap();
    manager.close_bucket(&c);
    assert_eq!(registry.live_count(), 2);

    assert_eq!(manager.dispose(), 2);

    assert!(a.is_released());
    assert!(b.is_released());
    assert_eq!(registry.live_count(), 0);
    assert!(manager.is_disposed());
    #[cfg(feature = "stats")]
    assert_eq!(manager.stats().releases(), 3);
}

#[test]
fn test_dispose_empty_manager() {
    let (manager, registry, _) = manager();

    assert_eq!(manager.dispose(), 0);
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn test_dispose_twice_is_noop() {
    let (manager, _, _) = manager();
    manager.bytes_bucket("a").unwrap();

    assert_eq!(manager.dispose(), 1);
    assert_eq!(manager.dispose(), 0);
}

#[test]
fn test_lookup_then_dispose() {
    let (manager, registry, _) = manager();
    let bucket = manager.bytes_bucket("a").unwrap();

    manager.dispose();

    assert!(bucket.is_released());
    assert!(!registry.is_live(bucket.id()));
}

#[test]
fn test_dispose_then_lookup_fails_fast() {
    let (manager, _, calls) = manager();
    manager.bytes_bucket("cached").unwrap();

    manager.dispose();

    let miss = manager.bytes_bucket("new").err().unwrap();
    let hit = manager.bytes_bucket("cached").err().unwrap();
    assert!(matches!(miss, BucketError::ManagerClosed));
    assert!(matches!(hit, BucketError::ManagerClosed));
    assert_eq!(calls.total(), 1);
}

#[test]
fn test_dispose_racing_with_lookups_leaves_nothing_live() {
    let (manager, registry, _) = manager();
    let manager = Arc::new(manager);
    let barrier = Arc::new(Barrier::new(9));

    let lookups: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.bytes_bucket(&format!("p{i}"))
            })
        })
        .collect();

    barrier.wait();
    let released = manager.dispose();

    let mut constructed = 0;
    for lookup in lookups {
        match lookup.join().unwrap() {
            Ok(bucket) => {
                constructed += 1;
                assert!(bucket.is_released());
            }
            Err(e) => assert!(matches!(e, BucketError::ManagerClosed)),
        }
    }

    assert_eq!(released, constructed);
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn test_drop_disposes() {
    let (manager, registry, _) = manager();
    let bucket = manager.string_bucket("p").unwrap();

    drop(manager);

    assert!(bucket.is_released());
    assert_eq!(registry.live_count(), 0);
}
