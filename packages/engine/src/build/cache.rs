// packages/engine/src/build/cache.rs
//! Built type cache
//!
//! Wraps any [`TypeLoader`] so each contract is built at most once while
//! the cached type is alive. Concurrent requests for the same contract wait
//! on one build. Failed builds are not cached.

use crate::build::loader::{BuildFailure, BuiltType, TypeLoader};
use crate::synthesis::proxy_type::ProxyTypeDefinition;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Contract identity: qualified name plus descriptor address
///
/// The cached type holds its contract, so the address stays unique for
/// the lifetime of the entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    contract: String,
    address: usize,
}

impl CacheKey {
    fn of(definition: &ProxyTypeDefinition) -> Self {
        Self {
            contract: definition.contract().name().to_string(),
            address: Arc::as_ptr(definition.contract()) as usize,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub builds: u64,
    pub failures: u64,
}

/// Single-flight caching loader
pub struct CachingLoader<L> {
    inner: L,
    types: DashMap<CacheKey, Arc<OnceCell<Arc<BuiltType>>>>,
    stats: Mutex<CacheStats>,
}

impl<L: TypeLoader> CachingLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            types: DashMap::new(),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Drop every cached type built for the named contract
    pub fn invalidate(&self, contract: &str) -> usize {
        let before = self.types.len();
        self.types.retain(|key, _| key.contract != contract);
        let removed = before - self.types.len();
        if removed > 0 {
            info!("Invalidated {} cached types for {}", removed, contract);
        }
        removed
    }

    pub fn clear(&self) {
        self.types.clear();
    }

    /// Number of successfully built types
    pub fn len(&self) -> usize {
        self.types.iter().filter(|entry| entry.value().get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

impl<L: TypeLoader> TypeLoader for CachingLoader<L> {
    fn build(&self, definition: ProxyTypeDefinition) -> Result<Arc<BuiltType>, BuildFailure> {
        let key = CacheKey::of(&definition);

        // Clone the cell out so the map shard is not held during the build
        let cell = Arc::clone(
            self.types
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let mut built_here = false;
        let result = cell.get_or_try_init(|| {
            built_here = true;
            self.inner.build(definition)
        });

        let mut stats = self.stats.lock();
        match result {
            Ok(built) => {
                if built_here {
                    stats.builds += 1;
                } else {
                    stats.hits += 1;
                    debug!("Cache hit for {}", key.contract);
                }
                Ok(Arc::clone(built))
            }
            Err(failure) => {
                stats.failures += 1;
                drop(stats);
                self.types.remove_if(&key, |_, cached| {
                    Arc::ptr_eq(cached, &cell) && cell.get().is_none()
                });
                Err(failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::loader::{Diagnostic, DispatchTableLoader};
    use crate::contract::catalog::OperationCatalog;
    use crate::contract::descriptor::Contract;
    use crate::contract::operation::Operation;
    use crate::contract::types::TypeRef;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct Counting {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl Counting {
        fn new(fail_first: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    impl TypeLoader for Counting {
        fn build(&self, definition: ProxyTypeDefinition) -> Result<Arc<BuiltType>, BuildFailure> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            if self.fail_first && call == 0 {
                return Err(BuildFailure::new(vec![Diagnostic::error("transient")]));
            }
            DispatchTableLoader::new().build(definition)
        }
    }

    fn sensor() -> Arc<Contract> {
        Contract::pure("iot.Sensor")
            .operation(Operation::new("read").returns(TypeRef::F64))
            .build()
            .unwrap()
    }

    fn definition(contract: &Arc<Contract>) -> ProxyTypeDefinition {
        let catalog = OperationCatalog::enumerate(contract).unwrap();
        ProxyTypeDefinition::synthesize(&catalog, None).unwrap()
    }

    #[test]
    fn test_concurrent_requests_build_once() {
        let contract = sensor();
        let cache = Arc::new(CachingLoader::new(Counting::new(false)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let definition = definition(&contract);
                thread::spawn(move || cache.build(definition).unwrap())
            })
            .collect();

        let built: Vec<Arc<BuiltType>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);
        assert!(built.iter().all(|b| Arc::ptr_eq(b, &built[0])));
        assert_eq!(cache.stats(), CacheStats { hits: 7, builds: 1, failures: 0 });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let contract = sensor();
        let cache = CachingLoader::new(Counting::new(true));

        assert!(cache.build(definition(&contract)).is_err());
        assert!(cache.is_empty());
        assert!(cache.build(definition(&contract)).is_ok());
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().failures, 1);
    }

    #[test]
    fn test_distinct_descriptors_get_distinct_types() {
        let first = sensor();
        let second = sensor();
        let cache = CachingLoader::new(DispatchTableLoader::new());

        let a = cache.build(definition(&first)).unwrap();
        let b = cache.build(definition(&second)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.invalidate("iot.Sensor"), 2);
        assert!(cache.is_empty());
    }
}
