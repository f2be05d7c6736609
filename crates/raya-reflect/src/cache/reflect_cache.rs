//! Per-type reflection caches and the directory that owns them

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::heap::{Cacheable, RefHandle, SoftHeap};
use super::key::CacheKey;
use crate::types::TypeId;

/// Cache of resolved members for one declaring type.
///
/// Entries map a [`CacheKey`] to a soft-heap handle. A cache detaches itself
/// from its [`CacheDirectory`] once it is empty and no query is using it.
#[derive(Debug)]
pub struct ReflectCache {
    owner: TypeId,
    entries: DashMap<CacheKey, RefHandle>,
    use_count: AtomicUsize,
    heap: Arc<SoftHeap>,
    directory: Weak<CacheDirectory>,
}

impl ReflectCache {
    fn new(owner: TypeId, heap: Arc<SoftHeap>, directory: Weak<CacheDirectory>) -> Self {
        Self {
            owner,
            entries: DashMap::new(),
            use_count: AtomicUsize::new(0),
            heap,
            directory,
        }
    }

    /// Type this cache belongs to
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    /// Live value under `key`, if any
    pub fn find<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        let handle = *self.entries.get(key)?;
        self.heap.get(handle).and_then(T::from_cached)
    }

    /// Publish `value` under `key`, replacing whatever was there
    pub fn insert<T: Cacheable + Clone>(self: &Arc<Self>, key: CacheKey, value: T) -> T {
        let handle = self
            .heap
            .register(value.clone().into_cached(), Arc::downgrade(self), key.clone());
        self.entries.insert(key, handle);
        value
    }

    /// Publish `value` under `key` unless a live value is already there.
    /// Returns the value that ends up published.
    pub fn insert_if_absent<T: Cacheable + Clone>(self: &Arc<Self>, key: CacheKey, value: T) -> T {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if let Some(existing) = self.heap.get(*occupied.get()).and_then(T::from_cached) {
                    return existing;
                }
                let handle = self
                    .heap
                    .register(value.clone().into_cached(), Arc::downgrade(self), key);
                occupied.insert(handle);
                value
            }
            Entry::Vacant(vacant) => {
                let handle = self
                    .heap
                    .register(value.clone().into_cached(), Arc::downgrade(self), key);
                vacant.insert(handle);
                value
            }
        }
    }

    /// Reclamation callback: drop `key` if it still maps to the cleared
    /// handle, then detach the cache if nothing is left.
    pub(crate) fn handle_cleared(self: &Arc<Self>, key: &CacheKey, handle: RefHandle) {
        self.entries.remove_if(key, |_, current| *current == handle);
        self.try_detach();
    }

    /// Number of entries, live or not yet processed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queries currently holding this cache
    pub fn use_count(&self) -> usize {
        self.use_count.load(Ordering::Acquire)
    }

    fn try_detach(self: &Arc<Self>) {
        if !self.is_empty() || self.use_count() != 0 {
            return;
        }
        let Some(directory) = self.directory.upgrade() else {
            return;
        };
        let removed = directory.caches.remove_if(&self.owner, |_, cache| {
            Arc::ptr_eq(cache, self) && cache.is_empty() && cache.use_count() == 0
        });
        if removed.is_some() {
            tracing::debug!(ty = %self.owner, "reflection cache detached");
        }
    }
}

/// Keeps a [`ReflectCache`] in use for the duration of a query
#[derive(Debug)]
pub struct CacheGuard {
    cache: Arc<ReflectCache>,
}

impl CacheGuard {
    pub fn cache(&self) -> &Arc<ReflectCache> {
        &self.cache
    }
}

impl std::ops::Deref for CacheGuard {
    type Target = Arc<ReflectCache>;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl Drop for CacheGuard {
    fn drop(&mut self) {
        if self.cache.use_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.cache.try_detach();
        }
    }
}

/// Directory of per-type caches, at most one per type
#[derive(Debug)]
pub struct CacheDirectory {
    caches: DashMap<TypeId, Arc<ReflectCache>>,
    heap: Arc<SoftHeap>,
}

impl CacheDirectory {
    pub fn new(heap: Arc<SoftHeap>) -> Arc<Self> {
        Arc::new(Self {
            caches: DashMap::new(),
            heap,
        })
    }

    /// Get or create the cache for `ty` and mark it in use. Creation and
    /// the use-count increment happen under the directory's entry lock, so
    /// racing callers all end up with the same cache.
    pub fn acquire(self: &Arc<Self>, ty: TypeId) -> CacheGuard {
        let entry = self.caches.entry(ty).or_insert_with(|| {
            Arc::new(ReflectCache::new(ty, self.heap.clone(), Arc::downgrade(self)))
        });
        entry.use_count.fetch_add(1, Ordering::AcqRel);
        CacheGuard {
            cache: entry.value().clone(),
        }
    }

    /// The cache for `ty` if one is attached
    pub fn peek(&self, ty: TypeId) -> Option<Arc<ReflectCache>> {
        self.caches.get(&ty).map(|cache| cache.value().clone())
    }

    /// Number of attached caches
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Run the reclamation callback for every cleared notice the heap has
    /// posted. Returns the number of notices handled.
    pub fn process_cleared(&self) -> usize {
        let notices = self.heap.drain_cleared();
        let count = notices.len();
        for notice in notices {
            if let Some(cache) = notice.cache.upgrade() {
                cache.handle_cleared(&notice.key, notice.handle);
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{Method, Modifiers, Origin};
    use std::sync::Barrier;
    use std::thread;

    fn method(name: &str, declarer: u32) -> Arc<Method> {
        Arc::new(Method::new(
            name,
            &[],
            TypeId::from_u32(0),
            TypeId::from_u32(declarer),
            Origin::Class,
            Modifiers::public(),
        ))
    }

    fn directory() -> (Arc<SoftHeap>, Arc<CacheDirectory>) {
        let heap = Arc::new(SoftHeap::new());
        let directory = CacheDirectory::new(heap.clone());
        (heap, directory)
    }

    // ===== Insert semantics =====

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let (_heap, directory) = directory();
        let guard = directory.acquire(TypeId::from_u32(1));
        let key = CacheKey::method("m", &[], None);

        let first = guard.insert_if_absent(key.clone(), method("m", 1));
        let second = guard.insert_if_absent(key.clone(), method("m", 1));
        assert!(Arc::ptr_eq(&first, &second));

        let found: Arc<Method> = guard.find(&key).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_insert_overwrites() {
        let (_heap, directory) = directory();
        let guard = directory.acquire(TypeId::from_u32(1));
        let key = CacheKey::method("m", &[], None);

        let first = guard.insert(key.clone(), method("m", 1));
        let second = guard.insert(key.clone(), method("m", 1));
        assert!(!Arc::ptr_eq(&first, &second));
        let found: Arc<Method> = guard.find(&key).unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn test_insert_if_absent_replaces_cleared_entry() {
        let (heap, directory) = directory();
        let guard = directory.acquire(TypeId::from_u32(1));
        let key = CacheKey::method("m", &[], None);

        drop(guard.insert_if_absent(key.clone(), method("m", 1)));
        heap.collect();
        assert!(guard.find::<Arc<Method>>(&key).is_none());

        let replacement = guard.insert_if_absent(key.clone(), method("m", 1));
        let found: Arc<Method> = guard.find(&key).unwrap();
        assert!(Arc::ptr_eq(&found, &replacement));
    }

    // ===== Directory lifecycle =====

    #[test]
    fn test_acquire_returns_same_cache() {
        let (_heap, directory) = directory();
        let a = directory.acquire(TypeId::from_u32(1));
        let b = directory.acquire(TypeId::from_u32(1));
        assert!(Arc::ptr_eq(a.cache(), b.cache()));
        assert_eq!(a.use_count(), 2);
    }

    #[test]
    fn test_empty_cache_detaches_on_release() {
        let (_heap, directory) = directory();
        drop(directory.acquire(TypeId::from_u32(1)));
        assert!(directory.peek(TypeId::from_u32(1)).is_none());
    }

    #[test]
    fn test_cleared_entries_detach_cache() {
        let (heap, directory) = directory();
        let ty = TypeId::from_u32(1);
        {
            let guard = directory.acquire(ty);
            guard.insert_if_absent(CacheKey::method("m", &[], None), method("m", 1));
        }
        assert_eq!(directory.peek(ty).map(|c| c.len()), Some(1));

        assert_eq!(heap.collect(), 1);
        assert_eq!(directory.process_cleared(), 1);
        assert!(directory.peek(ty).is_none());
    }

    #[test]
    fn test_in_use_cache_is_not_detached() {
        let (heap, directory) = directory();
        let ty = TypeId::from_u32(1);
        let guard = directory.acquire(ty);
        guard.insert_if_absent(CacheKey::method("m", &[], None), method("m", 1));

        heap.collect();
        directory.process_cleared();
        assert!(guard.is_empty());
        assert!(directory.peek(ty).is_some());

        drop(guard);
        assert!(directory.peek(ty).is_none());
    }

    #[test]
    fn test_overwritten_entry_survives_stale_notice() {
        let (heap, directory) = directory();
        let ty = TypeId::from_u32(1);
        let key = CacheKey::method("m", &[], None);
        let guard = directory.acquire(ty);
        drop(guard.insert(key.clone(), method("m", 1)));
        let kept = guard.insert(key.clone(), method("m", 1));

        heap.collect();
        directory.process_cleared();
        let found: Arc<Method> = guard.find(&key).unwrap();
        assert!(Arc::ptr_eq(&found, &kept));
    }

    #[test]
    fn test_concurrent_acquire_publishes_one_cache() {
        let (_heap, directory) = directory();
        let barrier = Arc::new(Barrier::new(8));
        let ty = TypeId::from_u32(5);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let guard = directory.acquire(ty);
                    let value =
                        guard.insert_if_absent(CacheKey::method("m", &[], None), method("m", 5));
                    (Arc::as_ptr(guard.cache()) as usize, value)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let (cache_ptr, first) = &results[0];
        for (ptr, value) in &results {
            assert_eq!(ptr, cache_ptr);
            assert!(Arc::ptr_eq(value, first));
        }
    }
}
