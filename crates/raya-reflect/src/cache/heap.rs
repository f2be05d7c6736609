//! Soft-reference arena
//!
//! Cached referents live in a runtime-wide [`SoftHeap`]. Caches never own a
//! referent directly; they hold a [`RefHandle`] (slot index plus generation)
//! and ask the heap whether it still resolves. [`SoftHeap::collect`] clears
//! every referent that nothing outside the heap keeps alive, bumps the
//! slot's generation so stale handles read as absent, and posts a
//! [`ClearedNotice`] for every cache entry that pointed at it.
//!
//! A referent is stored once no matter how many entries alias it: slots are
//! interned by the address of the shared allocation.
//!
//! Lock order is `interned` before `slots`. `collect` never holds a slot
//! lock while touching `interned`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::queue::SegQueue;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::key::CacheKey;
use super::reflect_cache::ReflectCache;
use crate::member::{Constructor, Field, Method};

/// A value stored in the soft heap
#[derive(Debug, Clone)]
pub enum Cached {
    Method(Arc<Method>),
    Field(Arc<Field>),
    Constructor(Arc<Constructor>),
    Methods(Arc<[Arc<Method>]>),
    Fields(Arc<[Arc<Field>]>),
    Constructors(Arc<[Arc<Constructor>]>),
}

impl Cached {
    fn addr(&self) -> usize {
        match self {
            Cached::Method(m) => Arc::as_ptr(m) as *const () as usize,
            Cached::Field(f) => Arc::as_ptr(f) as *const () as usize,
            Cached::Constructor(c) => Arc::as_ptr(c) as *const () as usize,
            Cached::Methods(list) => Arc::as_ptr(list) as *const () as usize,
            Cached::Fields(list) => Arc::as_ptr(list) as *const () as usize,
            Cached::Constructors(list) => Arc::as_ptr(list) as *const () as usize,
        }
    }

    fn strong_count(&self) -> usize {
        match self {
            Cached::Method(m) => Arc::strong_count(m),
            Cached::Field(f) => Arc::strong_count(f),
            Cached::Constructor(c) => Arc::strong_count(c),
            Cached::Methods(list) => Arc::strong_count(list),
            Cached::Fields(list) => Arc::strong_count(list),
            Cached::Constructors(list) => Arc::strong_count(list),
        }
    }
}

/// Values that can be stored in the soft heap
pub trait Cacheable: Sized {
    fn into_cached(self) -> Cached;
    fn from_cached(cached: Cached) -> Option<Self>;
}

macro_rules! impl_cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> Cached {
                Cached::$variant(self)
            }

            fn from_cached(cached: Cached) -> Option<Self> {
                match cached {
                    Cached::$variant(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

impl_cacheable!(Arc<Method>, Method);
impl_cacheable!(Arc<Field>, Field);
impl_cacheable!(Arc<Constructor>, Constructor);
impl_cacheable!(Arc<[Arc<Method>]>, Methods);
impl_cacheable!(Arc<[Arc<Field>]>, Fields);
impl_cacheable!(Arc<[Arc<Constructor>]>, Constructors);

/// Generation-checked handle to a heap slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefHandle {
    index: u32,
    generation: u32,
}

/// A cache entry whose referent was cleared
#[derive(Debug)]
pub struct ClearedNotice {
    pub(crate) cache: Weak<ReflectCache>,
    pub(crate) key: CacheKey,
    pub(crate) handle: RefHandle,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    referent: Option<Cached>,
    registrations: Vec<(Weak<ReflectCache>, CacheKey)>,
}

impl Slot {
    fn handle(&self, index: u32) -> RefHandle {
        RefHandle {
            index,
            generation: self.generation,
        }
    }

    fn is_reclaimable(&self) -> bool {
        self.referent
            .as_ref()
            .is_some_and(|referent| referent.strong_count() == 1)
    }
}

/// Runtime-wide arena of softly held cache referents
#[derive(Debug)]
pub struct SoftHeap {
    slots: DashMap<u32, Slot>,
    interned: DashMap<usize, RefHandle>,
    free: SegQueue<u32>,
    next_index: AtomicU32,
    cleared_tx: Sender<ClearedNotice>,
    cleared_rx: Receiver<ClearedNotice>,
}

impl SoftHeap {
    pub fn new() -> Self {
        let (cleared_tx, cleared_rx) = channel::unbounded();
        Self {
            slots: DashMap::new(),
            interned: DashMap::new(),
            free: SegQueue::new(),
            next_index: AtomicU32::new(0),
            cleared_tx,
            cleared_rx,
        }
    }

    /// Store `value` (or find the slot already holding it) and record that
    /// `cache` refers to it under `key`.
    pub(crate) fn register(
        &self,
        value: Cached,
        cache: Weak<ReflectCache>,
        key: CacheKey,
    ) -> RefHandle {
        match self.interned.entry(value.addr()) {
            Entry::Occupied(mut existing) => {
                let handle = *existing.get();
                if let Some(mut slot) = self.slots.get_mut(&handle.index) {
                    if slot.generation == handle.generation && slot.referent.is_some() {
                        let known = slot.registrations.iter().any(|(existing, existing_key)| {
                            existing.ptr_eq(&cache) && *existing_key == key
                        });
                        if !known {
                            slot.registrations.push((cache, key));
                        }
                        return handle;
                    }
                }
                let handle = self.allocate(value, (cache, key));
                existing.insert(handle);
                handle
            }
            Entry::Vacant(vacant) => {
                let handle = self.allocate(value, (cache, key));
                vacant.insert(handle);
                handle
            }
        }
    }

    fn allocate(&self, value: Cached, registration: (Weak<ReflectCache>, CacheKey)) -> RefHandle {
        let index = self
            .free
            .pop()
            .unwrap_or_else(|| self.next_index.fetch_add(1, Ordering::Relaxed));
        let mut slot = self.slots.entry(index).or_default();
        slot.referent = Some(value);
        slot.registrations = vec![registration];
        slot.handle(index)
    }

    /// Resolve a handle; `None` once its referent has been cleared
    pub fn get(&self, handle: RefHandle) -> Option<Cached> {
        let slot = self.slots.get(&handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.referent.clone()
    }

    /// Whether a handle still resolves
    pub fn is_live(&self, handle: RefHandle) -> bool {
        self.slots
            .get(&handle.index)
            .is_some_and(|slot| slot.generation == handle.generation && slot.referent.is_some())
    }

    /// Registrations recorded across all slots
    #[cfg(test)]
    pub(crate) fn registration_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.registrations.len()).sum()
    }

    /// Number of live referents
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.referent.is_some()).count()
    }

    /// Clear every referent only the heap still holds, until nothing more
    /// can be cleared. Returns how many referents were cleared.
    pub fn collect(&self) -> usize {
        let mut total = 0;
        loop {
            let candidates: Vec<u32> = self
                .slots
                .iter()
                .filter(|slot| slot.is_reclaimable())
                .map(|slot| *slot.key())
                .collect();
            let mut cleared = 0;
            for index in candidates {
                if self.clear_slot(index) {
                    cleared += 1;
                }
            }
            if cleared == 0 {
                break;
            }
            total += cleared;
        }
        if total > 0 {
            tracing::debug!(cleared = total, live = self.live_count(), "soft heap collected");
        }
        total
    }

    fn clear_slot(&self, index: u32) -> bool {
        let Some(mut slot) = self.slots.get_mut(&index) else {
            return false;
        };
        if !slot.is_reclaimable() {
            return false;
        }
        let handle = slot.handle(index);
        let referent = slot.referent.take();
        let registrations = std::mem::take(&mut slot.registrations);
        slot.generation = slot.generation.wrapping_add(1);
        drop(slot);

        // Unintern before the allocation is freed so its address cannot be
        // reused while the stale entry is still visible.
        if let Some(referent) = referent {
            self.interned.remove_if(&referent.addr(), |_, interned| *interned == handle);
            drop(referent);
        }
        self.free.push(index);

        for (cache, key) in registrations {
            // The receiver lives as long as the heap.
            let _ = self.cleared_tx.send(ClearedNotice { cache, key, handle });
        }
        true
    }

    /// Take every pending cleared notice
    pub(crate) fn drain_cleared(&self) -> Vec<ClearedNotice> {
        self.cleared_rx.try_iter().collect()
    }
}

impl Default for SoftHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::{Modifiers, Origin};
    use crate::types::TypeId;

    fn method(name: &str) -> Arc<Method> {
        Arc::new(Method::new(
            name,
            &[],
            TypeId::from_u32(0),
            TypeId::from_u32(1),
            Origin::Class,
            Modifiers::public(),
        ))
    }

    fn register(heap: &SoftHeap, value: Cached) -> RefHandle {
        heap.register(value, Weak::new(), CacheKey::field("x", None))
    }

    #[test]
    fn test_register_and_get() {
        let heap = SoftHeap::new();
        let handle = register(&heap, method("m").into_cached());
        let back = heap.get(handle).and_then(<Arc<Method>>::from_cached).unwrap();
        assert_eq!(back.name(), "m");
        assert!(heap.is_live(handle));
    }

    #[test]
    fn test_same_allocation_is_interned() {
        let heap = SoftHeap::new();
        let m = method("m");
        let first = register(&heap, m.clone().into_cached());
        let second = register(&heap, m.into_cached());
        assert_eq!(first, second);
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn test_repeat_registration_is_recorded_once() {
        let heap = SoftHeap::new();
        let m = method("m");
        for _ in 0..5 {
            register(&heap, m.clone().into_cached());
        }
        assert_eq!(heap.registration_count(), 1);

        heap.register(m.into_cached(), Weak::new(), CacheKey::field("y", None));
        assert_eq!(heap.registration_count(), 2);
    }

    #[test]
    fn test_collect_clears_unreachable_only() {
        let heap = SoftHeap::new();
        let held = method("held");
        let kept = register(&heap, held.clone().into_cached());
        let dropped = register(&heap, method("dropped").into_cached());

        assert_eq!(heap.collect(), 1);
        assert!(heap.is_live(kept));
        assert!(!heap.is_live(dropped));
        assert!(heap.get(dropped).is_none());
        assert_eq!(heap.drain_cleared().len(), 1);
    }

    #[test]
    fn test_collect_reaches_fixpoint_through_lists() {
        let heap = SoftHeap::new();
        let m = method("m");
        let member = register(&heap, m.clone().into_cached());
        let list: Arc<[Arc<Method>]> = Arc::from(vec![m]);
        let aggregate = register(&heap, list.into_cached());

        // The list holds the member; once the list goes the member follows.
        assert_eq!(heap.collect(), 2);
        assert!(!heap.is_live(member));
        assert!(!heap.is_live(aggregate));
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let heap = SoftHeap::new();
        let old = register(&heap, method("old").into_cached());
        heap.collect();
        let fresh_method = method("fresh");
        let fresh = register(&heap, fresh_method.clone().into_cached());

        assert_ne!(old, fresh);
        assert!(heap.get(old).is_none());
        assert!(heap.get(fresh).is_some());
    }
}
