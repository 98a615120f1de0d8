//! Any-Cache
//!
//! A bounded, type-erased, reference-counted associative cache keyed by a
//! 64-bit key. Entries carry a cost; the cache tracks `consumed = Σ cost`
//! against a budget and evicts least-recently-used entries whose reference
//! count reached zero when an insertion would overflow the budget.
//!
//! All public methods are thread-safe. Eviction callbacks run with no cache
//! lock held, so a callback may call back into the cache freely.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};

/// Cache key type. Callers define the key scheme (asset keys, resource ids).
pub type CacheKey = u64;

type ErasedValue = Arc<dyn Any + Send + Sync>;
type EvictionCallback = Arc<dyn Fn(CacheKey, TypeId) + Send + Sync>;

struct Entry {
    value: ErasedValue,
    type_id: TypeId,
    ref_count: u32,
    cost: u64,
    /// Monotonic use tick; smallest tick among zero-ref entries is the LRU
    /// eviction victim.
    last_use: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: FxHashMap<CacheKey, Entry>,
    consumed: u64,
    tick: u64,
}

impl CacheInner {
    fn touch_entry(&mut self, key: CacheKey) {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_use = tick;
        }
    }
}

type CallbackList = Arc<Mutex<Vec<(u64, EvictionCallback)>>>;

/// Bounded, type-erased, reference-counted cache.
pub struct AnyCache {
    budget: u64,
    inner: Mutex<CacheInner>,
    callbacks: CallbackList,
    next_callback_id: AtomicU64,
}

impl AnyCache {
    /// Creates a cache with the given cost budget.
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            inner: Mutex::new(CacheInner::default()),
            callbacks: Arc::new(Mutex::new(Vec::new())),
            next_callback_id: AtomicU64::new(1),
        }
    }

    /// Cost budget this cache enforces.
    #[inline]
    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Current total cost of stored entries.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.inner.lock().consumed
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Inserts `value` under `key` with unit cost, taking an initial
    /// reference. See [`store_with_cost`](Self::store_with_cost).
    pub fn store<T: Any + Send + Sync>(&self, key: CacheKey, value: T) -> Result<()> {
        self.store_with_cost(key, value, 1)
    }

    /// Inserts `value` under `key`, taking an initial reference. When the
    /// insertion would exceed the budget, zero-reference entries are evicted
    /// in LRU order until it fits; if that is not enough the insertion is
    /// rejected and the cache is left unchanged.
    pub fn store_with_cost<T: Any + Send + Sync>(
        &self,
        key: CacheKey,
        value: T,
        cost: u64,
    ) -> Result<()> {
        let evicted = {
            let mut inner = self.inner.lock();

            // Replacing an existing key frees its cost first.
            let existing_cost = inner.entries.get(&key).map_or(0, |e| e.cost);
            let needed = cost.saturating_sub(existing_cost);

            let mut evicted = Vec::new();
            if inner.consumed + needed > self.budget {
                let mut to_free = inner.consumed + needed - self.budget;
                while to_free > 0 {
                    let victim = inner
                        .entries
                        .iter()
                        .filter(|(k, e)| e.ref_count == 0 && **k != key)
                        .min_by_key(|(_, e)| e.last_use)
                        .map(|(k, _)| *k);
                    let Some(victim) = victim else { break };
                    let entry = inner.entries.remove(&victim).unwrap();
                    inner.consumed -= entry.cost;
                    to_free = to_free.saturating_sub(entry.cost);
                    evicted.push((victim, entry.type_id));
                }
                if inner.consumed + needed > self.budget {
                    // Roll nothing back: eviction of zero-ref entries is
                    // always legal, but the insert itself is rejected.
                    let free = self.budget - inner.consumed.min(self.budget);
                    drop(inner);
                    self.notify_evicted(&evicted);
                    return Err(EmberError::CacheBudgetExhausted { needed: cost, free });
                }
            }

            if let Some(old) = inner.entries.remove(&key) {
                inner.consumed -= old.cost;
            }
            inner.tick += 1;
            let tick = inner.tick;
            inner.entries.insert(
                key,
                Entry {
                    value: Arc::new(value),
                    type_id: TypeId::of::<T>(),
                    ref_count: 1,
                    cost,
                    last_use: tick,
                },
            );
            inner.consumed += cost;
            evicted
        };

        self.notify_evicted(&evicted);
        Ok(())
    }

    /// Takes a typed reference to the entry, incrementing its reference
    /// count. Returns `None` when the key is absent or the stored type does
    /// not match `T`.
    #[must_use]
    pub fn checkout<T: Any + Send + Sync>(&self, key: CacheKey) -> Option<Arc<T>> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(&key)?;
        if entry.type_id != TypeId::of::<T>() {
            return None;
        }
        entry.ref_count += 1;
        let value = Arc::clone(&entry.value);
        inner.touch_entry(key);
        value.downcast::<T>().ok()
    }

    /// Returns a reference taken by [`checkout`](Self::checkout) or
    /// [`touch`](Self::touch). At zero references the entry becomes eligible
    /// for eviction.
    pub fn checkin(&self, key: CacheKey) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&key) {
            if entry.ref_count == 0 {
                log::warn!("AnyCache: check-in of {key:#x} with zero references");
                return;
            }
            entry.ref_count -= 1;
        }
    }

    /// Increments the reference count without producing a handle. Used to
    /// record a dependency edge on the entry. Returns false if absent.
    pub fn touch(&self, key: CacheKey) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get_mut(&key) else {
            return false;
        };
        entry.ref_count += 1;
        inner.touch_entry(key);
        true
    }

    /// Atomically swaps the stored value, preserving the reference count and
    /// LRU position. The cost is carried over unchanged.
    pub fn replace<T: Any + Send + Sync>(&self, key: CacheKey, value: T) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = Arc::new(value);
                entry.type_id = TypeId::of::<T>();
                Ok(())
            }
            None => Err(EmberError::ResourceNotRegistered(key)),
        }
    }

    /// Forcibly evicts the entry regardless of its reference count. Returns
    /// true when an entry was removed; the eviction callback fires.
    pub fn remove(&self, key: CacheKey) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            inner.entries.remove(&key).map(|entry| {
                inner.consumed -= entry.cost;
                (key, entry.type_id)
            })
        };
        match removed {
            Some(evicted) => {
                self.notify_evicted(std::slice::from_ref(&evicted));
                true
            }
            None => false,
        }
    }

    /// Non-mutating typed read; does not touch reference counts or LRU state.
    #[must_use]
    pub fn peek<T: Any + Send + Sync>(&self, key: CacheKey) -> Option<Arc<T>> {
        let inner = self.inner.lock();
        let entry = inner.entries.get(&key)?;
        Arc::clone(&entry.value).downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains(&self, key: CacheKey) -> bool {
        self.inner.lock().entries.contains_key(&key)
    }

    /// Type id of the stored value, if present.
    #[must_use]
    pub fn get_type_id(&self, key: CacheKey) -> Option<TypeId> {
        self.inner.lock().entries.get(&key).map(|e| e.type_id)
    }

    /// Current reference count of the entry, if present.
    #[must_use]
    pub fn ref_count(&self, key: CacheKey) -> Option<u32> {
        self.inner.lock().entries.get(&key).map(|e| e.ref_count)
    }

    /// Forcibly evicts every entry. Callbacks fire once per entry.
    pub fn clear(&self) {
        let evicted: Vec<(CacheKey, TypeId)> = {
            let mut inner = self.inner.lock();
            inner.consumed = 0;
            inner.entries.drain().map(|(k, e)| (k, e.type_id)).collect()
        };
        self.notify_evicted(&evicted);
    }

    /// Registers an eviction callback. The callback fires once per evicted
    /// entry, outside the cache lock. Dropping the returned subscription
    /// unregisters it.
    #[must_use]
    pub fn on_eviction(
        &self,
        callback: impl Fn(CacheKey, TypeId) + Send + Sync + 'static,
    ) -> EvictionSubscription {
        let id = self.next_callback_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks.lock().push((id, Arc::new(callback)));
        EvictionSubscription { id, list: Arc::downgrade(&self.callbacks) }
    }

    fn notify_evicted(&self, evicted: &[(CacheKey, TypeId)]) {
        if evicted.is_empty() {
            return;
        }
        // Snapshot callbacks so none of our locks are held while user code
        // runs; a callback may re-enter the cache or drop its subscription.
        let callbacks: Vec<EvictionCallback> =
            self.callbacks.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for (key, type_id) in evicted {
            log::debug!("AnyCache: evicted {key:#x}");
            for callback in &callbacks {
                callback(*key, *type_id);
            }
        }
    }
}

/// Scope guard for an eviction callback registration; unregisters on drop.
pub struct EvictionSubscription {
    id: u64,
    list: std::sync::Weak<Mutex<Vec<(u64, EvictionCallback)>>>,
}

impl Drop for EvictionSubscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
