//! The sharing cache: key mapping, result store, registry and per-owner ledger behind one lock.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use einshare_basic::id::IdentityToken;

use crate::{
    key::{CacheKey, OpKind},
    registry::FingerprintRegistry,
    store::{ResultStore, SharedValue},
};

/// Identity of an owning scope frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(u64);

impl OwnerId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        OwnerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
pub(crate) struct CacheInner {
    entries: HashMap<CacheKey, IdentityToken>,
    store: ResultStore,
    registry: FingerprintRegistry,
    owners: HashMap<OwnerId, HashSet<IdentityToken>>,
}

impl CacheInner {
    /// On hit, acquires the value for `owner`.
    pub(crate) fn lookup(
        &mut self,
        owner: OwnerId,
        key: &CacheKey,
    ) -> Option<(IdentityToken, SharedValue)> {
        let token = *self.entries.get(key)?;
        let value = self.store.get(token)?.clone();
        self.acquire(owner, token);
        Some((token, value))
    }

    /// Stores a freshly computed value under `key`, owned by `owner`.
    pub(crate) fn insert(
        &mut self,
        owner: OwnerId,
        key: CacheKey,
        token: IdentityToken,
        value: SharedValue,
    ) {
        if self.store.contains(token) {
            self.acquire(owner, token);
        } else {
            self.store.put(token, value);
            self.owners.entry(owner).or_default().insert(token);
        }
        self.entries.insert(key, token);
    }

    /// Keeps an operand alive for `owner`, registering it as a base array the first time it is seen.
    pub(crate) fn register_operand(
        &mut self,
        owner: OwnerId,
        token: IdentityToken,
        value: SharedValue,
    ) {
        if self.store.contains(token) {
            self.acquire(owner, token);
            return;
        }
        if self.registry.register(token) {
            tracing::trace!("registered base array {}", token);
        }
        self.insert(owner, CacheKey::array(token), token, value);
    }

    fn acquire(&mut self, owner: OwnerId, token: IdentityToken) {
        if self.owners.entry(owner).or_default().insert(token) {
            self.store.incref(token);
        }
    }

    /// Releases everything `owner` acquired. Returns the number of evicted values.
    pub(crate) fn release(&mut self, owner: OwnerId) -> usize {
        let Some(tokens) = self.owners.remove(&owner) else {
            return 0;
        };
        let mut evicted = 0;
        for token in tokens {
            if self.store.decref(token).is_some() {
                self.entries.retain(|_, t| *t != token);
                self.registry.forget(token);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Handle to a sharing cache.
///
/// Clones refer to the same cache. The handle is `Send + Sync`, so one cache can be entered from several threads.
#[derive(Clone, Default)]
pub struct SharingCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl SharingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // entries are only ever added after a successful computation, so a poisoned cache is still consistent
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of distinct keys, base arrays included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached primitive steps, base arrays excluded.
    pub fn count_cached_ops(&self) -> usize {
        self.lock()
            .entries
            .keys()
            .filter(|k| k.kind() != OpKind::Array)
            .count()
    }

    /// Number of cached base arrays.
    pub fn count_arrays(&self) -> usize {
        self.lock().registry.len()
    }

    /// Whether the value of `token` is currently retained.
    pub fn contains_result(&self, token: IdentityToken) -> bool {
        self.lock().store.contains(token)
    }

    /// Number of retained values.
    pub fn resident(&self) -> usize {
        self.lock().store.len()
    }

    /// Whether both handles refer to the same cache.
    pub fn same_cache(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn release(&self, owner: OwnerId) -> usize {
        self.lock().release(owner)
    }
}

impl fmt::Debug for SharingCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("SharingCache")
            .field("keys", &inner.entries.len())
            .field("resident", &inner.store.len())
            .finish()
    }
}
