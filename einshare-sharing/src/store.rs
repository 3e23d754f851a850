//! Reference-counted storage of cached values.

use std::{any::Any, collections::HashMap, sync::Arc};

use einshare_basic::id::IdentityToken;

/// A stored value of any representation type.
pub type SharedValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug)]
struct Entry {
    value: SharedValue,
    refcount: usize,
}

/// Values by token, each retained while its reference count is positive.
#[derive(Debug, Default)]
pub struct ResultStore {
    entries: HashMap<IdentityToken, Entry>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: IdentityToken) -> Option<&SharedValue> {
        self.entries.get(&token).map(|e| &e.value)
    }

    /// Stores `value` under `token` with a reference count of one. An existing entry is left as is.
    pub fn put(&mut self, token: IdentityToken, value: SharedValue) {
        self.entries
            .entry(token)
            .or_insert(Entry { value, refcount: 1 });
    }

    /// Returns false if `token` is not resident.
    pub fn incref(&mut self, token: IdentityToken) -> bool {
        match self.entries.get_mut(&token) {
            Some(e) => {
                e.refcount += 1;
                true
            }
            None => false,
        }
    }

    /// Decrements the reference count, evicting the value at zero. Returns the evicted value.
    pub fn decref(&mut self, token: IdentityToken) -> Option<SharedValue> {
        let e = self.entries.get_mut(&token)?;
        e.refcount = e.refcount.saturating_sub(1);
        if e.refcount == 0 {
            self.entries.remove(&token).map(|e| e.value)
        } else {
            None
        }
    }

    pub fn refcount(&self, token: IdentityToken) -> usize {
        self.entries.get(&token).map_or(0, |e| e.refcount)
    }

    pub fn contains(&self, token: IdentityToken) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
