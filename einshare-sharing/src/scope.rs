//! Thread-local stack of sharing scopes.
//!
//! While the stack is empty, primitive steps are computed directly. Otherwise the innermost frame names the cache they go through and the owner their results are acquired for.
//!
//! Frames are pushed and popped through [`SharingScope`] (or [`shared_intermediates`]), so a scope is closed on every exit path, unwinding included.

use std::{cell::RefCell, marker::PhantomData};

use thiserror::Error;

use crate::cache::{OwnerId, SharingCache};

/// What a scope entered inside another scope does when no cache is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NestingPolicy {
    /// Reuse the enclosing cache. Results stay owned by the enclosing scope.
    #[default]
    Borrow,
    /// Start from a fresh cache owned by the new scope.
    Independent,
}

/// Options of a sharing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScopeOptions {
    pub nesting: NestingPolicy,
}

impl ScopeOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn nesting(self, nesting: NestingPolicy) -> Self {
        Self { nesting }
    }
}

/// Error type of scope management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("no sharing scope is active")]
    NotActive,
}

#[derive(Debug)]
enum Frame {
    Owned { cache: SharingCache, owner: OwnerId },
    // acquisitions are recorded against the enclosing owner
    Borrowed { cache: SharingCache, owner: OwnerId },
}

impl Frame {
    fn cache(&self) -> &SharingCache {
        match self {
            Frame::Owned { cache, .. } | Frame::Borrowed { cache, .. } => cache,
        }
    }
    fn owner(&self) -> OwnerId {
        match self {
            Frame::Owned { owner, .. } | Frame::Borrowed { owner, .. } => *owner,
        }
    }
}

thread_local! {
    static SHARING_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pushes a frame and returns the cache it uses.
///
/// With an explicit `cache`, the new frame owns its acquisitions on it. Without one, a fresh cache is used at the outermost level; inside another scope `options.nesting` decides.
pub fn enter_scope(cache: Option<SharingCache>, options: ScopeOptions) -> SharingCache {
    SHARING_STACK.with_borrow_mut(|stack| {
        let frame = match (cache, stack.last()) {
            (Some(cache), _) => Frame::Owned {
                cache,
                owner: OwnerId::next(),
            },
            (None, Some(outer)) if options.nesting == NestingPolicy::Borrow => Frame::Borrowed {
                cache: outer.cache().clone(),
                owner: outer.owner(),
            },
            (None, _) => Frame::Owned {
                cache: SharingCache::new(),
                owner: OwnerId::next(),
            },
        };
        let cache = frame.cache().clone();
        stack.push(frame);
        tracing::debug!(
            depth = stack.len(),
            borrowed = matches!(stack.last(), Some(Frame::Borrowed { .. })),
            "entered sharing scope"
        );
        cache
    })
}

/// Pops the innermost frame, releasing what it owns.
pub fn exit_scope() -> Result<(), ScopeError> {
    let (frame, depth) = SHARING_STACK.with_borrow_mut(|stack| {
        let depth = stack.len();
        stack.pop().map(|f| (f, depth))
    })
    .ok_or(ScopeError::NotActive)?;
    match frame {
        Frame::Owned { cache, owner } => {
            let evicted = cache.release(owner);
            tracing::debug!(depth, evicted, "exited sharing scope");
        }
        Frame::Borrowed { .. } => {
            tracing::debug!(depth, "exited borrowed sharing scope");
        }
    }
    Ok(())
}

/// Number of active frames on this thread.
pub fn depth() -> usize {
    SHARING_STACK.with_borrow(|stack| stack.len())
}

pub fn is_active() -> bool {
    depth() > 0
}

/// The innermost cache, if any.
pub fn current_cache() -> Option<SharingCache> {
    SHARING_STACK.with_borrow(|stack| stack.last().map(|f| f.cache().clone()))
}

pub(crate) fn current() -> Option<(SharingCache, OwnerId)> {
    SHARING_STACK.with_borrow(|stack| stack.last().map(|f| (f.cache().clone(), f.owner())))
}

/// Guard of a sharing scope. The scope is exited when the guard is dropped.
///
/// Guards are tied to the thread that created them and must be dropped innermost first.
#[derive(Debug)]
pub struct SharingScope {
    cache: SharingCache,
    depth: usize,
    _thread: PhantomData<*const ()>,
}

impl SharingScope {
    /// Enters a scope with default options.
    pub fn enter() -> Self {
        Self::enter_with(None, ScopeOptions::default())
    }
    pub fn enter_with(cache: Option<SharingCache>, options: ScopeOptions) -> Self {
        let cache = enter_scope(cache, options);
        Self {
            cache,
            depth: depth(),
            _thread: PhantomData,
        }
    }
    pub fn cache(&self) -> &SharingCache {
        &self.cache
    }
}

impl Drop for SharingScope {
    fn drop(&mut self) {
        let current = depth();
        if current != self.depth {
            tracing::error!(
                expected = self.depth,
                found = current,
                "sharing scope guard dropped out of order"
            );
        }
        while depth() >= self.depth {
            if exit_scope().is_err() {
                break;
            }
        }
    }
}

/// Runs `f` inside a sharing scope with default options.
pub fn shared_intermediates<T>(f: impl FnOnce(&SharingCache) -> T) -> T {
    shared_intermediates_with(None, ScopeOptions::default(), f)
}

/// Runs `f` inside a sharing scope over `cache` (or per `options` when none is given).
pub fn shared_intermediates_with<T>(
    cache: Option<SharingCache>,
    options: ScopeOptions,
    f: impl FnOnce(&SharingCache) -> T,
) -> T {
    let scope = SharingScope::enter_with(cache, options);
    f(scope.cache())
}
