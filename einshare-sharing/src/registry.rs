//! Identity of operands.

use std::collections::HashSet;

use einshare_basic::id::{IdentityToken, Operand};
use thiserror::Error;

/// Error type of identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("operand has no stable identity inside a sharing scope, wrap it in a SharedArray")]
    Unstable,
}

/// Resolves the token of an operand.
///
/// Only shared handles have an identity; borrowed operands fail with `IdentityError::Unstable`.
pub fn identify<R>(operand: &Operand<'_, R>) -> Result<IdentityToken, IdentityError> {
    operand.token().ok_or(IdentityError::Unstable)
}

/// Base arrays known to one cache.
#[derive(Debug, Default)]
pub struct FingerprintRegistry {
    bases: HashSet<IdentityToken>,
}

impl FingerprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Records `token` as a base array. Returns true the first time.
    pub fn register(&mut self, token: IdentityToken) -> bool {
        self.bases.insert(token)
    }
    pub fn is_registered(&self, token: IdentityToken) -> bool {
        self.bases.contains(&token)
    }
    /// Drops `token`, returning whether it was registered.
    pub fn forget(&mut self, token: IdentityToken) -> bool {
        self.bases.remove(&token)
    }
    pub fn len(&self) -> usize {
        self.bases.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use einshare_basic::id::SharedArray;

    use super::*;

    #[test]
    fn identify_shared_and_borrowed() {
        let a = SharedArray::new(vec![1.0, 2.0]);
        let b = a.clone();
        let raw = vec![1.0, 2.0];

        let ta = identify(&a.to_operand()).unwrap();
        let tb = identify(&b.to_operand()).unwrap();
        assert_eq!(ta, tb);
        assert_eq!(
            identify(&Operand::Borrowed(&raw)),
            Err(IdentityError::Unstable)
        );
    }

    #[test]
    fn register_once() {
        let mut registry = FingerprintRegistry::new();
        let t = IdentityToken::mint();
        assert!(registry.register(t));
        assert!(!registry.register(t));
        assert!(registry.is_registered(t));
        assert_eq!(registry.len(), 1);
        assert!(registry.forget(t));
        assert!(!registry.forget(t));
        assert!(registry.is_empty());
    }
}
