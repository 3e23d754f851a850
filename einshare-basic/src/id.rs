use core::{fmt, ops::Deref};

use alloc::sync::Arc;
use uuid::Uuid;

/// Identity of one array object.
///
/// Tokens are compared by identity of the object they were minted for, never by the array contents: two arrays holding equal values still get distinct tokens.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IdentityToken {
    id: Uuid,
}
impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
impl Default for IdentityToken {
    fn default() -> Self {
        Self::mint()
    }
}

impl IdentityToken {
    /// Mints a token that was never issued before.
    pub fn mint() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

/// An array value together with its identity.
///
/// Clones share both the value and the token: they are the same object. `SharedArray::new` on an equal value is a different object.
#[derive(Debug)]
pub struct SharedArray<R> {
    token: IdentityToken,
    value: Arc<R>,
}

impl<R> Clone for SharedArray<R> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            value: self.value.clone(),
        }
    }
}

impl<R> SharedArray<R> {
    /// Wraps a value as a new object.
    pub fn new(value: R) -> Self {
        Self::from_arc(Arc::new(value))
    }
    // a fresh token over `value`; never handed out publicly, as wrapping an `Arc` that
    // another handle holds would give one value two identities
    fn from_arc(value: Arc<R>) -> Self {
        Self {
            token: IdentityToken::mint(),
            value,
        }
    }
    /// Reassembles a handle from its parts.
    ///
    /// # Safety
    ///
    /// the caller must ensure `token` was minted for `value`, i.e. it comes from `into_raw` of a handle to the same object.
    pub unsafe fn from_raw_unchecked(token: IdentityToken, value: Arc<R>) -> Self {
        Self { token, value }
    }
    /// Decomposes the handle into its parts.
    pub fn into_raw(self) -> (IdentityToken, Arc<R>) {
        (self.token, self.value)
    }

    pub fn token(&self) -> IdentityToken {
        self.token
    }
    pub fn value(&self) -> &R {
        &self.value
    }
    pub fn arc(&self) -> &Arc<R> {
        &self.value
    }
    /// A shared operand for this object.
    pub fn to_operand(&self) -> Operand<'_, R> {
        Operand::Shared(self.clone())
    }
    /// Whether both handles denote the same object.
    pub fn same_object(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl<R> Deref for SharedArray<R> {
    type Target = R;
    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// An operand handed to the evaluator.
///
/// Only `Shared` operands have an identity. `Borrowed` operands can be evaluated but never take part in sharing.
#[derive(Debug)]
pub enum Operand<'a, R> {
    Shared(SharedArray<R>),
    Borrowed(&'a R),
}

impl<R> Clone for Operand<'_, R> {
    fn clone(&self) -> Self {
        match self {
            Operand::Shared(s) => Operand::Shared(s.clone()),
            Operand::Borrowed(r) => Operand::Borrowed(r),
        }
    }
}

impl<'a, R> Operand<'a, R> {
    pub fn repr(&self) -> &R {
        match self {
            Operand::Shared(s) => s.value(),
            Operand::Borrowed(r) => r,
        }
    }
    /// Identity of the operand, if it has one.
    pub fn token(&self) -> Option<IdentityToken> {
        match self {
            Operand::Shared(s) => Some(s.token()),
            Operand::Borrowed(_) => None,
        }
    }
    pub fn shared(&self) -> Option<&SharedArray<R>> {
        match self {
            Operand::Shared(s) => Some(s),
            Operand::Borrowed(_) => None,
        }
    }
}

impl<R> From<SharedArray<R>> for Operand<'_, R> {
    fn from(s: SharedArray<R>) -> Self {
        Operand::Shared(s)
    }
}
impl<R> From<&SharedArray<R>> for Operand<'_, R> {
    fn from(s: &SharedArray<R>) -> Self {
        Operand::Shared(s.clone())
    }
}
impl<'a, R> From<&'a R> for Operand<'a, R> {
    fn from(r: &'a R) -> Self {
        Operand::Borrowed(r)
    }
}
