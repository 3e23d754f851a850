//! Provide pluggable way to implement the numeric primitives.
//!
//! A contraction expression is evaluated as a sequence of two primitives:
//!
//! - pairwise contraction: `a, b -> c`, summing every label missing from the output
//! - reduction: `a -> c`, summing every label missing from the output and permuting the rest
//!
//! A backend implements both for its tensor representation. Backends are values (usually a fieldless enum) selected at runtime; their `name()` takes part in every cache key, so results computed by different backends are never mixed.

use crate::{
    repr::TensorRepr,
    subscripts::{PairSpec, ReduceSpec},
};

/// A numeric backend for the representation `R`.
pub trait Backend<R: TensorRepr> {
    /// The type of the error returned by the primitives. (considered as internal error)
    type Err;
    /// Stable name of the backend, e.g. `"dot"`.
    fn name(&self) -> &str;
}

/// Raw context of pairwise contraction.
///
/// # Safety
///
/// The implementor MUST ensure that the result has exactly the axes listed in `spec.out`, in that order.
pub unsafe trait ContractCtxImpl<R: TensorRepr>: Backend<R> {
    /// Contracts `lhs` and `rhs` as described by `spec`.
    ///
    /// # Safety
    ///
    /// the caller must ensure `spec.lhs` and `spec.rhs` have one label per axis of `lhs` and `rhs`, and that shared labels have equal sizes.
    unsafe fn contract_unchecked(&self, lhs: &R, rhs: &R, spec: &PairSpec) -> Result<R, Self::Err>;
}

/// Safe version of `ContractCtxImpl`.
///
/// The blanket implementation checks the number of axes.
pub trait ContractCtx<R: TensorRepr>: ContractCtxImpl<R> {
    /// Safe version of contract_unchecked.
    fn contract(&self, lhs: &R, rhs: &R, spec: &PairSpec) -> Result<R, Self::Err>;
}
impl<C: ContractCtxImpl<R>, R: TensorRepr> ContractCtx<R> for C {
    fn contract(&self, lhs: &R, rhs: &R, spec: &PairSpec) -> Result<R, Self::Err> {
        if spec.lhs.len() != lhs.naxes() || spec.rhs.len() != rhs.naxes() {
            panic!("pair spec {} must match the number of axes of lhs and rhs", spec);
        }
        unsafe { self.contract_unchecked(lhs, rhs, spec) }
    }
}

/// Raw context of reduction.
///
/// # Safety
///
/// The implementor MUST ensure that the result has exactly the axes listed in `spec.out`, in that order.
pub unsafe trait ReduceCtxImpl<R: TensorRepr>: Backend<R> {
    /// Reduces `a` as described by `spec`.
    ///
    /// # Safety
    ///
    /// the caller must ensure `spec.input` has one label per axis of `a`.
    unsafe fn reduce_unchecked(&self, a: &R, spec: &ReduceSpec) -> Result<R, Self::Err>;
}

/// Safe version of `ReduceCtxImpl`.
///
/// The blanket implementation checks the number of axes.
pub trait ReduceCtx<R: TensorRepr>: ReduceCtxImpl<R> {
    /// Safe version of reduce_unchecked.
    fn reduce(&self, a: &R, spec: &ReduceSpec) -> Result<R, Self::Err>;
}
impl<C: ReduceCtxImpl<R>, R: TensorRepr> ReduceCtx<R> for C {
    fn reduce(&self, a: &R, spec: &ReduceSpec) -> Result<R, Self::Err> {
        if spec.input.len() != a.naxes() {
            panic!("reduce spec {} must match the number of axes of the operand", spec);
        }
        unsafe { self.reduce_unchecked(a, spec) }
    }
}
