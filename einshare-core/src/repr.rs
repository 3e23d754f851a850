//! Tensor concept: array with axes 0-indexed with usize, only valid in the array.

use alloc::vec::Vec;

/// Minimal interface for tensor representations.
///
/// In the conceptual model, a tensor representation is a structured data object with multiple axes, each indexed from `0` up to `naxes() - 1`.
///
/// In practice, a type implementing this trait serves as a handle for resource allocation and management. The sharing layer never looks inside it: a representation is identified by the handle that owns it, not by its contents.
///
/// # Safety
///
/// The implementor MUST ensure the following invariants:
///
/// - The number of axes of the tensor representation is fixed for the same object, even through mutable operations.
/// - The "semantic order" of the axes are never changed for the same object, even through mutable operations.
///
/// `mem::{swap,replace,take,...}` syntactically violate the above conditons, but these operations semantically do not change the objects but move them.
pub unsafe trait TensorRepr: Sized {
    /// Returns the number of axes of the tensor. this number is fixed for the same object even through mutable operations.
    fn naxes(&self) -> usize;
}

/// Tensor representation providing the size of each axis, WITHOUT checking bounds.
pub trait AxisSizeReprImpl: TensorRepr {
    /// Returns the size of the given axis, WITHOUT checking bounds.
    ///
    /// # Safety
    ///
    /// the caller must ensure `i < self.naxes()`.
    unsafe fn axis_size_unchecked(&self, i: usize) -> usize;
}

/// Safe version of `AxisSizeReprImpl`.
///
/// The blanket implementation checks bounds.
pub trait AxisSizeRepr: AxisSizeReprImpl {
    /// Returns the size of the given axis, with checking bounds.
    fn axis_size(&self, i: usize) -> usize;
    /// Returns the sizes of all axes in order.
    fn shape(&self) -> Vec<usize>;
}
impl<T: AxisSizeReprImpl> AxisSizeRepr for T {
    fn axis_size(&self, i: usize) -> usize {
        if i >= self.naxes() {
            panic!("axis {} out of range for a tensor with {} axes", i, self.naxes())
        }
        unsafe { self.axis_size_unchecked(i) }
    }
    fn shape(&self) -> Vec<usize> {
        (0..self.naxes())
            .map(|i| unsafe { self.axis_size_unchecked(i) })
            .collect()
    }
}
