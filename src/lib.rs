//! Einsum-style contraction with scoped sharing of intermediate results.
//!
//! ```ignore
//! use einshare::prelude::*;
//!
//! let x = SharedArray::new(NdDenseRepr::random_using([5, 4], &mut rng));
//! let y = SharedArray::new(NdDenseRepr::random_using([4, 3], &mut rng));
//! shared_intermediates(|cache| {
//!     let a = contract("ab,bc->ac", &[x.to_operand(), y.to_operand()], &NdBackend::Dot)?;
//!     // served from the cache
//!     let b = contract("ij,jk->ik", &[x.to_operand(), y.to_operand()], &NdBackend::Dot)?;
//!     assert!(a.same_object(&b));
//!     Ok(())
//! })
//! ```

/// top-level contraction over planned paths
pub mod contract;

/// core traits: representations, backends, subscripts and paths
pub use einshare_core;

/// identity tokens and shared handles
pub use einshare_basic;

/// the sharing cache and its scopes
pub use einshare_sharing;

/// dense arrays and numeric backends implemented with ndarray
pub use einshare_ndarray;

pub mod prelude {
    //! A prelude module re-exporting commonly used items.

    pub use crate::contract::*;
    pub use einshare_basic::id::*;
    pub use einshare_core::prelude::*;
    pub use einshare_ndarray::{NdBackend, NdDenseRepr};
    pub use einshare_sharing::prelude::*;
}
