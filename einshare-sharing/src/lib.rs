//! Scoped sharing of intermediate results.
//!
//! Inside a sharing scope, every primitive step is looked up by a structural key before it is computed, so repeated or partially overlapping contractions reuse each other's intermediates. Results are reference counted by the scopes that acquired them and evicted once the last owner exits.
//!
//! ```ignore
//! shared_intermediates(|cache| {
//!     contract("ab,bc->ac", &[x.to_operand(), y.to_operand()], &backend)?;
//!     contract("ab,bc->ca", &[x.to_operand(), y.to_operand()], &backend)?;
//!     println!("{} cached steps", cache.count_cached_ops());
//! })
//! ```

pub mod cache;
pub mod eval;
pub mod key;
pub mod registry;
pub mod scope;
pub mod store;

pub mod prelude {
    //! Commonly used items.

    pub use crate::cache::SharingCache;
    pub use crate::eval::{ShareError, cached_contract, cached_reduce};
    pub use crate::registry::IdentityError;
    pub use crate::scope::{
        NestingPolicy, ScopeError, ScopeOptions, SharingScope, enter_scope, exit_scope,
        shared_intermediates, shared_intermediates_with,
    };
}
