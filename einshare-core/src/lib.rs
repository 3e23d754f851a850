//! Core crate of einshare.

#![warn(missing_docs)]
#![allow(clippy::type_complexity)]
#![no_std]
extern crate alloc;
#[cfg(test)]
extern crate std;

// core concepts

pub mod repr;

pub mod backend;

// expression handling
// they live in the core crate because both the sharing layer (cache keys) and the backends (pairwise specs) speak in labels

pub mod subscripts;

pub mod path;

pub mod prelude {
    //! A prelude module re-exporting commonly used items.

    pub use crate::backend::*;
    pub use crate::path::*;
    pub use crate::repr::*;
    pub use crate::subscripts::*;
}
