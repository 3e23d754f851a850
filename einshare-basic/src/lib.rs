//! Basic implementors for einshare: identity tokens and the handles carrying them.

#![no_std]
extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod id;
