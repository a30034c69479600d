#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity contiguous store that constructs its elements through a pluggable allocation
//! strategy and leaves nothing behind when construction fails.
//!
//! This package provides [`BoundedStore`], a container that owns exactly one block of memory sized
//! for exactly as many elements as it holds. There is no spare capacity: the length is fixed at
//! construction and every [`resize()`][BoundedStore::resize] builds a complete new block.
//!
//! The memory and the per-element construction and destruction are provided by an
//! [`AllocationStrategy`]. Three strategies are included:
//!
//! * [`Global`] - the global Rust memory allocator. This is the default.
//! * [`Tracked`] - counts every reservation, release, construction and destruction made through
//!   the strategy it wraps, reporting them as a [`StrategyReport`].
//! * [`Budgeted`] - refuses reservations that would exceed a fixed byte budget.
//!
//! # Failure handling
//!
//! Elements are constructed one at a time in index order. If constructing any element fails,
//! whether by returning an error or by panicking, every element constructed so far is destroyed
//! in reverse order, the block is released and the original failure reaches the caller unchanged.
//! Operations that replace the contents of an existing store only swap in the replacement once it
//! is complete, so the store is left untouched on failure.
//!
//! # Examples
//!
//! ```
//! use bounded_store::BoundedStore;
//!
//! let mut store = BoundedStore::<String>::with_len(3).unwrap();
//! store[1].push_str("middle");
//!
//! assert_eq!(store.len(), 3);
//! assert_eq!(store.as_slice(), &["", "middle", ""]);
//!
//! // Resizing always builds a brand new block of default-constructed elements.
//! store.resize(2).unwrap();
//! assert_eq!(store.as_slice(), &["", ""]);
//! ```
//!
//! Fallible construction returns the initializer's own error:
//!
//! ```
//! use bounded_store::{AllocationFailure, BoundedStore};
//!
//! #[derive(Debug)]
//! enum LoadError {
//!     Allocation(AllocationFailure),
//!     Parse(std::num::ParseIntError),
//! }
//!
//! impl From<AllocationFailure> for LoadError {
//!     fn from(value: AllocationFailure) -> Self {
//!         Self::Allocation(value)
//!     }
//! }
//!
//! let inputs = ["1", "2", "three"];
//!
//! let result = BoundedStore::<u32>::try_from_fn(inputs.len(), |index| {
//!     inputs[index].parse::<u32>().map_err(LoadError::Parse)
//! });
//!
//! assert!(matches!(result, Err(LoadError::Parse(_))));
//! ```

mod bounded_store;
mod budgeted;
mod builder;
mod drop_policy;
mod error;
mod partial_block;
mod strategy;
mod tracked;

pub use bounded_store::BoundedStore;
pub use budgeted::Budgeted;
pub use builder::*;
pub use drop_policy::*;
pub use error::*;
pub(crate) use partial_block::*;
pub use strategy::{AllocationStrategy, Global};
pub use tracked::{StrategyReport, Tracked};
