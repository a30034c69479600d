use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicUsize};

use crate::strategy::block_layout;
use crate::{AllocationFailure, AllocationStrategy, Global};

/// Wraps another [`AllocationStrategy`] and caps the number of bytes that may be reserved
/// through it at any one time.
///
/// A reservation that would push the bytes currently reserved beyond the budget fails with
/// [`AllocationFailure::BudgetExceeded`] without reaching the inner strategy. Releasing a block
/// returns its bytes to the budget. Clones share the same budget.
///
/// # Examples
///
/// ```
/// use bounded_store::{AllocationFailure, BoundedStore, Budgeted};
///
/// let budget = Budgeted::with_limit(64);
///
/// let store = BoundedStore::<u64, _>::with_len_in(8, budget.clone()).unwrap();
/// assert_eq!(budget.available_bytes(), 0);
///
/// let refused = BoundedStore::<u64, _>::with_len_in(1, budget.clone());
/// assert!(matches!(
///     refused,
///     Err(AllocationFailure::BudgetExceeded { .. })
/// ));
///
/// drop(store);
/// assert_eq!(budget.available_bytes(), 64);
/// ```
#[derive(Clone, Debug)]
pub struct Budgeted<S = Global> {
    inner: S,
    budget: Arc<Budget>,
}

#[derive(Debug)]
struct Budget {
    limit: usize,
    reserved: AtomicUsize,
}

impl Budgeted<Global> {
    /// Creates a budget of `limit` bytes on top of the global memory allocator.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self::new(Global, limit)
    }
}

impl<S> Budgeted<S> {
    /// Wraps `inner` with a budget of `limit` bytes.
    #[must_use]
    pub fn new(inner: S, limit: usize) -> Self {
        Self {
            inner,
            budget: Arc::new(Budget {
                limit,
                reserved: AtomicUsize::new(0),
            }),
        }
    }

    /// The wrapped strategy.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// The total budget, in bytes.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.budget.limit
    }

    /// Bytes currently reserved through this budget.
    #[must_use]
    pub fn reserved_bytes(&self) -> usize {
        self.budget.reserved.load(atomic::Ordering::Relaxed)
    }

    /// Bytes that can still be reserved.
    #[must_use]
    pub fn available_bytes(&self) -> usize {
        self.budget.limit.saturating_sub(self.reserved_bytes())
    }
}

// SAFETY: Blocks are only ever provided by the inner strategy; the budget merely refuses some
// requests before they reach it.
unsafe impl<S: AllocationStrategy> AllocationStrategy for Budgeted<S> {
    fn reserve<T>(&self, count: usize) -> Result<NonNull<T>, AllocationFailure> {
        let bytes = block_layout::<T>(count)?.size();
        let limit = self.budget.limit;

        self.budget
            .reserved
            .fetch_update(
                atomic::Ordering::Relaxed,
                atomic::Ordering::Relaxed,
                |current| {
                    current
                        .checked_add(bytes)
                        .filter(|&total| total <= limit)
                },
            )
            .map_err(|current| AllocationFailure::BudgetExceeded {
                requested: bytes,
                available: limit.saturating_sub(current),
            })?;

        self.inner.reserve(count).inspect_err(|_| {
            // The inner strategy failed, so the bytes were never actually taken.
            self.budget
                .reserved
                .fetch_sub(bytes, atomic::Ordering::Relaxed);
        })
    }

    unsafe fn release<T>(&self, block: NonNull<T>, count: usize) {
        let bytes = block_layout::<T>(count)
            .expect("the same layout was valid when the block was reserved")
            .size();

        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.inner.release(block, count);
        }

        self.budget
            .reserved
            .fetch_sub(bytes, atomic::Ordering::Relaxed);
    }

    unsafe fn construct_at<T, E, F>(&self, slot: NonNull<T>, init: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { self.inner.construct_at(slot, init) }
    }

    unsafe fn destroy_at<T>(&self, slot: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.inner.destroy_at(slot);
        }
    }
}
