use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{self, AtomicUsize};

use crate::{AllocationFailure, AllocationStrategy, Global};

/// Wraps another [`AllocationStrategy`] and counts every operation forwarded to it.
///
/// Clones share their counters, so a store built with a clone of a `Tracked` can be observed
/// through the original. Only successful operations are counted: a failed reservation or a
/// construction whose initializer failed leaves the counters untouched.
///
/// # Examples
///
/// ```
/// use bounded_store::{BoundedStore, Global, Tracked};
///
/// let tracked = Tracked::new(Global);
///
/// {
///     let store = BoundedStore::<u32, _>::with_len_in(3, tracked.clone()).unwrap();
///     assert_eq!(store.len(), 3);
///     assert_eq!(tracked.report().live_elements(), 3);
/// }
///
/// let report = tracked.report();
/// assert_eq!(report.live_elements(), 0);
/// assert_eq!(report.outstanding_blocks(), 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Tracked<S = Global> {
    inner: S,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    reservations: AtomicUsize,
    reserved_elements: AtomicUsize,
    releases: AtomicUsize,
    released_elements: AtomicUsize,
    constructions: AtomicUsize,
    destructions: AtomicUsize,
}

impl<S> Tracked<S> {
    /// Wraps `inner`, starting with all counters at zero.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            counters: Arc::new(Counters::default()),
        }
    }

    /// The wrapped strategy.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Takes a snapshot of the counters.
    #[must_use]
    pub fn report(&self) -> StrategyReport {
        // Relaxed is sufficient: the store is single-threaded and we only need atomicity.
        let load = |counter: &AtomicUsize| counter.load(atomic::Ordering::Relaxed);

        StrategyReport {
            reservations: load(&self.counters.reservations),
            reserved_elements: load(&self.counters.reserved_elements),
            releases: load(&self.counters.releases),
            released_elements: load(&self.counters.released_elements),
            constructions: load(&self.counters.constructions),
            destructions: load(&self.counters.destructions),
        }
    }
}

fn increment(counter: &AtomicUsize, amount: usize) {
    counter.fetch_add(amount, atomic::Ordering::Relaxed);
}

// SAFETY: Every operation is forwarded to the inner strategy unchanged, so its guarantees hold.
unsafe impl<S: AllocationStrategy> AllocationStrategy for Tracked<S> {
    fn reserve<T>(&self, count: usize) -> Result<NonNull<T>, AllocationFailure> {
        let block = self.inner.reserve(count)?;

        increment(&self.counters.reservations, 1);
        increment(&self.counters.reserved_elements, count);

        Ok(block)
    }

    unsafe fn release<T>(&self, block: NonNull<T>, count: usize) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.inner.release(block, count);
        }

        increment(&self.counters.releases, 1);
        increment(&self.counters.released_elements, count);
    }

    unsafe fn construct_at<T, E, F>(&self, slot: NonNull<T>, init: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe { self.inner.construct_at(slot, init) }?;

        increment(&self.counters.constructions, 1);

        Ok(())
    }

    unsafe fn destroy_at<T>(&self, slot: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            self.inner.destroy_at(slot);
        }

        increment(&self.counters.destructions, 1);
    }
}

/// A snapshot of the counters of a [`Tracked`] strategy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct StrategyReport {
    /// Number of successful block reservations.
    pub reservations: usize,

    /// Sum of the element counts of all successful reservations.
    pub reserved_elements: usize,

    /// Number of block releases.
    pub releases: usize,

    /// Sum of the element counts of all releases.
    pub released_elements: usize,

    /// Number of elements constructed successfully.
    pub constructions: usize,

    /// Number of elements destroyed.
    pub destructions: usize,
}

impl StrategyReport {
    /// Elements constructed and not yet destroyed.
    #[must_use]
    pub fn live_elements(&self) -> usize {
        self.constructions.saturating_sub(self.destructions)
    }

    /// Blocks reserved and not yet released.
    #[must_use]
    pub fn outstanding_blocks(&self) -> usize {
        self.reservations.saturating_sub(self.releases)
    }

    /// Whether no operation at all has been recorded.
    #[must_use]
    pub fn is_untouched(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Tracked: Send, Sync, Clone, Default);
    assert_impl_all!(StrategyReport: Send, Sync, Copy);

    #[test]
    fn starts_untouched() {
        let tracked = Tracked::new(Global);
        assert!(tracked.report().is_untouched());
    }

    #[test]
    fn counts_successful_operations() {
        let tracked = Tracked::new(Global);

        let block = tracked.reserve::<u16>(4).unwrap();

        // SAFETY: The slot is reserved and not yet live.
        unsafe { tracked.construct_at(block, || Ok::<_, ()>(7_u16)) }.unwrap();

        let report = tracked.report();
        assert_eq!(report.reservations, 1);
        assert_eq!(report.reserved_elements, 4);
        assert_eq!(report.constructions, 1);
        assert_eq!(report.live_elements(), 1);
        assert_eq!(report.outstanding_blocks(), 1);

        // SAFETY: The slot holds the element we just constructed.
        unsafe {
            tracked.destroy_at(block);
        }

        // SAFETY: Matches the reservation above and the only element was destroyed.
        unsafe {
            tracked.release(block, 4);
        }

        let report = tracked.report();
        assert_eq!(report.releases, 1);
        assert_eq!(report.released_elements, 4);
        assert_eq!(report.destructions, 1);
        assert_eq!(report.live_elements(), 0);
        assert_eq!(report.outstanding_blocks(), 0);
    }

    #[test]
    fn failed_operations_are_not_counted() {
        let tracked = Tracked::new(Global);

        _ = tracked.reserve::<u64>(usize::MAX).unwrap_err();

        let block = tracked.reserve::<u64>(1).unwrap();

        // SAFETY: The slot is reserved and not yet live.
        let result = unsafe { tracked.construct_at(block, || Err::<u64, _>(42)) };
        assert_eq!(result, Err(42));

        // SAFETY: Matches the reservation above, nothing was constructed.
        unsafe {
            tracked.release(block, 1);
        }

        let report = tracked.report();
        assert_eq!(report.reservations, 1);
        assert_eq!(report.constructions, 0);
        assert_eq!(report.releases, 1);
    }

    #[test]
    fn clones_share_counters() {
        let tracked = Tracked::new(Global);
        let clone = tracked.clone();

        let block = clone.reserve::<u8>(2).unwrap();

        assert_eq!(tracked.report().reservations, 1);

        // SAFETY: A block may be released through any clone of the strategy that reserved it.
        unsafe {
            tracked.release(block, 2);
        }

        assert_eq!(clone.report().outstanding_blocks(), 0);
    }
}
