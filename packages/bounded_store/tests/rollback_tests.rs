//! Integration tests for the rollback of partially constructed stores.
//!
//! These tests use an element type that keeps per-thread counters of how many instances were
//! ever constructed and how many are currently alive, and that can be told to fail on a
//! specific construction.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use bounded_store::{AllocationFailure, BoundedStore, Global, Tracked};

thread_local! {
    static CONSTRUCTED: Cell<usize> = const { Cell::new(0) };
    static LIVE: Cell<usize> = const { Cell::new(0) };
    static FAIL_AT: Cell<Option<usize>> = const { Cell::new(None) };
}

/// The failure raised by [`Volatile`] when it reaches its configured construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct VolatileFailure {
    attempt: usize,
}

#[derive(Debug, Eq, PartialEq)]
enum VolatileError {
    Failed(VolatileFailure),
    Allocation(AllocationFailure),
}

impl From<AllocationFailure> for VolatileError {
    fn from(value: AllocationFailure) -> Self {
        Self::Allocation(value)
    }
}

#[derive(Debug)]
struct Volatile {
    attempt: usize,
}

impl Volatile {
    /// Resets the counters of the current thread and arms the failure for the given
    /// (zero-based) construction attempt.
    fn reset(fail_at: Option<usize>) {
        CONSTRUCTED.set(0);
        LIVE.set(0);
        FAIL_AT.set(fail_at);
    }

    fn try_new() -> Result<Self, VolatileFailure> {
        let attempt = CONSTRUCTED.get();
        CONSTRUCTED.set(attempt + 1);

        if FAIL_AT.get() == Some(attempt) {
            return Err(VolatileFailure { attempt });
        }

        LIVE.set(LIVE.get() + 1);
        Ok(Self { attempt })
    }
}

impl Default for Volatile {
    fn default() -> Self {
        Self::try_new().unwrap_or_else(|failure| panic::panic_any(failure))
    }
}

impl Drop for Volatile {
    fn drop(&mut self) {
        LIVE.set(LIVE.get() - 1);
    }
}

#[test]
fn twenty_elements_failing_on_eleventh_by_panic() {
    Volatile::reset(Some(10));
    let tracked = Tracked::new(Global);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        BoundedStore::<Volatile, _>::with_len_in(20, tracked.clone())
    }));

    let payload = result.unwrap_err();
    assert_eq!(
        payload.downcast_ref::<VolatileFailure>(),
        Some(&VolatileFailure { attempt: 10 })
    );

    assert_eq!(CONSTRUCTED.get(), 11);
    assert_eq!(LIVE.get(), 0);

    let report = tracked.report();
    assert_eq!(report.reservations, 1);
    assert_eq!(report.reserved_elements, 20);
    assert_eq!(report.constructions, 10);
    assert_eq!(report.destructions, 10);
    assert_eq!(report.releases, 1);
    assert_eq!(report.released_elements, 20);
}

#[test]
fn twenty_elements_failing_on_eleventh_by_error() {
    Volatile::reset(Some(10));
    let tracked = Tracked::new(Global);

    let result = BoundedStore::<Volatile, _>::try_from_fn_in(20, tracked.clone(), |_| {
        Volatile::try_new().map_err(VolatileError::Failed)
    });

    assert_eq!(
        result.unwrap_err(),
        VolatileError::Failed(VolatileFailure { attempt: 10 })
    );

    assert_eq!(LIVE.get(), 0);

    let report = tracked.report();
    assert_eq!(report.live_elements(), 0);
    assert_eq!(report.outstanding_blocks(), 0);
    assert_eq!(report.released_elements, 20);
}

#[test]
fn every_failure_point_destroys_exactly_the_constructed_prefix() {
    for len in [1, 2, 5, 20] {
        // `failing` is the 1-based position of the construction that fails.
        for failing in 1..=len {
            Volatile::reset(Some(failing - 1));
            let tracked = Tracked::new(Global);
            let destroyed = Rc::new(RefCell::new(Vec::new()));

            let result = BoundedStore::try_from_fn_in(len, tracked.clone(), |index| {
                Volatile::try_new()
                    .map(|volatile| Witness {
                        index,
                        _volatile: volatile,
                        destroyed: Rc::clone(&destroyed),
                    })
                    .map_err(VolatileError::Failed)
            });

            let Err(VolatileError::Failed(failure)) = result else {
                panic!("len {len}, failing {failing}: construction did not fail");
            };
            assert_eq!(failure.attempt, failing - 1);
            assert_eq!(LIVE.get(), 0, "len {len}, failing {failing}");

            let expected = (0..failing - 1).rev().collect::<Vec<_>>();
            assert_eq!(
                *destroyed.borrow(),
                expected,
                "len {len}, failing {failing}"
            );

            let report = tracked.report();
            assert_eq!(report.destructions, failing - 1);
            assert_eq!(report.releases, 1);
            assert_eq!(report.released_elements, len);
        }
    }
}

/// Records its index when dropped, wrapping a counted element.
struct Witness {
    index: usize,
    _volatile: Volatile,
    destroyed: Rc<RefCell<Vec<usize>>>,
}

impl Drop for Witness {
    fn drop(&mut self) {
        self.destroyed.borrow_mut().push(self.index);
    }
}

#[test]
fn successful_construction_keeps_everything_alive() {
    Volatile::reset(None);
    let tracked = Tracked::new(Global);

    let store = BoundedStore::<Volatile, _>::with_len_in(20, tracked.clone()).unwrap();

    assert_eq!(LIVE.get(), 20);
    assert_eq!(store.len(), 20);
    assert!(store.iter().enumerate().all(|(index, v)| v.attempt == index));

    drop(store);

    assert_eq!(LIVE.get(), 0);
    assert_eq!(tracked.report().outstanding_blocks(), 0);
}

#[test]
fn failed_resize_keeps_original_elements_alive() {
    Volatile::reset(None);

    let mut store = BoundedStore::<Volatile>::with_len(4).unwrap();
    assert_eq!(LIVE.get(), 4);

    // The replacement fails on its third element.
    FAIL_AT.set(Some(CONSTRUCTED.get() + 2));

    let result = panic::catch_unwind(AssertUnwindSafe(|| store.resize(8)));

    result.unwrap_err();
    assert_eq!(LIVE.get(), 4);
    assert_eq!(store.len(), 4);
    assert_eq!(
        store.iter().map(|v| v.attempt).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
}

#[test]
fn failed_clone_keeps_source_alive() {
    #[derive(Debug)]
    struct CloneBomb(Volatile);

    impl Clone for CloneBomb {
        fn clone(&self) -> Self {
            Self(Volatile::default())
        }
    }

    Volatile::reset(None);
    let source = BoundedStore::<CloneBomb>::from_fn(5, |_| CloneBomb(Volatile::default())).unwrap();

    FAIL_AT.set(Some(CONSTRUCTED.get() + 3));

    let result = panic::catch_unwind(AssertUnwindSafe(|| source.clone()));

    result.unwrap_err();
    assert_eq!(LIVE.get(), 5);
    assert_eq!(source.len(), 5);
    assert!(source.iter().all(|bomb| bomb.0.attempt < 5));
}
