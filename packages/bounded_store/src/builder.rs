use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use crate::{AllocationFailure, AllocationStrategy, BoundedStore, DropPolicy, Global};

/// Builder for creating an instance of [`BoundedStore`].
///
/// You only need to use this builder if you want to customize the store configuration.
/// The constructors on [`BoundedStore`] use the global memory allocator and
/// [`DropPolicy::MayDropItems`], which is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use bounded_store::{BoundedStore, Budgeted, DropPolicy};
///
/// let store = BoundedStore::<u32>::builder()
///     .strategy(Budgeted::with_limit(1024))
///     .drop_policy(DropPolicy::MayDropItems)
///     .build_from_fn(8, |index| index as u32)
///     .unwrap();
///
/// assert_eq!(store[7], 7);
/// ```
#[must_use]
pub struct BoundedStoreBuilder<T, S = Global> {
    strategy: S,
    drop_policy: DropPolicy,

    _item: PhantomData<T>,
}

impl<T, S: fmt::Debug> fmt::Debug for BoundedStoreBuilder<T, S> {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedStoreBuilder")
            .field("item_type", &format_args!("{}", type_name::<T>()))
            .field("strategy", &self.strategy)
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}

impl<T> BoundedStoreBuilder<T, Global> {
    pub(crate) fn new() -> Self {
        Self {
            strategy: Global,
            drop_policy: DropPolicy::default(),
            _item: PhantomData,
        }
    }
}

impl<T, S: AllocationStrategy> BoundedStoreBuilder<T, S> {
    /// Sets the [allocation strategy][AllocationStrategy] that will provide the memory of the
    /// store.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::{BoundedStore, Global, Tracked};
    ///
    /// let tracked = Tracked::new(Global);
    ///
    /// let store = BoundedStore::<u32>::builder()
    ///     .strategy(tracked.clone())
    ///     .build_with_len(2)
    ///     .unwrap();
    ///
    /// assert_eq!(tracked.report().reservations, 1);
    /// # drop(store);
    /// ```
    pub fn strategy<S2: AllocationStrategy>(self, strategy: S2) -> BoundedStoreBuilder<T, S2> {
        BoundedStoreBuilder {
            strategy,
            drop_policy: self.drop_policy,
            _item: PhantomData,
        }
    }

    /// Sets the [drop policy][DropPolicy] for the store. This governs how
    /// to treat remaining elements when the store is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::{BoundedStore, DropPolicy};
    ///
    /// let store = BoundedStore::<u32>::builder()
    ///     .drop_policy(DropPolicy::MustNotDropItems)
    ///     .build();
    /// ```
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds an empty store with the specified configuration. The strategy is not called.
    #[must_use]
    pub fn build(self) -> BoundedStore<T, S> {
        BoundedStore::empty_with(self.strategy, self.drop_policy)
    }

    /// Builds a store of `len` default-constructed elements with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `T::default()` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn build_with_len(self, len: usize) -> Result<BoundedStore<T, S>, AllocationFailure>
    where
        T: Default,
    {
        self.build_from_fn(len, |_| T::default())
    }

    /// Builds a store of `len` elements with the specified configuration, each produced by
    /// calling `init` with its index.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `init` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn build_from_fn<F>(
        self,
        len: usize,
        mut init: F,
    ) -> Result<BoundedStore<T, S>, AllocationFailure>
    where
        F: FnMut(usize) -> T,
    {
        self.try_build_from_fn(len, |index| Ok::<_, AllocationFailure>(init(index)))
    }

    /// Builds a store of `len` elements with the specified configuration, each produced by
    /// calling the fallible `init` with its index.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `init`, unchanged, after the elements constructed so
    /// far have been destroyed and the block released. A failure to reserve the block is
    /// converted into `E`.
    pub fn try_build_from_fn<E, F>(self, len: usize, init: F) -> Result<BoundedStore<T, S>, E>
    where
        E: From<AllocationFailure>,
        F: FnMut(usize) -> Result<T, E>,
    {
        BoundedStore::try_build(len, self.strategy, self.drop_policy, init)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::Tracked;

    #[test]
    fn defaults() {
        let store = BoundedStore::<u32>::builder().build();

        assert!(store.is_empty());
        assert_eq!(store.drop_policy(), DropPolicy::MayDropItems);
        assert_eq!(*store.strategy(), Global);
    }

    #[test]
    fn strategy_replaces_type_and_keeps_policy() {
        let tracked = Tracked::new(Global);

        let mut store = BoundedStore::<u32>::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .strategy(tracked.clone())
            .build_with_len(5)
            .unwrap();

        assert_eq!(store.drop_policy(), DropPolicy::MustNotDropItems);
        assert_eq!(tracked.report().constructions, 5);

        store.clear();
    }

    #[test]
    fn build_from_fn_uses_indexes() {
        let store = BoundedStore::<usize>::builder()
            .build_from_fn(4, |index| index * 2)
            .unwrap();

        assert_eq!(store.as_slice(), &[0, 2, 4, 6]);
    }

    #[test]
    fn try_build_from_fn_passes_error_through() {
        let result = BoundedStore::<usize>::builder().try_build_from_fn(4, |index| {
            if index == 0 {
                Err(AllocationFailure::OutOfMemory { bytes: 0 })
            } else {
                Ok(index)
            }
        });

        assert_eq!(
            result.unwrap_err(),
            AllocationFailure::OutOfMemory { bytes: 0 }
        );
    }

    #[test]
    fn debug_names_item_type() {
        let builder = BoundedStore::<u32>::builder();

        let output = format!("{builder:?}");

        assert!(output.contains("u32"));
        assert!(output.contains("MayDropItems"));
    }
}
