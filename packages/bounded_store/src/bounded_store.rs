use std::any::type_name;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};
use std::{fmt, mem, slice, thread};

use tracing::debug;

use crate::{
    AllocationFailure, AllocationStrategy, BoundedStoreBuilder, DropPolicy, Global, PartialBlock,
};

/// A fixed-capacity contiguous store whose capacity always equals its length.
///
/// The store owns at most one block of memory, obtained from an [`AllocationStrategy`], and the
/// first (and only) `len()` slots of that block always hold live elements. An empty store owns no
/// block at all and creating one never touches the strategy.
///
/// There is no spare capacity and no way to push or remove single elements. Changing the length
/// via [`resize()`][Self::resize] builds a complete replacement block.
///
/// # Failure handling
///
/// Elements are constructed one at a time in ascending index order. If constructing an element
/// fails, either by returning an error from a fallible initializer or by panicking, the elements
/// constructed so far are destroyed in reverse order, the block is released and the failure is
/// passed on to the caller unchanged. Nothing is leaked and no slot that was never constructed is
/// ever destroyed.
///
/// Operations that replace the contents of an existing store ([`resize()`][Self::resize],
/// [`try_clone_from()`][Self::try_clone_from] and their variants) build the replacement first and
/// only then swap it in, so a failure leaves the store exactly as it was.
///
/// # Element access
///
/// The store dereferences to a slice, so the usual slice methods and indexing are available.
///
/// # Examples
///
/// ```
/// use bounded_store::BoundedStore;
///
/// let mut store = BoundedStore::<u32>::from_fn(4, |index| index as u32 * 10).unwrap();
///
/// assert_eq!(store.len(), 4);
/// assert_eq!(store[2], 20);
///
/// store[0] = 5;
/// assert_eq!(store.as_slice(), &[5, 10, 20, 30]);
/// ```
pub struct BoundedStore<T, S: AllocationStrategy = Global> {
    /// `None` if and only if `len` is zero.
    storage: Option<NonNull<T>>,

    /// Number of live elements, which is also the capacity of the block.
    len: usize,

    strategy: S,

    drop_policy: DropPolicy,

    _elements: PhantomData<T>,
}

impl<T> BoundedStore<T, Global> {
    /// Creates an empty store that uses the global memory allocator.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::BoundedStore;
    ///
    /// let store = BoundedStore::<String>::new();
    ///
    /// assert_eq!(store.len(), 0);
    /// assert!(store.is_empty());
    /// assert!(store.as_ptr().is_null());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Starts building a new [`BoundedStore`].
    ///
    /// Use this when you want to customize the strategy or drop policy in one place.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::{BoundedStore, DropPolicy, Global, Tracked};
    ///
    /// let store = BoundedStore::<u8>::builder()
    ///     .strategy(Tracked::new(Global))
    ///     .drop_policy(DropPolicy::MayDropItems)
    ///     .build_with_len(16)
    ///     .unwrap();
    ///
    /// assert_eq!(store.len(), 16);
    /// ```
    pub fn builder() -> BoundedStoreBuilder<T, Global> {
        BoundedStoreBuilder::new()
    }

    /// Creates a store of `len` default-constructed elements.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `T::default()` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn with_len(len: usize) -> Result<Self, AllocationFailure>
    where
        T: Default,
    {
        Self::with_len_in(len, Global)
    }

    /// Creates a store of `len` clones of `value`.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `T::clone()` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn from_elem(value: T, len: usize) -> Result<Self, AllocationFailure>
    where
        T: Clone,
    {
        Self::from_elem_in(value, len, Global)
    }

    /// Creates a store of `len` elements, each produced by calling `init` with its index.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `init` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn from_fn<F>(len: usize, init: F) -> Result<Self, AllocationFailure>
    where
        F: FnMut(usize) -> T,
    {
        Self::from_fn_in(len, Global, init)
    }

    /// Creates a store of `len` elements, each produced by calling the fallible `init` with its
    /// index.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `init`, unchanged, after the elements constructed so
    /// far have been destroyed and the block released. A failure to reserve the block is
    /// converted into `E`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::{AllocationFailure, BoundedStore};
    ///
    /// #[derive(Debug, PartialEq)]
    /// enum BuildError {
    ///     Allocation(AllocationFailure),
    ///     Odd(usize),
    /// }
    ///
    /// impl From<AllocationFailure> for BuildError {
    ///     fn from(value: AllocationFailure) -> Self {
    ///         Self::Allocation(value)
    ///     }
    /// }
    ///
    /// let result = BoundedStore::<usize>::try_from_fn(4, |index| {
    ///     if index == 3 {
    ///         Err(BuildError::Odd(index))
    ///     } else {
    ///         Ok(index)
    ///     }
    /// });
    ///
    /// assert_eq!(result.unwrap_err(), BuildError::Odd(3));
    /// ```
    pub fn try_from_fn<E, F>(len: usize, init: F) -> Result<Self, E>
    where
        E: From<AllocationFailure>,
        F: FnMut(usize) -> Result<T, E>,
    {
        Self::try_from_fn_in(len, Global, init)
    }
}

impl<T, S: AllocationStrategy> BoundedStore<T, S> {
    /// Creates an empty store that will use `strategy` for all its memory.
    ///
    /// The strategy is not called.
    #[must_use]
    pub fn new_in(strategy: S) -> Self {
        Self::empty_with(strategy, DropPolicy::default())
    }

    pub(crate) fn empty_with(strategy: S, drop_policy: DropPolicy) -> Self {
        Self {
            storage: None,
            len: 0,
            strategy,
            drop_policy,
            _elements: PhantomData,
        }
    }

    /// Creates a store of `len` default-constructed elements in memory from `strategy`.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `T::default()` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn with_len_in(len: usize, strategy: S) -> Result<Self, AllocationFailure>
    where
        T: Default,
    {
        Self::from_fn_in(len, strategy, |_| T::default())
    }

    /// Creates a store of `len` clones of `value` in memory from `strategy`.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `T::clone()` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn from_elem_in(value: T, len: usize, strategy: S) -> Result<Self, AllocationFailure>
    where
        T: Clone,
    {
        Self::from_fn_in(len, strategy, |_| value.clone())
    }

    /// Creates a store of `len` elements in memory from `strategy`, each produced by calling
    /// `init` with its index.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `init` is propagated after the elements constructed so far have been
    /// destroyed and the block released.
    pub fn from_fn_in<F>(len: usize, strategy: S, mut init: F) -> Result<Self, AllocationFailure>
    where
        F: FnMut(usize) -> T,
    {
        Self::try_from_fn_in(len, strategy, |index| {
            Ok::<_, AllocationFailure>(init(index))
        })
    }

    /// Creates a store of `len` elements in memory from `strategy`, each produced by calling the
    /// fallible `init` with its index.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `init`, unchanged, after the elements constructed so
    /// far have been destroyed and the block released. A failure to reserve the block is
    /// converted into `E`.
    pub fn try_from_fn_in<E, F>(len: usize, strategy: S, init: F) -> Result<Self, E>
    where
        E: From<AllocationFailure>,
        F: FnMut(usize) -> Result<T, E>,
    {
        Self::try_build(len, strategy, DropPolicy::default(), init)
    }

    pub(crate) fn try_build<E, F>(
        len: usize,
        strategy: S,
        drop_policy: DropPolicy,
        init: F,
    ) -> Result<Self, E>
    where
        E: From<AllocationFailure>,
        F: FnMut(usize) -> Result<T, E>,
    {
        let storage = Self::construct_block(&strategy, len, init)?;

        Ok(Self {
            storage,
            len,
            strategy,
            drop_policy,
            _elements: PhantomData,
        })
    }

    /// Builds a complete block of `len` elements, or nothing at all.
    ///
    /// A zero-length block is represented by `None` and makes no strategy calls.
    fn construct_block<E, F>(strategy: &S, len: usize, mut init: F) -> Result<Option<NonNull<T>>, E>
    where
        E: From<AllocationFailure>,
        F: FnMut(usize) -> Result<T, E>,
    {
        if len == 0 {
            return Ok(None);
        }

        // If any step below fails, dropping the partial block rolls back everything done so far.
        let mut partial = PartialBlock::reserve(strategy, len)?;

        for index in 0..len {
            partial.construct_next(|| init(index))?;
        }

        Ok(Some(partial.finish()))
    }

    /// Swaps in a new block and tears down the previous one.
    fn replace_block(&mut self, storage: Option<NonNull<T>>, len: usize) {
        let previous_storage = mem::replace(&mut self.storage, storage);
        let previous_len = mem::replace(&mut self.len, len);

        if let Some(block) = previous_storage {
            // SAFETY: The block was ours, reserved from our strategy for exactly `previous_len`
            // elements, all of which are live. We no longer reference it from `self`.
            drop(unsafe {
                PartialBlock::from_parts(&self.strategy, block, previous_len, previous_len)
            });
        }
    }

    /// The number of elements in the store. This is also its capacity.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the store is empty. An empty store does not own any memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_none()
    }

    /// The largest number of elements a store can describe, which is the largest value of its
    /// length type.
    ///
    /// This is a theoretical bound, not a promise that a strategy can provide a block that large.
    /// Requesting more elements than fit into a single memory layout fails with
    /// [`AllocationFailure::CapacityOverflow`].
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::BoundedStore;
    ///
    /// assert_eq!(BoundedStore::<u64>::max_len(), usize::MAX);
    /// assert_eq!(BoundedStore::<()>::max_len(), usize::MAX);
    /// ```
    #[must_use]
    pub const fn max_len() -> usize {
        usize::MAX
    }

    /// A pointer to the first element, or a null pointer if the store is empty.
    ///
    /// The pointer is valid for reads of `len()` elements until the store is modified or dropped.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.storage.map_or(ptr::null(), |block| block.as_ptr().cast_const())
    }

    /// A mutable pointer to the first element, or a null pointer if the store is empty.
    ///
    /// The pointer is valid for reads and writes of `len()` elements until the store is modified
    /// or dropped.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.storage.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// The elements of the store.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self.storage {
            // SAFETY: The first `len` slots of our block are live, and the shared borrow of
            // `self` prevents them from being modified for the lifetime of the slice.
            Some(block) => unsafe { slice::from_raw_parts(block.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// The elements of the store, for modification in place.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.storage {
            // SAFETY: The first `len` slots of our block are live, and the exclusive borrow of
            // `self` guarantees nobody else can observe them for the lifetime of the slice.
            Some(block) => unsafe { slice::from_raw_parts_mut(block.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// The strategy that provides the memory of this store.
    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// The drop policy of this store.
    #[must_use]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// Replaces the contents with `len` default-constructed elements.
    ///
    /// This always builds a complete new block, even if `len` equals the current length, and
    /// only then destroys the previous elements. Resizing to zero leaves the store empty without
    /// reserving anything.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the new block cannot be reserved, in which case the
    /// store is left unchanged.
    ///
    /// # Panics
    ///
    /// A panic from `T::default()` is propagated after the partially built replacement has been
    /// rolled back. The store is left unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::BoundedStore;
    ///
    /// let mut store = BoundedStore::<u32>::from_elem(7, 2).unwrap();
    ///
    /// store.resize(3).unwrap();
    /// assert_eq!(store.as_slice(), &[0, 0, 0]);
    /// ```
    pub fn resize(&mut self, len: usize) -> Result<(), AllocationFailure>
    where
        T: Default,
    {
        self.resize_with(len, |_| T::default())
    }

    /// Replaces the contents with `len` elements, each produced by calling `init` with its index.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the new block cannot be reserved, in which case the
    /// store is left unchanged.
    ///
    /// # Panics
    ///
    /// A panic from `init` is propagated after the partially built replacement has been rolled
    /// back. The store is left unchanged.
    pub fn resize_with<F>(&mut self, len: usize, mut init: F) -> Result<(), AllocationFailure>
    where
        F: FnMut(usize) -> T,
    {
        self.try_resize_with(len, |index| Ok::<_, AllocationFailure>(init(index)))
    }

    /// Replaces the contents with `len` elements, each produced by calling the fallible `init`
    /// with its index.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `init`, unchanged, or the reservation failure
    /// converted into `E`. Either way the store is left unchanged.
    pub fn try_resize_with<E, F>(&mut self, len: usize, init: F) -> Result<(), E>
    where
        E: From<AllocationFailure>,
        F: FnMut(usize) -> Result<T, E>,
    {
        let storage = Self::construct_block(&self.strategy, len, init)?;
        self.replace_block(storage, len);
        Ok(())
    }

    /// Destroys all elements and releases the block, leaving the store empty.
    ///
    /// Elements are destroyed in reverse index order.
    pub fn clear(&mut self) {
        self.replace_block(None, 0);
    }

    /// Exchanges the contents, strategies and drop policies of two stores.
    ///
    /// No memory is reserved or released and no element is constructed or destroyed.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Moves the block and its elements out into a new store, leaving this store empty.
    ///
    /// The returned store uses a clone of the strategy and the same drop policy. No memory is
    /// reserved or released and no element is constructed or destroyed.
    ///
    /// # Examples
    ///
    /// ```
    /// use bounded_store::BoundedStore;
    ///
    /// let mut source = BoundedStore::<u32>::from_elem(1, 3).unwrap();
    /// let block = source.as_ptr();
    ///
    /// let target = source.take();
    ///
    /// assert!(source.is_empty());
    /// assert!(source.as_ptr().is_null());
    /// assert_eq!(target.len(), 3);
    /// assert_eq!(target.as_ptr(), block);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self
    where
        S: Clone,
    {
        Self {
            storage: self.storage.take(),
            len: mem::take(&mut self.len),
            strategy: self.strategy.clone(),
            drop_policy: self.drop_policy,
            _elements: PhantomData,
        }
    }

    /// Creates an independent copy of the store, cloning every element into a block from a clone
    /// of the strategy.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be reserved.
    ///
    /// # Panics
    ///
    /// A panic from `T::clone()` is propagated after the partial copy has been rolled back.
    pub fn try_clone(&self) -> Result<Self, AllocationFailure>
    where
        T: Clone,
        S: Clone,
    {
        let source = self.as_slice();

        Self::try_build(self.len, self.strategy.clone(), self.drop_policy, |index| {
            let element = source.get(index).expect("guarded by source length");
            Ok::<_, AllocationFailure>(element.clone())
        })
    }

    /// Replaces the contents with clones of the elements of `source`.
    ///
    /// The copy is built in a new block from this store's own strategy and swapped in only once
    /// every element has been cloned.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the new block cannot be reserved, in which case the
    /// store is left unchanged.
    ///
    /// # Panics
    ///
    /// A panic from `T::clone()` is propagated after the partial copy has been rolled back. The
    /// store is left unchanged.
    pub fn try_clone_from<S2>(
        &mut self,
        source: &BoundedStore<T, S2>,
    ) -> Result<(), AllocationFailure>
    where
        T: Clone,
        S2: AllocationStrategy,
    {
        let source = source.as_slice();

        self.try_resize_with(source.len(), |index| {
            let element = source.get(index).expect("guarded by source length");
            Ok::<_, AllocationFailure>(element.clone())
        })
    }
}

impl<T, S: AllocationStrategy> Drop for BoundedStore<T, S> {
    fn drop(&mut self) {
        let was_empty = self.is_empty();

        self.clear();

        // We do this check at the end so we clean up the memory first.
        //
        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if self.drop_policy == DropPolicy::MustNotDropItems && !thread::panicking() {
            if !was_empty {
                debug!(
                    element = type_name::<T>(),
                    "non-empty store dropped despite drop policy"
                );
            }

            assert!(
                was_empty,
                "dropped a non-empty store of {} whose drop policy requires it to be empty",
                type_name::<T>()
            );
        }
    }
}

impl<T, S: AllocationStrategy + Default> Default for BoundedStore<T, S> {
    fn default() -> Self {
        Self::new_in(S::default())
    }
}

impl<T: Clone, S: AllocationStrategy + Clone> Clone for BoundedStore<T, S> {
    /// # Panics
    ///
    /// Panics if the block cannot be reserved.
    fn clone(&self) -> Self {
        self.try_clone().expect(
            "we do not intend to handle allocation failure as a real possibility - OOM is panic",
        )
    }

    /// # Panics
    ///
    /// Panics if the block cannot be reserved. The store is left unchanged in that case.
    fn clone_from(&mut self, source: &Self) {
        self.try_clone_from(source).expect(
            "we do not intend to handle allocation failure as a real possibility - OOM is panic",
        );
    }
}

impl<T, S: AllocationStrategy> Deref for BoundedStore<T, S> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T, S: AllocationStrategy> DerefMut for BoundedStore<T, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T, S: AllocationStrategy> AsRef<[T]> for BoundedStore<T, S> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, S: AllocationStrategy> AsMut<[T]> for BoundedStore<T, S> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, U, S1, S2> PartialEq<BoundedStore<U, S2>> for BoundedStore<T, S1>
where
    T: PartialEq<U>,
    S1: AllocationStrategy,
    S2: AllocationStrategy,
{
    fn eq(&self, other: &BoundedStore<U, S2>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, S: AllocationStrategy> Eq for BoundedStore<T, S> {}

impl<T: fmt::Debug, S: AllocationStrategy + fmt::Debug> fmt::Debug for BoundedStore<T, S> {
    #[cfg_attr(test, mutants::skip)] // Diagnostic output only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedStore")
            .field("len", &self.len)
            .field("elements", &self.as_slice())
            .field("strategy", &self.strategy)
            .field("drop_policy", &self.drop_policy)
            .finish_non_exhaustive()
    }
}

// SAFETY: The store exclusively owns its block and elements, so it can move to another thread
// whenever the elements and the strategy can.
unsafe impl<T: Send, S: AllocationStrategy + Send> Send for BoundedStore<T, S> {}

// SAFETY: Shared access only hands out shared references to elements and the strategy.
unsafe impl<T: Sync, S: AllocationStrategy + Sync> Sync for BoundedStore<T, S> {}
