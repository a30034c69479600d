use std::any::type_name;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

use tracing::trace;

use crate::{AllocationFailure, AllocationStrategy};

/// A reserved block that is being filled with elements, one at a time, from the front.
///
/// This is the unit of rollback. Exactly the first `constructed` slots hold live elements. If the
/// partial block is dropped before being [finished][Self::finish], it destroys those elements in
/// reverse order of construction and then releases the whole block, sized for the capacity it was
/// reserved with. Slots that were never constructed are never passed to `destroy_at()`.
///
/// The store also uses this to tear down a complete block when it is dropped or replaced, by
/// re-adopting the block via [`from_parts()`][Self::from_parts] and letting it go.
#[derive(Debug)]
pub(crate) struct PartialBlock<'s, T, S: AllocationStrategy> {
    strategy: &'s S,
    block: NonNull<T>,

    /// Number of elements the block was reserved for.
    capacity: usize,

    /// Number of leading slots that hold live elements.
    constructed: usize,
}

impl<'s, T, S: AllocationStrategy> PartialBlock<'s, T, S> {
    /// Reserves an empty block for `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Empty stores never own a block.
    pub(crate) fn reserve(strategy: &'s S, capacity: usize) -> Result<Self, AllocationFailure> {
        assert!(
            capacity > 0,
            "zero-length blocks of {} must never be reserved",
            type_name::<T>()
        );

        let block = strategy.reserve::<T>(capacity)?;

        trace!(capacity, element = type_name::<T>(), "reserved block");

        Ok(Self {
            strategy,
            block,
            capacity,
            constructed: 0,
        })
    }

    /// Adopts a block whose first `constructed` slots hold live elements.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` was reserved from `strategy` (or a clone of it) for
    /// exactly `capacity` elements, that the first `constructed` slots are live and the rest are
    /// not, and that nothing else will destroy those elements or release the block.
    pub(crate) unsafe fn from_parts(
        strategy: &'s S,
        block: NonNull<T>,
        capacity: usize,
        constructed: usize,
    ) -> Self {
        debug_assert!(constructed <= capacity);

        Self {
            strategy,
            block,
            capacity,
            constructed,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn constructed(&self) -> usize {
        self.constructed
    }

    #[must_use]
    pub(crate) fn is_complete(&self) -> bool {
        self.constructed == self.capacity
    }

    /// Constructs the element in the next free slot.
    ///
    /// If `init` fails, the slot stays free and the error is returned unchanged. The elements
    /// constructed so far remain live until the partial block is dropped or finished.
    ///
    /// # Panics
    ///
    /// Panics if the block is already complete.
    pub(crate) fn construct_next<E, F>(&mut self, init: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        assert!(
            !self.is_complete(),
            "cannot construct beyond the capacity {} of a block of {}",
            self.capacity,
            type_name::<T>()
        );

        // SAFETY: `constructed < capacity` (asserted above), so the slot is inside the block.
        let slot = unsafe { self.block.add(self.constructed) };

        // SAFETY: The slot is inside a block reserved from this strategy and is not live,
        // because only the slots before `constructed` are live.
        unsafe { self.strategy.construct_at(slot, init) }?;

        self.constructed = self
            .constructed
            .checked_add(1)
            .expect("guarded by capacity check above");

        Ok(())
    }

    /// Hands over ownership of the completely constructed block.
    ///
    /// # Panics
    ///
    /// Panics if not every slot has been constructed.
    #[must_use]
    pub(crate) fn finish(self) -> NonNull<T> {
        assert!(
            self.is_complete(),
            "finished a block of {} with only {} of {} elements constructed",
            type_name::<T>(),
            self.constructed,
            self.capacity
        );

        // The elements and the block now belong to the caller, so the rollback must not run.
        let this = ManuallyDrop::new(self);
        this.block
    }
}

impl<T, S: AllocationStrategy> Drop for PartialBlock<'_, T, S> {
    fn drop(&mut self) {
        if !self.is_complete() {
            trace!(
                constructed = self.constructed,
                capacity = self.capacity,
                element = type_name::<T>(),
                "rolling back partially constructed block"
            );
        }

        // Reverse order of construction. The counter is decremented before each destruction so
        // it never claims an element that is already gone.
        while let Some(last) = self.constructed.checked_sub(1) {
            self.constructed = last;

            // SAFETY: `last < capacity`, so the slot is inside the block.
            let slot = unsafe { self.block.add(last) };

            // SAFETY: Slot `last` was live because it was below the previous `constructed` count,
            // and we no longer count it as live so it will not be destroyed twice.
            unsafe {
                self.strategy.destroy_at(slot);
            }
        }

        // SAFETY: The block was reserved from this strategy for exactly `capacity` elements
        // and no live elements remain in it.
        unsafe {
            self.strategy.release(self.block, self.capacity);
        }

        trace!(
            capacity = self.capacity,
            element = type_name::<T>(),
            "released block"
        );
    }
}
