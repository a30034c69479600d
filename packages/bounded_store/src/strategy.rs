use std::alloc::{Layout, alloc, dealloc};
use std::ptr::{self, NonNull};

use crate::AllocationFailure;

/// Supplies raw memory to a [`BoundedStore`][crate::BoundedStore] and constructs and destroys
/// the elements that live in it.
///
/// The store never touches memory on its own. Every block it owns was obtained from
/// [`reserve()`][Self::reserve], every element in it was created by
/// [`construct_at()`][Self::construct_at] and is eventually torn down by
/// [`destroy_at()`][Self::destroy_at] before the block is handed back via
/// [`release()`][Self::release]. This allows arena, pool or instrumented strategies to be
/// substituted without changing the store.
///
/// The element-level operations have default implementations that simply move the value into
/// place and drop it in place. Wrapping strategies forward them to the strategy they wrap.
///
/// # Safety
///
/// Implementations must guarantee that:
///
/// 1. A block returned by `reserve::<T>(count)` is aligned for `T` and valid for reads and writes
///    of `count` consecutive `T` values until it is passed to `release()`.
/// 2. A block reserved through a strategy may be released through any clone of that strategy.
/// 3. `release()` and `destroy_at()` do not panic.
pub unsafe trait AllocationStrategy {
    /// Reserves an uninitialized block for exactly `count` elements of `T`.
    ///
    /// The store never calls this with a `count` of zero.
    ///
    /// # Errors
    ///
    /// Returns an [`AllocationFailure`] if the block cannot be provided.
    fn reserve<T>(&self, count: usize) -> Result<NonNull<T>, AllocationFailure>;

    /// Releases a block previously obtained from [`reserve()`][Self::reserve].
    ///
    /// # Safety
    ///
    /// The caller must ensure that `block` was returned by `reserve::<T>(count)` on this strategy
    /// (or a clone of it) with the same `count`, that it has not been released yet and that no
    /// live elements remain in it.
    unsafe fn release<T>(&self, block: NonNull<T>, count: usize);

    /// Constructs one element in place by evaluating `init` and moving the result into `slot`.
    ///
    /// If `init` fails, its error is returned unchanged and `slot` remains uninitialized.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `init`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `slot` points into a reserved block and does not hold a
    /// live element.
    unsafe fn construct_at<T, E, F>(&self, slot: NonNull<T>, init: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let value = init()?;

        // SAFETY: Forwarding the caller's guarantee that the slot is valid for writes.
        unsafe {
            slot.write(value);
        }

        Ok(())
    }

    /// Destroys the live element at `slot`, leaving the slot uninitialized.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `slot` holds a live element that is not used again afterwards.
    unsafe fn destroy_at<T>(&self, slot: NonNull<T>) {
        // SAFETY: Forwarding the caller's guarantee that the slot holds a live element.
        unsafe {
            ptr::drop_in_place(slot.as_ptr());
        }
    }
}

/// The default strategy, backed by the global Rust memory allocator.
///
/// Blocks for zero-sized element types are never allocated; a dangling, well-aligned pointer is
/// returned instead and releasing it does nothing.
///
/// # Examples
///
/// ```
/// use bounded_store::{BoundedStore, Global};
///
/// let store = BoundedStore::<u64, Global>::with_len_in(4, Global).unwrap();
/// assert_eq!(store.len(), 4);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[expect(
    clippy::exhaustive_structs,
    reason = "unit strategy that callers name directly as a value"
)]
pub struct Global;

// SAFETY: Blocks come straight from the global allocator with the layout of a `[T; count]`
// array and are released with the same layout. Any `Global` can release any other's blocks
// because there is only one global allocator.
unsafe impl AllocationStrategy for Global {
    fn reserve<T>(&self, count: usize) -> Result<NonNull<T>, AllocationFailure> {
        let layout = block_layout::<T>(count)?;

        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        // SAFETY: The layout has a non-zero size, checked above.
        let ptr = unsafe { alloc(layout) };

        NonNull::new(ptr.cast::<T>()).ok_or(AllocationFailure::OutOfMemory {
            bytes: layout.size(),
        })
    }

    unsafe fn release<T>(&self, block: NonNull<T>, count: usize) {
        let layout = block_layout::<T>(count)
            .expect("the same layout was valid when the block was reserved");

        if layout.size() == 0 {
            return;
        }

        // SAFETY: The caller guarantees the block came from `reserve()` with this count, so it
        // was allocated by the global allocator with exactly this layout.
        unsafe {
            dealloc(block.as_ptr().cast(), layout);
        }
    }
}

/// Calculates the layout of a block holding `count` elements of `T`.
pub(crate) fn block_layout<T>(count: usize) -> Result<Layout, AllocationFailure> {
    Layout::array::<T>(count).map_err(|_layout_error| AllocationFailure::CapacityOverflow {
        count,
        element_size: size_of::<T>(),
    })
}
