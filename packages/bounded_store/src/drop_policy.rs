/// Determines what happens when a [`BoundedStore`][crate::BoundedStore] that still holds
/// elements is dropped.
///
/// By default, the store will drop its elements when it is dropped.
///
/// # Examples
///
/// ```
/// use bounded_store::{BoundedStore, DropPolicy};
///
/// // The drop policy is set at store creation time.
/// let store = BoundedStore::<u32>::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
///
/// assert_eq!(store.drop_policy(), DropPolicy::MustNotDropItems);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// The store will drop its elements when the store is dropped. This is the default.
    #[default]
    MayDropItems,

    /// The store will panic if it still contains elements when it is dropped.
    ///
    /// The elements are still destroyed and the block released before the panic, so nothing
    /// leaks. This is a tripwire for code that must explicitly [`clear()`][1] the store, for
    /// example because unsafe code holds pointers into the block that must be retired first.
    ///
    /// [1]: crate::BoundedStore::clear
    MustNotDropItems,
}
