use thiserror::Error;

/// An allocation strategy could not provide the block that was requested from it.
///
/// Construction failures of individual elements are not represented here. Fallible construction
/// methods return the initializer's own error type unchanged, which only needs to be convertible
/// from this type via [`From`].
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum AllocationFailure {
    /// The requested number of elements does not fit into a single valid memory layout.
    #[error("cannot lay out {count} elements of {element_size} bytes in one block")]
    CapacityOverflow {
        /// Number of elements that was requested.
        count: usize,

        /// Size of one element, in bytes.
        element_size: usize,
    },

    /// The underlying memory allocator returned no memory.
    #[error("the memory allocator could not provide {bytes} bytes")]
    OutOfMemory {
        /// Size of the block that was requested, in bytes.
        bytes: usize,
    },

    /// A budgeted strategy refused the reservation because it would exceed the budget.
    #[error("reserving {requested} bytes would exceed the budget, only {available} bytes remain")]
    BudgetExceeded {
        /// Size of the block that was requested, in bytes.
        requested: usize,

        /// Bytes still available in the budget at the time of the request.
        available: usize,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(AllocationFailure: Send, Sync, Debug, Copy, std::error::Error);

    #[test]
    fn display_mentions_sizes() {
        let failure = AllocationFailure::OutOfMemory { bytes: 4096 };
        assert!(failure.to_string().contains("4096"));

        let failure = AllocationFailure::BudgetExceeded {
            requested: 100,
            available: 12,
        };
        let message = failure.to_string();
        assert!(message.contains("100"));
        assert!(message.contains("12"));

        let failure = AllocationFailure::CapacityOverflow {
            count: usize::MAX,
            element_size: 8,
        };
        assert!(failure.to_string().contains(&usize::MAX.to_string()));
    }

    #[test]
    fn converts_into_caller_error_types() {
        #[derive(Debug, PartialEq)]
        enum CallerError {
            Allocation(AllocationFailure),
        }

        impl From<AllocationFailure> for CallerError {
            fn from(value: AllocationFailure) -> Self {
                Self::Allocation(value)
            }
        }

        let failure = AllocationFailure::OutOfMemory { bytes: 1 };
        let converted: CallerError = failure.into();
        assert_eq!(converted, CallerError::Allocation(failure));
    }
}
