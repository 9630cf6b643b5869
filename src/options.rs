//! Creation options of asynchronous operations
//!
//! These flags are fixed when an operation is created, and never change
//! afterwards.

use bitflags::bitflags;


bitflags! {
    /// Behaviour switches which are set when an operation is created
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CreationOptions: u32 {
        /// Never run continuations inline on the thread which completes the
        /// operation, even if that thread belongs to the continuation's
        /// executor. Continuations registered without an executor still run
        /// inline, as there is nowhere else to run them.
        const RUN_CONTINUATIONS_ASYNCHRONOUSLY = 0b01;

        /// Record cancellation requests so that producers can observe them,
        /// but do not transition the operation to the canceled state.
        const SUPPRESS_CANCELLATION = 0b10;
    }
}
