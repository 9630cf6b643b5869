//! Inline callback executor, implementing synchronous callback execution
//!
//! This callback executor follows the traditional pattern of directly executing
//! callbacks on whichever thread completes the asynchronous operation. It can
//! harm producer performance, but for short performance-critical callbacks it
//! can be a good choice.

use crate::executor::{CallbackExecutor, Job};


/// CallbackExecutor implementation suitable for inline callback execution
#[derive(Debug, Default)]
pub struct InlineCallbackExecutor {}
//
impl InlineCallbackExecutor {
    /// Create a new inline callback executor
    pub fn new() -> Self {
        InlineCallbackExecutor {}
    }
}
//
impl CallbackExecutor for InlineCallbackExecutor {
    fn execute(&self, job: Job) {
        job();
    }

    /// Every thread is allowed to run inline callbacks
    fn is_current(&self) -> bool {
        true
    }
}
