//! Asynchronous callback executors
//!
//! Whenever callback-based asynchronous notifications are used, one important
//! design issue is to decide where the callback functions should be executed.
//!
//! A traditional answer to this problem has been to run callbacks directly on
//! whichever thread completes the asynchronous operation, as part of the
//! status update process. While this approach, also known as inline callback
//! execution, works and has minimal scheduling overhead, it also has some
//! issues that prevent it from being universally applicable:
//!
//! - Long-running callbacks can have a harmful impact on producer performance
//! - Some consumers, such as UI code, must run on one specific thread
//! - Inlining continuations into one another can grow the stack unboundedly
//!
//! For this reason, each callback may be registered together with a callback
//! executor (also called a dispatch context), which is in charge of running
//! it on the consumer's side. There is no ambient "current executor": the
//! executor is always passed explicitly at registration time.

pub mod inline;
pub mod queue;

use crate::error::OpError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;


/// Unit of work handed over to a callback executor
pub type Job = Box<dyn FnOnce() + Send + 'static>;


/// Shared reference to a callback executor, as captured by callbacks
pub type ExecutorRef = Arc<dyn CallbackExecutor>;


/// Entry point to consumer-side callback scheduling
pub trait CallbackExecutor: Send + Sync {
    /// Schedule a job for execution on this executor
    fn execute(&self, job: Job);

    /// Tell whether the calling thread belongs to this executor, in which
    /// case jobs may be run inline instead of being posted
    fn is_current(&self) -> bool;
}
//
impl fmt::Debug for dyn CallbackExecutor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<callback executor>")
    }
}


/// Policy used to decide between inline execution and posting
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run inline if no executor was captured, or if the current thread
    /// already belongs to it. Otherwise, post to the executor.
    PreferInline,

    /// Always post to the captured executor, if there is one. Used by the
    /// awaiter and interop bridges, and by operations which were created
    /// with asynchronous continuations.
    AlwaysPost,
}


/// Run a callback job according to the dispatch policy
///
/// Panics from the job are caught and logged, so that a misbehaving callback
/// cannot prevent other callbacks from running.
///
pub(crate) fn dispatch(executor: Option<&ExecutorRef>,
                       mode: DispatchMode,
                       job: Job) {
    match executor {
        None => run_guarded(job),
        Some(executor) => {
            if mode == DispatchMode::PreferInline && executor.is_current() {
                run_guarded(job);
            } else {
                executor.execute(Box::new(move || run_guarded(job)));
            }
        }
    }
}


/// Run a job, catching and logging any panic which it may raise
pub(crate) fn run_guarded(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let error = OpError::from_panic(payload);
        error!(%error, "asynchronous operation callback panicked");
    }
}
