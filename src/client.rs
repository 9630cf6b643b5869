//! Asynchronous operation client interface
//!
//! The client (observer) interface is what consumers of an asynchronous
//! operation get to see. It lets them read the status, progress and outcome
//! of the operation, block until it completes, and register callbacks which
//! run when the operation makes progress or completes.
//!
//! One service which is common to all asynchronous operation clients is the
//! ability to request the cancellation of an asynchronous operation. Note that
//! producers may decide to suppress cancellation requests, in which case the
//! request is recorded for them to observe, but does not complete the
//! operation. What we can guarantee is that a producer is able to check at any
//! time whether a cancellation request has been sent by a client.

use crate::error::{OpError, UsageError};
use crate::executor::{self, ExecutorRef};
use crate::multithread::callback::{CallbackKey, CompletionCallback,
                                   ProgressCallback};
use crate::op::{AsyncOpResult, OpId, Refusal, SharedState};
use crate::options::CreationOptions;
use crate::status::{AsyncOpStatus, Outcome};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;


/// Features which all asynchronous operation clients are expected to share
pub trait IAsyncOpClient: Send + Sync {
    /// Request the cancellation of the asynchronous operation
    fn cancel(&self);
}
//
impl<C: IAsyncOpClient> IAsyncOpClient for Vec<C> {
    fn cancel(&self) {
        for client in self.iter() {
            client.cancel();
        }
    }
}


/// Completion callback of an operation, as handed back when registration is
/// refused because the operation already completed
pub type OpCallback<T> = CompletionCallback<AsyncOpClient<T>>;


/// Client interface, used to monitor an asynchronous operation
pub struct AsyncOpClient<T: AsyncOpResult> {
    /// Reference-counted shared state
    state: Arc<SharedState<T>>,
}
//
impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Wrap some shared state
    pub(crate) fn from_state(state: Arc<SharedState<T>>) -> Self {
        AsyncOpClient { state }
    }

    /// Access the shared state
    pub(crate) fn state(&self) -> &Arc<SharedState<T>> {
        &self.state
    }

    /// Create an operation which already has some outcome
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        Self::from_state(SharedState::new(CreationOptions::empty(),
                                          Some(outcome)))
    }

    /// Create an operation which already succeeded with some result
    pub fn from_result(value: T) -> Self {
        Self::from_outcome(Outcome::Success(value))
    }

    /// Create an operation which already failed with some error
    ///
    /// A cancellation error produces a canceled operation.
    ///
    pub fn from_error(error: OpError) -> Self {
        Self::from_outcome(Outcome::from_error(error))
    }

    /// Create an operation which is already canceled
    pub fn canceled() -> Self {
        Self::from_outcome(Outcome::Canceled)
    }

    /// Process-unique identifier of the operation
    pub fn id(&self) -> OpId {
        self.state.id()
    }

    /// Current status of the operation
    pub fn status(&self) -> AsyncOpStatus {
        self.state.status()
    }

    /// Check if the operation reached a final status
    pub fn is_completed(&self) -> bool {
        self.status().is_final()
    }

    /// Check if the operation ran to completion
    pub fn is_completed_successfully(&self) -> bool {
        self.status().is_success()
    }

    /// Check if the operation failed
    pub fn is_faulted(&self) -> bool {
        self.status().is_faulted()
    }

    /// Check if the operation was canceled
    pub fn is_canceled(&self) -> bool {
        self.status().is_canceled()
    }

    /// Check if the operation was already final when it was created
    pub fn completed_synchronously(&self) -> bool {
        self.state.completed_synchronously()
    }

    /// Options which the operation was created with
    pub fn creation_options(&self) -> CreationOptions {
        self.state.options()
    }

    /// Current progress of the operation, between 0 and 1
    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    /// Check if the operation has been disposed of
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Check if a cancellation request has been sent
    pub fn is_cancellation_requested(&self) -> bool {
        self.state.is_cancellation_requested()
    }

    /// Access the outcome of the operation, if it is final (non-blocking)
    pub fn outcome(&self) -> Option<&Outcome<T>> {
        self.state.outcome()
    }

    /// Access the error of a faulted or canceled operation (non-blocking)
    pub fn exception(&self) -> Option<OpError> {
        self.outcome().and_then(Outcome::error)
    }

    /// Wait for the operation to complete, then access its result
    pub fn result(&self) -> Result<&T, OpError> {
        self.state.wait(None);
        match self.state.outcome() {
            Some(outcome) => outcome.as_result(),
            None => unreachable!("operation is final after an unbounded wait"),
        }
    }

    /// Wait for the operation to complete, then report its failure if any
    pub fn wait(&self) -> Result<(), OpError> {
        self.result().map(|_| ())
    }

    /// Wait for the operation to complete, for at most some duration
    ///
    /// Returns Ok(false) if the operation is still pending when the timeout
    /// elapses. The operation is not canceled in this case.
    ///
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, OpError> {
        if !self.state.wait(Some(timeout)) {
            return Ok(false);
        }
        match self.state.outcome() {
            Some(outcome) => outcome.as_result().map(|_| true),
            None => Ok(false),
        }
    }

    /// Attempt to register a completion callback
    ///
    /// If the operation is already final, the callback is handed back without
    /// being registered, and the caller is responsible for running it.
    /// Otherwise, it is guaranteed to run exactly once, on the given executor
    /// (or inline if there is none), when the operation completes.
    ///
    pub fn try_add_completion_callback<F>(
        &self,
        callback: F,
        executor: Option<ExecutorRef>
    ) -> Result<CallbackKey, OpCallback<T>>
        where F: FnOnce(&AsyncOpClient<T>) + Send + 'static
    {
        self.state.try_add_completion(Box::new(callback), executor)
    }

    /// Register a completion callback, running it right away if the
    /// operation is already final
    ///
    /// Returns the key of the registered callback, or None if it already ran
    /// (or was posted to its executor).
    ///
    pub fn add_completion_callback<F>(
        &self,
        callback: F,
        executor: Option<ExecutorRef>
    ) -> Option<CallbackKey>
        where F: FnOnce(&AsyncOpClient<T>) + Send + 'static
    {
        match self.state.try_add_completion(Box::new(callback),
                                            executor.clone()) {
            Ok(key) => Some(key),
            Err(callback) => {
                let client = self.clone();
                executor::dispatch(executor.as_ref(),
                                   self.state.dispatch_mode(),
                                   Box::new(move || callback(&client)));
                None
            }
        }
    }

    /// Attempt to register a progress callback
    ///
    /// If the operation is already final, the callback is handed back without
    /// being registered. Otherwise, it runs on every progress update, and one
    /// last time with a progress of 1 when the operation completes.
    ///
    pub fn try_add_progress_callback<F>(
        &self,
        callback: F,
        executor: Option<ExecutorRef>
    ) -> Result<CallbackKey, ProgressCallback>
        where F: Fn(f32) + Send + Sync + 'static
    {
        self.state.try_add_progress(Arc::new(callback), executor)
    }

    /// Register a progress callback, running it once with a progress of 1
    /// right away if the operation is already final
    pub fn add_progress_callback<F>(
        &self,
        callback: F,
        executor: Option<ExecutorRef>
    ) -> Option<CallbackKey>
        where F: Fn(f32) + Send + Sync + 'static
    {
        match self.state.try_add_progress(Arc::new(callback),
                                          executor.clone()) {
            Ok(key) => Some(key),
            Err(callback) => {
                executor::dispatch(executor.as_ref(),
                                   self.state.dispatch_mode(),
                                   Box::new(move || callback(1.0)));
                None
            }
        }
    }

    /// Unregister a callback, telling whether it was still registered
    ///
    /// This is best-effort: a callback which already fired, or is firing,
    /// cannot be recalled.
    ///
    pub fn remove_callback(&self, key: CallbackKey) -> bool {
        self.state.remove_callback(key)
    }

    /// Dispose of a completed operation, releasing its wait handle
    ///
    /// Disposing of a pending operation is an error, but disposing of an
    /// operation twice is fine. Once disposed, the operation's server
    /// interface refuses every further call.
    ///
    pub fn dispose(&self) -> Result<(), UsageError> {
        self.state.dispose().map_err(|refusal| match refusal {
            Refusal::Disposed => UsageError::Disposed { id: self.id() },
            Refusal::InvalidState(status) => UsageError::InvalidState {
                id: self.id(),
                status,
                action: "dispose of",
            },
        })
    }

    /// Request the cancellation of the asynchronous operation
    ///
    /// Any source operation that a combinator is currently waiting on gets
    /// canceled as well.
    ///
    pub fn cancel(&self) {
        self.state.request_cancel();
    }
}
//
impl AsyncOpClient<()> {
    /// Shared operation which already ran to completion
    pub fn completed() -> Self {
        static COMPLETED: OnceLock<AsyncOpClient<()>> = OnceLock::new();
        COMPLETED.get_or_init(|| AsyncOpClient::from_result(())).clone()
    }
}
//
impl<T: AsyncOpResult> Clone for AsyncOpClient<T> {
    fn clone(&self) -> Self {
        AsyncOpClient { state: self.state.clone() }
    }
}
//
impl<T: AsyncOpResult> IAsyncOpClient for AsyncOpClient<T> {
    fn cancel(&self) {
        self.state.request_cancel();
    }
}
//
impl<T: AsyncOpResult> fmt::Debug for AsyncOpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AsyncOpClient")
         .field("id", &self.id())
         .field("status", &self.status())
         .finish()
    }
}
