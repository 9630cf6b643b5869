//! Asynchronous operation objects
//!
//! An asynchronous operation is a piece of shared state, which is driven to
//! completion by one or more producers through the server (controller)
//! interface, and monitored by any number of consumers through the client
//! (observer) interface. Following the usual pattern, an operation is created
//! as an `AsyncOp`, which is then split into a server and a client.
//!
//! The status of an operation is packed into a single atomic word, together
//! with a few flags. Completing an operation goes through two steps:
//!
//! 1. The completion is reserved with a compare-and-exchange on the status
//!    word. Only one caller may ever win this race.
//! 2. The winner stores the outcome, then publishes the final status with
//!    release semantics, releases waiting threads, and drains callbacks.
//!
//! As long as the reservation has not been published, the operation keeps
//! reporting its former pending status, so that a final status always comes
//! with a readable outcome.

use crate::client::{AsyncOpClient, IAsyncOpClient};
use crate::error::OpError;
use crate::executor::{DispatchMode, ExecutorRef};
use crate::multithread::blocking::WaitHandle;
use crate::multithread::callback::{CallbackKey, CallbackRegistry,
                                   CompletionCallback, ProgressCallback};
use crate::options::CreationOptions;
use crate::server::AsyncOpServer;
use crate::status::{AsyncOpStatus, Outcome};
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};


/// Trait bounds which every operation result should honor
pub trait AsyncOpResult: Send + Sync + 'static {}
//
impl<T: Send + Sync + 'static> AsyncOpResult for T {}


/// Process-unique identifier of an asynchronous operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(NonZeroU64);
//
impl OpId {
    /// Allocate a new identifier
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let mut id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        // Only reachable after 2^64 allocations, but zero is reserved
        if id == 0 {
            id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        }
        OpId(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }

    /// Numerical value of the identifier
    pub fn get(self) -> u64 {
        self.0.get()
    }
}
//
impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}


/// Asynchronous operation object
pub struct AsyncOp<T: AsyncOpResult> {
    /// Server interface used to drive the operation to completion
    server: AsyncOpServer<T>,

    /// Client interface used to monitor the operation
    client: AsyncOpClient<T>,
}
//
impl<T: AsyncOpResult> AsyncOp<T> {
    /// Create a new pending asynchronous operation
    pub fn new() -> Self {
        Self::with_options(CreationOptions::empty())
    }

    /// Create a new pending asynchronous operation with some options
    pub fn with_options(options: CreationOptions) -> Self {
        let state = SharedState::new(options, None);
        AsyncOp {
            server: AsyncOpServer::from_state(state.clone()),
            client: AsyncOpClient::from_state(state),
        }
    }

    /// Access the server interface
    pub fn server(&self) -> &AsyncOpServer<T> {
        &self.server
    }

    /// Access the client interface
    pub fn client(&self) -> &AsyncOpClient<T> {
        &self.client
    }

    /// Split the asynchronous operation object into server and client
    /// objects which can be respectively sent to producer and consumer threads
    pub fn split(self) -> (AsyncOpServer<T>, AsyncOpClient<T>) {
        (self.server, self.client)
    }
}
//
impl<T: AsyncOpResult> Default for AsyncOp<T> {
    fn default() -> Self {
        Self::new()
    }
}


// Layout of the packed status word
const STATUS_MASK: u32 = 0b111;
const RESERVED: u32 = 1 << 3;
const DISPOSED: u32 = 1 << 4;
const SYNCHRONOUS: u32 = 1 << 5;
const CANCEL_REQUESTED: u32 = 1 << 6;


/// Reason why a state transition was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Refusal {
    /// The operation has been disposed of
    Disposed,

    /// The operation was in the wrong status for this transition
    InvalidState(AsyncOpStatus),
}


/// Hook which cancels whatever a combinator currently depends on
pub(crate) type CancelHook = Arc<dyn IAsyncOpClient>;


/// State shared between the servers and clients of an operation
pub(crate) struct SharedState<T: AsyncOpResult> {
    /// Process-unique identifier
    id: OpId,

    /// Packed status and flags
    flags: AtomicU32,

    /// Last progress value, as f32 bits
    progress: AtomicU32,

    /// Options which the operation was created with
    options: CreationOptions,

    /// Final outcome, written once by the winner of the completion race
    outcome: OnceLock<Outcome<T>>,

    /// Callbacks waiting for progress updates and completion
    callbacks: CallbackRegistry<AsyncOpClient<T>>,

    /// Lazily allocated event for blocking waits
    wait_handle: WaitHandle,

    /// Sources which a combinator currently depends on
    cancel_hook: Mutex<Option<CancelHook>>,

    /// Number of live server handles
    servers: AtomicUsize,
}
//
impl<T: AsyncOpResult> SharedState<T> {
    /// Create the shared state of an operation, which may already be final
    pub fn new(options: CreationOptions,
               outcome: Option<Outcome<T>>) -> Arc<Self> {
        let state = SharedState {
            id: OpId::next(),
            flags: AtomicU32::new(AsyncOpStatus::Created as u32),
            progress: AtomicU32::new(0f32.to_bits()),
            options,
            outcome: OnceLock::new(),
            callbacks: CallbackRegistry::new(),
            wait_handle: WaitHandle::new(),
            cancel_hook: Mutex::new(None),
            servers: AtomicUsize::new(0),
        };
        if let Some(outcome) = outcome {
            // Nothing can be registered yet, so there is nothing to fire
            let status = outcome.status();
            let _ = state.outcome.set(outcome);
            let _ = state.callbacks.drain();
            state.progress.store(1f32.to_bits(), Ordering::Relaxed);
            state.flags.store(status as u32 | SYNCHRONOUS, Ordering::Release);
        }
        trace!(id = %state.id, "operation created");
        Arc::new(state)
    }

    /// Process-unique identifier
    pub fn id(&self) -> OpId {
        self.id
    }

    /// Options which the operation was created with
    pub fn options(&self) -> CreationOptions {
        self.options
    }

    /// Load the packed status word
    fn flags(&self) -> u32 {
        self.flags.load(Ordering::Acquire)
    }

    /// Current status
    pub fn status(&self) -> AsyncOpStatus {
        AsyncOpStatus::from_bits(self.flags() & STATUS_MASK)
    }

    /// Tell whether the operation was final from the start
    pub fn completed_synchronously(&self) -> bool {
        self.flags() & SYNCHRONOUS != 0
    }

    /// Tell whether the operation has been disposed of
    pub fn is_disposed(&self) -> bool {
        self.flags() & DISPOSED != 0
    }

    /// Tell whether someone asked for the operation to be canceled
    pub fn is_cancellation_requested(&self) -> bool {
        self.flags() & CANCEL_REQUESTED != 0
    }

    /// Current progress, 0 before running and 1 once final
    pub fn progress(&self) -> f32 {
        let status = self.status();
        if status.is_final() {
            1.0
        } else if status < AsyncOpStatus::Running {
            0.0
        } else {
            f32::from_bits(self.progress.load(Ordering::Acquire))
        }
    }

    /// Final outcome, if the operation is final
    pub fn outcome(&self) -> Option<&Outcome<T>> {
        if self.status().is_final() {
            self.outcome.get()
        } else {
            None
        }
    }

    /// Dispatch policy of this operation's callbacks
    pub fn dispatch_mode(&self) -> DispatchMode {
        if self.options
               .contains(CreationOptions::RUN_CONTINUATIONS_ASYNCHRONOUSLY) {
            DispatchMode::AlwaysPost
        } else {
            DispatchMode::PreferInline
        }
    }

    /// Move a pending operation forward to a later pending status
    pub fn try_advance(&self, target: AsyncOpStatus) -> Result<(), Refusal> {
        debug_assert!(target.is_pending());
        let mut current = self.flags();
        loop {
            if current & DISPOSED != 0 {
                return Err(Refusal::Disposed);
            }
            let status = AsyncOpStatus::from_bits(current & STATUS_MASK);
            if status >= target || current & RESERVED != 0 {
                return Err(Refusal::InvalidState(status));
            }
            let new = (current & !STATUS_MASK) | target as u32;
            match self.flags.compare_exchange_weak(current,
                                                   new,
                                                   Ordering::AcqRel,
                                                   Ordering::Acquire) {
                Ok(_) => {
                    trace!(id = %self.id, status = %target, "operation advanced");
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Update the progress of a running operation
    pub fn try_set_progress(&self, progress: f32) -> Result<(), Refusal> {
        let current = self.flags();
        if current & DISPOSED != 0 {
            return Err(Refusal::Disposed);
        }
        let status = AsyncOpStatus::from_bits(current & STATUS_MASK);
        if status != AsyncOpStatus::Running || current & RESERVED != 0 {
            return Err(Refusal::InvalidState(status));
        }
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.max(0.0).min(1.0)
        };
        self.progress.store(progress.to_bits(), Ordering::Release);
        self.callbacks.notify_progress(progress, self.dispatch_mode());
        Ok(())
    }

    /// Reserve the right to complete the operation
    fn try_reserve(&self) -> Result<(), Refusal> {
        let mut current = self.flags();
        loop {
            if current & DISPOSED != 0 {
                return Err(Refusal::Disposed);
            }
            let status = AsyncOpStatus::from_bits(current & STATUS_MASK);
            if status.is_final() || current & RESERVED != 0 {
                return Err(Refusal::InvalidState(status));
            }
            match self.flags.compare_exchange_weak(current,
                                                   current | RESERVED,
                                                   Ordering::AcqRel,
                                                   Ordering::Acquire) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Attempt to complete the operation with some outcome
    pub fn try_complete(self: &Arc<Self>,
                        outcome: Outcome<T>) -> Result<(), Refusal> {
        self.try_reserve()?;

        // We won the race, so nobody else may touch the outcome. Store it
        // before publishing the final status.
        let status = outcome.status();
        let _ = self.outcome.set(outcome);
        self.progress.store(1f32.to_bits(), Ordering::Release);
        let _ = self.flags.fetch_update(Ordering::AcqRel,
                                        Ordering::Acquire,
                                        |current| {
            Some((current & !(STATUS_MASK | RESERVED)) | status as u32)
        });
        trace!(id = %self.id, %status, "operation completed");

        // Release blocked threads, then whatever we were depending on
        self.wait_handle.signal();
        let hook = self.cancel_hook.lock().take();
        drop(hook);

        // Finally, run the callbacks
        if let Some(drained) = self.callbacks.drain() {
            let client = AsyncOpClient::from_state(self.clone());
            drained.fire(&client, self.dispatch_mode());
        }
        Ok(())
    }

    /// Record a cancellation request, cancel whatever the operation depends
    /// on, and cancel the operation itself unless this is suppressed
    pub fn request_cancel(self: &Arc<Self>) {
        // Final operations are immutable, so the request is dropped
        let recorded = self.flags.fetch_update(Ordering::AcqRel,
                                               Ordering::Acquire,
                                               |current| {
            let status = AsyncOpStatus::from_bits(current & STATUS_MASK);
            if status.is_final() {
                None
            } else {
                Some(current | CANCEL_REQUESTED)
            }
        });
        if recorded.is_err() {
            return;
        }
        debug!(id = %self.id, "cancellation requested");
        let hook = self.cancel_hook.lock().clone();
        if let Some(hook) = hook {
            hook.cancel();
        }
        if !self.options.contains(CreationOptions::SUPPRESS_CANCELLATION) {
            let _ = self.try_complete(Outcome::Canceled);
        }
    }

    /// Replace the sources which cancellation should propagate to
    ///
    /// If cancellation was already requested, the new sources are canceled
    /// right away.
    ///
    pub fn set_cancel_hook(&self, hook: CancelHook) {
        if self.status().is_pending() {
            *self.cancel_hook.lock() = Some(hook.clone());
        }
        if self.is_cancellation_requested() {
            hook.cancel();
        }
    }

    /// Block until the operation is final or the timeout elapses, and tell
    /// whether it is final
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        if self.status().is_final() {
            return true;
        }
        let event = self.wait_handle.event();
        // Completion may have been published before the event existed
        if self.status().is_final() {
            return true;
        }
        event.wait(timeout)
    }

    /// Register a completion callback, unless the operation is final
    pub fn try_add_completion(
        &self,
        callback: CompletionCallback<AsyncOpClient<T>>,
        executor: Option<ExecutorRef>
    ) -> Result<CallbackKey, CompletionCallback<AsyncOpClient<T>>> {
        if self.status().is_final() {
            return Err(callback);
        }
        self.callbacks.try_add_completion(callback, executor)
    }

    /// Register a progress callback, unless the operation is final
    pub fn try_add_progress(
        &self,
        callback: ProgressCallback,
        executor: Option<ExecutorRef>
    ) -> Result<CallbackKey, ProgressCallback> {
        if self.status().is_final() {
            return Err(callback);
        }
        self.callbacks.try_add_progress(callback, executor)
    }

    /// Unregister a callback
    pub fn remove_callback(&self, key: CallbackKey) -> bool {
        self.callbacks.remove(key)
    }

    /// Dispose of a final operation, releasing its wait handle
    pub fn dispose(&self) -> Result<(), Refusal> {
        let status = self.status();
        if !status.is_final() {
            return Err(Refusal::InvalidState(status));
        }
        let previous = self.flags.fetch_or(DISPOSED, Ordering::AcqRel);
        if previous & DISPOSED == 0 {
            self.wait_handle.release();
            trace!(id = %self.id, "operation disposed");
        }
        Ok(())
    }

    /// Tell whether a wait event is currently allocated
    #[cfg(test)]
    pub fn has_wait_event(&self) -> bool {
        self.wait_handle.is_allocated()
    }

    /// Account for a new server handle
    pub fn acquire_server(&self) {
        self.servers.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for a dropped server handle, faulting the operation if it was
    /// the last one and the operation is still pending
    pub fn release_server(self: &Arc<Self>) {
        if self.servers.fetch_sub(1, Ordering::AcqRel) == 1
           && self.status().is_pending() {
            if self.try_complete(Outcome::Faulted(OpError::Abandoned)).is_ok() {
                debug!(id = %self.id, "operation abandoned by its producers");
            }
        }
    }
}
