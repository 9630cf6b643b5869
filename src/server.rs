//! Asynchronous operation server interface
//!
//! The server (controller) interface is the only way for a producer to drive
//! an asynchronous operation through its states. Every state transition comes
//! in two flavors:
//!
//! - `set_xyz()` reports an illegal transition as a `UsageError`. It is meant
//!   for producers which expect to be the only writer, so that bugs surface.
//! - `try_set_xyz()` reports an illegal transition by returning false, and
//!   never fails otherwise, even on a disposed operation. It is meant for
//!   producers which race each other to complete the same operation.
//!
//! If every server of a pending operation is dropped, the operation faults
//! with `OpError::Abandoned`, so that clients do not hang forever.

use crate::client::AsyncOpClient;
use crate::error::{OpError, UsageError};
use crate::op::{AsyncOpResult, OpId, Refusal, SharedState};
use crate::status::{AsyncOpStatus, Outcome};
use std::fmt;
use std::sync::Arc;


/// Server interface, used to drive an asynchronous operation to completion
pub struct AsyncOpServer<T: AsyncOpResult> {
    /// Reference-counted shared state
    state: Arc<SharedState<T>>,
}
//
impl<T: AsyncOpResult> AsyncOpServer<T> {
    /// Wrap some shared state
    pub(crate) fn from_state(state: Arc<SharedState<T>>) -> Self {
        state.acquire_server();
        AsyncOpServer { state }
    }

    /// Access the shared state
    pub(crate) fn state(&self) -> &Arc<SharedState<T>> {
        &self.state
    }

    /// Process-unique identifier of the operation
    pub fn id(&self) -> OpId {
        self.state.id()
    }

    /// Current status of the operation
    pub fn status(&self) -> AsyncOpStatus {
        self.state.status()
    }

    /// Build a client interface to the operation
    pub fn client(&self) -> AsyncOpClient<T> {
        AsyncOpClient::from_state(self.state.clone())
    }

    /// Check if a client requested the cancellation of the operation
    ///
    /// Producers should check this periodically, and terminate early when
    /// reasonably feasible.
    ///
    pub fn is_cancellation_requested(&self) -> bool {
        self.state.is_cancellation_requested()
    }

    /// Translate a refused transition into a usage error
    fn usage_error(&self, refusal: Refusal, action: &'static str) -> UsageError {
        match refusal {
            Refusal::Disposed => UsageError::Disposed { id: self.id() },
            Refusal::InvalidState(status) => UsageError::InvalidState {
                id: self.id(),
                status,
                action,
            },
        }
    }

    /// Mark the operation as scheduled
    pub fn set_scheduled(&self) -> Result<(), UsageError> {
        self.state
            .try_advance(AsyncOpStatus::Scheduled)
            .map_err(|r| self.usage_error(r, "schedule"))
    }

    /// Attempt to mark the operation as scheduled
    pub fn try_set_scheduled(&self) -> bool {
        self.state.try_advance(AsyncOpStatus::Scheduled).is_ok()
    }

    /// Mark the operation as running
    pub fn set_running(&self) -> Result<(), UsageError> {
        self.state
            .try_advance(AsyncOpStatus::Running)
            .map_err(|r| self.usage_error(r, "start"))
    }

    /// Attempt to mark the operation as running
    pub fn try_set_running(&self) -> bool {
        self.state.try_advance(AsyncOpStatus::Running).is_ok()
    }

    /// Update the progress of a running operation, clamped to [0, 1]
    pub fn set_progress(&self, progress: f32) -> Result<(), UsageError> {
        self.state
            .try_set_progress(progress)
            .map_err(|r| self.usage_error(r, "report progress of"))
    }

    /// Attempt to update the progress of a running operation
    pub fn try_set_progress(&self, progress: f32) -> bool {
        self.state.try_set_progress(progress).is_ok()
    }

    /// Complete the operation with some outcome
    pub fn set_outcome(&self, outcome: Outcome<T>) -> Result<(), UsageError> {
        self.state
            .try_complete(outcome)
            .map_err(|r| self.usage_error(r, "complete"))
    }

    /// Attempt to complete the operation with some outcome
    pub fn try_set_outcome(&self, outcome: Outcome<T>) -> bool {
        self.state.try_complete(outcome).is_ok()
    }

    /// Complete the operation successfully with some result
    pub fn set_result(&self, value: T) -> Result<(), UsageError> {
        self.set_outcome(Outcome::Success(value))
    }

    /// Attempt to complete the operation successfully with some result
    pub fn try_set_result(&self, value: T) -> bool {
        self.try_set_outcome(Outcome::Success(value))
    }

    /// Complete the operation as canceled
    pub fn set_canceled(&self) -> Result<(), UsageError> {
        self.set_outcome(Outcome::Canceled)
    }

    /// Attempt to complete the operation as canceled
    pub fn try_set_canceled(&self) -> bool {
        self.try_set_outcome(Outcome::Canceled)
    }

    /// Complete the operation as failed
    ///
    /// A cancellation error completes the operation as canceled instead.
    ///
    pub fn set_exception(&self, error: OpError) -> Result<(), UsageError> {
        self.set_outcome(Outcome::from_error(error))
    }

    /// Attempt to complete the operation as failed
    pub fn try_set_exception(&self, error: OpError) -> bool {
        self.try_set_outcome(Outcome::from_error(error))
    }
}
//
impl AsyncOpServer<()> {
    /// Complete a result-less operation successfully
    pub fn set_completed(&self) -> Result<(), UsageError> {
        self.set_result(())
    }

    /// Attempt to complete a result-less operation successfully
    pub fn try_set_completed(&self) -> bool {
        self.try_set_result(())
    }
}
//
impl<T: AsyncOpResult> Clone for AsyncOpServer<T> {
    fn clone(&self) -> Self {
        Self::from_state(self.state.clone())
    }
}
//
impl<T: AsyncOpResult> Drop for AsyncOpServer<T> {
    /// If every server is dropped before the operation has reached its final
    /// status, notify clients in order to prevent them from hanging
    fn drop(&mut self) {
        self.state.release_server();
    }
}
//
impl<T: AsyncOpResult> fmt::Debug for AsyncOpServer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AsyncOpServer")
         .field("id", &self.id())
         .field("status", &self.status())
         .finish()
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::op::AsyncOp;
    use crate::server::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Check the forward-only pending transitions
    #[test]
    fn pending_transitions() {
        let (server, client) = AsyncOp::<()>::new().split();
        server.set_scheduled().unwrap();
        assert_eq!(client.status(), AsyncOpStatus::Scheduled);
        assert!(!server.try_set_scheduled());
        server.set_running().unwrap();
        assert_eq!(client.status(), AsyncOpStatus::Running);
        match server.set_scheduled() {
            Err(UsageError::InvalidState { status, action, .. }) => {
                assert_eq!(status, AsyncOpStatus::Running);
                assert_eq!(action, "schedule");
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(!server.try_set_running());

        // Running may also be reached straight from Created
        let (server, _client) = AsyncOp::<()>::new().split();
        assert!(server.try_set_running());
    }

    /// Check progress reporting rules
    #[test]
    fn progress() {
        let (server, client) = AsyncOp::<()>::new().split();
        assert!(server.set_progress(0.5).is_err());
        assert!(!server.try_set_progress(0.5));
        assert_eq!(client.progress(), 0.0);

        server.set_running().unwrap();
        server.set_progress(-1.0).unwrap();
        assert_eq!(client.progress(), 0.0);
        server.set_progress(2.0).unwrap();
        assert_eq!(client.progress(), 1.0);
        server.set_progress(0.25).unwrap();
        assert_eq!(client.progress(), 0.25);

        server.set_completed().unwrap();
        assert_eq!(client.progress(), 1.0);
        assert!(!server.try_set_progress(0.3));
    }

    /// Check that exactly one completion succeeds
    #[test]
    fn single_completion() {
        let (server, client) = AsyncOp::<u32>::new().split();
        assert!(server.try_set_result(1));
        assert!(!server.try_set_result(2));
        assert!(!server.try_set_canceled());
        assert!(!server.try_set_exception(OpError::msg("late")));
        assert!(server.set_result(3).is_err());
        assert!(server.set_canceled().is_err());
        assert!(server.set_exception(OpError::msg("late")).is_err());
        assert_eq!(*client.result().unwrap(), 1);
    }

    /// Check that a cancellation error cancels rather than faults
    #[test]
    fn exception_as_cancellation() {
        let (server, client) = AsyncOp::<()>::new().split();
        server.set_exception(OpError::Canceled).unwrap();
        assert!(client.is_canceled());
        assert!(!client.is_faulted());
    }

    /// Check disposal of the operation behind a server
    #[test]
    fn disposed() {
        let (server, client) = AsyncOp::<()>::new().split();
        server.set_completed().unwrap();
        client.dispose().unwrap();
        assert_eq!(server.set_completed(),
                   Err(UsageError::Disposed { id: server.id() }));
        assert_eq!(server.set_running(),
                   Err(UsageError::Disposed { id: server.id() }));
        assert!(!server.try_set_completed());
        assert!(!server.try_set_canceled());
    }

    /// Check that racing producers agree on a single winner
    #[test]
    fn racing_producers() {
        for _ in 0..20 {
            let (server, client) = AsyncOp::<usize>::new().split();
            let fired = Arc::new(AtomicUsize::new(0));
            let c_fired = fired.clone();
            client.add_completion_callback(move |_| {
                c_fired.fetch_add(1, Ordering::AcqRel);
            }, None);

            let producers = (0..4).map(|i| {
                let c_server = server.clone();
                thread::spawn(move || {
                    if i % 2 == 0 {
                        c_server.try_set_result(i)
                    } else {
                        c_server.try_set_exception(OpError::msg("racer"))
                    }
                })
            }).collect::<Vec<_>>();
            let winners = producers.into_iter()
                                   .map(|p| p.join().unwrap())
                                   .filter(|won| *won)
                                   .count();
            assert_eq!(winners, 1);
            assert!(client.is_completed());
            assert_eq!(fired.load(Ordering::Acquire), 1);
        }
    }
}
