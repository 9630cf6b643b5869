//! Blocking-based asynchronous operation monitoring
//!
//! This module provides a way to monitor asynchronous operations by blocking
//! until they complete. This synchronization mechanism is easy to use and
//! reason about, but should be used with care as the unpredictable
//! application delays that it introduces can be harmful to performance.
//!
//! Most operations are never waited for, so the event which blocked threads
//! park on is only allocated on first use.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};


/// One-shot event which blocked threads wait on
pub(crate) struct WaitEvent {
    /// Whether the event has been signaled (mutex-protected)
    signaled: Mutex<bool>,

    /// Condition variable used to wake up waiting threads
    signal_cv: Condvar,
}
//
impl WaitEvent {
    /// Create an event which has not been signaled yet
    fn new() -> Self {
        WaitEvent {
            signaled: Mutex::new(false),
            signal_cv: Condvar::new(),
        }
    }

    /// Signal the event, releasing every thread which waits on it
    pub fn set(&self) {
        *self.signaled.lock() = true;
        self.signal_cv.notify_all();
    }

    /// Block until the event is signaled or the timeout elapses, and tell
    /// whether the event was signaled
    ///
    /// Timeouts which reach past the representable future wait forever.
    ///
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut signaled = self.signaled.lock();
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        match deadline {
            None => {
                while !*signaled {
                    self.signal_cv.wait(&mut signaled);
                }
                true
            }
            Some(deadline) => {
                while !*signaled {
                    if self.signal_cv
                           .wait_until(&mut signaled, deadline)
                           .timed_out() {
                        return *signaled;
                    }
                }
                true
            }
        }
    }
}


/// Lazily allocated wait handle of an asynchronous operation
///
/// Completion must be published before `signal()` is called, and waiters
/// must check for completion after `event()` returns. Since both go through
/// the same lock, either the waiter sees the completion or the completing
/// thread sees the event, so no wake-up can be missed.
///
pub(crate) struct WaitHandle {
    /// Event, if anyone asked for it and it was not released yet
    slot: Mutex<Option<Arc<WaitEvent>>>,
}
//
impl WaitHandle {
    /// Create a wait handle, without allocating its event
    pub fn new() -> Self {
        WaitHandle { slot: Mutex::new(None) }
    }

    /// Access the event, allocating it if needed
    pub fn event(&self) -> Arc<WaitEvent> {
        self.slot
            .lock()
            .get_or_insert_with(|| Arc::new(WaitEvent::new()))
            .clone()
    }

    /// Signal the event, if it was ever allocated
    pub fn signal(&self) {
        let event = self.slot.lock().clone();
        if let Some(event) = event {
            event.set();
        }
    }

    /// Release the event
    pub fn release(&self) {
        self.slot.lock().take();
    }

    /// Tell whether the event is currently allocated
    #[cfg(test)]
    pub fn is_allocated(&self) -> bool {
        self.slot.lock().is_some()
    }
}
