//! Callback-based asynchronous operation monitoring
//!
//! This module provides the registry which stores the callbacks attached to
//! an asynchronous operation. It is more flexible than polling and blocking
//! (which could technically be implemented on top of it), and can achieve
//! higher performance, but at the cost of somewhat higher code complexity.
//!
//! The registry accepts new callbacks until it is drained, which happens
//! exactly once, when the operation completes. Draining takes every callback
//! and marks the registry as drained in one step under the registry's lock,
//! so a callback which is registered concurrently with completion is either
//! taken by the drain, or refused at registration time and handed back to its
//! owner. It can never be lost, nor run twice.
//!
//! Progress notifications go through a gate which draining closes. Each
//! notification runs its callback while holding the gate, and skips it if
//! the gate is closed, so a stale progress update can never be observed after
//! the final one. Draining therefore waits for progress callbacks which are
//! running on other threads.
//!
//! Most operations carry zero to two callbacks (every combinator registers
//! one on its source), so callbacks are stored inline up to that count.

use crate::executor::{self, DispatchMode, ExecutorRef};
use parking_lot::{Mutex, ReentrantMutex};
use smallvec::SmallVec;
use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};


/// Callback which runs once, when an operation completes
pub type CompletionCallback<A> = Box<dyn FnOnce(&A) + Send + 'static>;


/// Callback which runs on every progress update
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync + 'static>;


/// Token identifying a registered callback, used to remove it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackKey(u64);


/// Registered completion callback
struct CompletionEntry<A> {
    key: CallbackKey,
    callback: CompletionCallback<A>,
    executor: Option<ExecutorRef>,
}


/// Registered progress callback
struct ProgressEntry {
    key: CallbackKey,
    callback: ProgressCallback,
    executor: Option<ExecutorRef>,
}


/// Inline storage for completion callbacks
type CompletionList<A> = SmallVec<[CompletionEntry<A>; 2]>;

/// Inline storage for progress callbacks
type ProgressList = SmallVec<[ProgressEntry; 1]>;


/// Gate of progress notifications, which holds true once closed
///
/// The mutex is reentrant because progress callbacks may complete their own
/// operation, which drains the registry from inside the gate.
///
type ProgressGate = Arc<ReentrantMutex<Cell<bool>>>;


/// Registry contents (mutex-protected)
struct RegistryState<A> {
    /// Set once the registry has been drained
    drained: bool,

    /// Callbacks to be run on completion, in registration order
    completion: CompletionList<A>,

    /// Callbacks to be run on progress updates, in registration order
    progress: ProgressList,
}


/// Callback registry of an asynchronous operation
///
/// The argument type `A` is what completion callbacks get to see, which for
/// operations is a client handle to the completed operation.
///
pub(crate) struct CallbackRegistry<A> {
    /// Registered callbacks
    state: Mutex<RegistryState<A>>,

    /// Source of callback keys
    next_key: AtomicU64,

    /// Closed when the registry is drained
    gate: ProgressGate,
}
//
impl<A> CallbackRegistry<A> {
    /// Create an empty registry
    pub fn new() -> Self {
        CallbackRegistry {
            state: Mutex::new(RegistryState {
                drained: false,
                completion: SmallVec::new(),
                progress: SmallVec::new(),
            }),
            next_key: AtomicU64::new(0),
            gate: Arc::new(ReentrantMutex::new(Cell::new(false))),
        }
    }

    /// Generate a key for a new callback
    fn new_key(&self) -> CallbackKey {
        CallbackKey(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    /// Attempt to register a completion callback, handing it back if the
    /// registry was already drained
    pub fn try_add_completion(
        &self,
        callback: CompletionCallback<A>,
        executor: Option<ExecutorRef>
    ) -> Result<CallbackKey, CompletionCallback<A>> {
        let mut state = self.state.lock();
        if state.drained {
            return Err(callback);
        }
        let key = self.new_key();
        state.completion.push(CompletionEntry { key, callback, executor });
        Ok(key)
    }

    /// Attempt to register a progress callback, handing it back if the
    /// registry was already drained
    pub fn try_add_progress(
        &self,
        callback: ProgressCallback,
        executor: Option<ExecutorRef>
    ) -> Result<CallbackKey, ProgressCallback> {
        let mut state = self.state.lock();
        if state.drained {
            return Err(callback);
        }
        let key = self.new_key();
        state.progress.push(ProgressEntry { key, callback, executor });
        Ok(key)
    }

    /// Unregister a callback, telling whether it was still registered
    pub fn remove(&self, key: CallbackKey) -> bool {
        let mut state = self.state.lock();
        if let Some(pos) = state.completion.iter().position(|e| e.key == key) {
            state.completion.remove(pos);
            return true;
        }
        if let Some(pos) = state.progress.iter().position(|e| e.key == key) {
            state.progress.remove(pos);
            return true;
        }
        false
    }

    /// Run every progress callback with a new progress value
    ///
    /// Callbacks are collected under the lock, but run outside of it so that
    /// they may register further callbacks. Notifications which are still
    /// pending when the registry is drained are dropped.
    ///
    pub fn notify_progress(&self, progress: f32, mode: DispatchMode) {
        let targets = {
            let state = self.state.lock();
            if state.drained {
                return;
            }
            state.progress
                 .iter()
                 .map(|e| (e.callback.clone(), e.executor.clone()))
                 .collect::<SmallVec<[_; 1]>>()
        };
        for (callback, executor) in targets {
            let gate = self.gate.clone();
            executor::dispatch(executor.as_ref(),
                               mode,
                               Box::new(move || {
                                   let closed = gate.lock();
                                   if !closed.get() {
                                       callback(progress);
                                   }
                               }));
        }
    }

    /// Take every callback and mark the registry as drained
    ///
    /// Only the first call gets the callbacks, later ones get None. This
    /// waits for progress callbacks which are running on other threads.
    ///
    pub fn drain(&self) -> Option<Drained<A>> {
        let gate = self.gate.lock();
        gate.set(true);
        let mut state = self.state.lock();
        if state.drained {
            return None;
        }
        state.drained = true;
        Some(Drained {
            completion: std::mem::take(&mut state.completion),
            progress: std::mem::take(&mut state.progress),
        })
    }

    /// Tell whether the registry has been drained
    #[cfg(test)]
    pub fn is_drained(&self) -> bool {
        self.state.lock().drained
    }

    /// Number of callbacks currently registered
    #[cfg(test)]
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.completion.len() + state.progress.len()
    }
}


/// Callbacks taken out of a registry when it was drained
pub(crate) struct Drained<A> {
    completion: CompletionList<A>,
    progress: ProgressList,
}
//
impl<A: Clone + Send + 'static> Drained<A> {
    /// Run the callbacks for the final transition
    ///
    /// Progress callbacks get to see the final progress of 1 before any
    /// completion callback runs. Within each group, registration order is
    /// preserved. Jobs which are posted to executors keep this order with
    /// respect to other jobs posted to the same executor.
    ///
    pub fn fire(self, arg: &A, mode: DispatchMode) {
        for entry in self.progress {
            let callback = entry.callback;
            executor::dispatch(entry.executor.as_ref(),
                               mode,
                               Box::new(move || callback(1.0)));
        }
        for entry in self.completion {
            let callback = entry.callback;
            let arg = arg.clone();
            executor::dispatch(entry.executor.as_ref(),
                               mode,
                               Box::new(move || callback(&arg)));
        }
    }
}
