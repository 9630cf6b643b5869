//! Suspension-syntax adapters for asynchronous operations
//!
//! Language-level suspension needs three things from an asynchronous
//! operation: a way to tell whether suspending is needed at all, a place to
//! park the suspended flow until the operation completes, and a way to fetch
//! the result (or re-raise the failure) once resumed. The `Awaiter` provides
//! exactly that, while `OpFuture` plugs operations into Rust's own `async`
//! and `.await` machinery.
//!
//! Unlike plain completion callbacks, awaiter continuations are always posted
//! to their executor rather than inlined into the completing thread, because
//! inlining into someone else's continuation chain can grow the stack without
//! bound.

use crate::client::AsyncOpClient;
use crate::error::OpError;
use crate::executor::{self, DispatchMode, ExecutorRef};
use crate::multithread::callback::CallbackKey;
use crate::op::AsyncOpResult;
use parking_lot::Mutex;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};


/// Awaiter adapter of an asynchronous operation
#[derive(Debug)]
pub struct Awaiter<T: AsyncOpResult> {
    /// Operation which is being awaited
    op: AsyncOpClient<T>,

    /// Where continuations should resume, if anywhere in particular
    executor: Option<ExecutorRef>,
}
//
impl<T: AsyncOpResult> Awaiter<T> {
    /// Check if the operation is complete, in which case there is no need to
    /// suspend
    pub fn is_completed(&self) -> bool {
        self.op.is_completed()
    }

    /// Park a continuation until the operation completes
    ///
    /// The continuation is posted to the awaiter's executor, if it has one,
    /// even if the operation is already complete or completes on a thread
    /// which belongs to that executor. Without an executor, it runs on
    /// whichever thread completes the operation.
    ///
    pub fn on_completed<F>(&self, continuation: F)
        where F: FnOnce() + Send + 'static
    {
        let executor = self.executor.clone();
        let resume = move |_: &AsyncOpClient<T>| {
            executor::dispatch(executor.as_ref(),
                               DispatchMode::AlwaysPost,
                               Box::new(continuation));
        };
        if let Err(resume) = self.op.try_add_completion_callback(resume, None) {
            resume(&self.op);
        }
    }

    /// Fetch the result of the operation, re-raising its failure if any
    ///
    /// This blocks if the operation is not complete yet.
    ///
    pub fn get_result(&self) -> Result<&T, OpError> {
        self.op.result()
    }
}


/// Future which resolves when an asynchronous operation completes
#[derive(Debug)]
pub struct OpFuture<T: AsyncOpResult> {
    /// Operation which is being awaited
    op: AsyncOpClient<T>,

    /// Waker of the task which last polled us
    waker: Arc<Mutex<Option<Waker>>>,

    /// Completion callback which wakes the task, once registered
    key: Option<CallbackKey>,
}
//
impl<T: AsyncOpResult + Clone> Future for OpFuture<T> {
    type Output = Result<T, OpError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.op.outcome() {
            return Poll::Ready(outcome.clone().into_result());
        }

        // Make sure that the latest waker gets woken up
        *this.waker.lock() = Some(cx.waker().clone());
        if this.key.is_none() {
            let slot = this.waker.clone();
            let wake = move |_: &AsyncOpClient<T>| {
                let waker = slot.lock().take();
                if let Some(waker) = waker {
                    waker.wake();
                }
            };
            if let Ok(key) = this.op.try_add_completion_callback(wake, None) {
                this.key = Some(key);
            }
        }

        // The wake callback may have fired before the new waker was stored
        match this.op.outcome() {
            Some(outcome) => Poll::Ready(outcome.clone().into_result()),
            None => Poll::Pending,
        }
    }
}
//
impl<T: AsyncOpResult> Drop for OpFuture<T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.op.remove_callback(key);
        }
    }
}


impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Build an awaiter whose continuations run where the operation
    /// completes
    pub fn awaiter(&self) -> Awaiter<T> {
        Awaiter { op: self.clone(), executor: None }
    }

    /// Build an awaiter whose continuations are posted to some executor
    pub fn awaiter_on(&self, executor: ExecutorRef) -> Awaiter<T> {
        Awaiter { op: self.clone(), executor: Some(executor) }
    }
}
//
impl<T: AsyncOpResult + Clone> IntoFuture for AsyncOpClient<T> {
    type Output = Result<T, OpError>;
    type IntoFuture = OpFuture<T>;

    fn into_future(self) -> OpFuture<T> {
        OpFuture {
            op: self,
            waker: Arc::new(Mutex::new(None)),
            key: None,
        }
    }
}
