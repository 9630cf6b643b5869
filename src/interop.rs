//! Bridges between asynchronous operations and the `futures` ecosystem
//!
//! Operations can be turned into a `futures` oneshot channel, by wiring their
//! completion into the sending side, and any future (including a oneshot
//! receiver) can be turned into an operation. Since this crate has no
//! scheduler of its own, the latter direction hands out a driver future,
//! which the caller must spawn on the executor of their choice. Canceling the
//! operation aborts the driver, and dropping the driver without running it to
//! completion abandons the operation.

use crate::client::{AsyncOpClient, IAsyncOpClient};
use crate::error::OpError;
use crate::op::{AsyncOp, AsyncOpResult};
use futures::channel::oneshot;
use futures::future::{self, AbortHandle};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};


/// Future which drives an operation built out of some other future
#[must_use = "the operation only makes progress while its driver is polled"]
pub struct OpDriver {
    inner: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
}
//
impl Future for OpDriver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<()> {
        self.inner.as_mut().poll(cx)
    }
}
//
impl fmt::Debug for OpDriver {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "OpDriver")
    }
}


/// Cancellation hook which aborts a driver
struct AbortOnCancel(AbortHandle);
//
impl IAsyncOpClient for AbortOnCancel {
    fn cancel(&self) {
        self.0.abort();
    }
}


impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Build an operation which completes with the output of a future
    ///
    /// The returned driver must be polled to completion for the operation to
    /// complete. The operation is marked as running when the driver is first
    /// polled.
    ///
    pub fn from_future<F>(future: F) -> (AsyncOpClient<T>, OpDriver)
        where F: Future<Output = Result<T, OpError>> + Send + 'static
    {
        let (server, client) = AsyncOp::<T>::new().split();
        let (future, abort_handle) = future::abortable(future);
        client.state().set_cancel_hook(Arc::new(AbortOnCancel(abort_handle)));
        let driver = OpDriver {
            inner: Box::pin(async move {
                server.try_set_running();
                match future.await {
                    Ok(result) => server.try_set_outcome(result.into()),
                    Err(future::Aborted) => server.try_set_canceled(),
                };
            }),
        };
        (client, driver)
    }

    /// Build an operation which completes with whatever is sent through a
    /// oneshot channel
    ///
    /// If the sender is dropped without sending anything, the operation is
    /// canceled.
    ///
    pub fn from_receiver(receiver: oneshot::Receiver<Result<T, OpError>>)
        -> (AsyncOpClient<T>, OpDriver)
    {
        Self::from_future(async move {
            receiver.await.unwrap_or(Err(OpError::Canceled))
        })
    }
}
//
impl<T: AsyncOpResult + Clone> AsyncOpClient<T> {
    /// Wire the completion of this operation into a oneshot channel
    pub fn into_receiver(self) -> oneshot::Receiver<Result<T, OpError>> {
        let (sender, receiver) = oneshot::channel();
        self.add_completion_callback(move |op: &AsyncOpClient<T>| {
            if let Some(outcome) = op.outcome() {
                // The receiver may have lost interest, which is fine
                let _ = sender.send(outcome.clone().into_result());
            }
        }, None);
        receiver
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::interop::*;
    use crate::status::AsyncOpStatus;
    use futures::executor::block_on;

    /// Round-trip an operation through a oneshot channel
    fn round_trip(op: AsyncOpClient<u32>) -> AsyncOpClient<u32> {
        let (back, driver) = AsyncOpClient::from_receiver(op.into_receiver());
        block_on(driver);
        back
    }

    /// Check that round trips preserve every kind of outcome
    #[test]
    fn round_trips() {
        let success = round_trip(AsyncOpClient::from_result(17));
        assert_eq!(*success.result().unwrap(), 17);

        let error = OpError::msg("lost");
        let failure = round_trip(AsyncOpClient::from_error(error.clone()));
        assert!(failure.is_faulted());
        assert_eq!(failure.exception(), Some(error));

        let canceled = round_trip(AsyncOpClient::canceled());
        assert!(canceled.is_canceled());
    }

    /// Check that a pending operation feeds its receiver on completion
    #[test]
    fn pending_to_receiver() {
        let (server, client) = AsyncOp::<u32>::new().split();
        let receiver = client.into_receiver();
        server.set_result(5).unwrap();
        assert_eq!(block_on(receiver).unwrap(), Ok(5));
    }

    /// Check operations built out of plain futures
    #[test]
    fn from_plain_future() {
        let (op, driver) = AsyncOpClient::from_future(async { Ok(8u32) });
        assert_eq!(op.status(), AsyncOpStatus::Created);
        block_on(driver);
        assert_eq!(*op.result().unwrap(), 8);
    }

    /// Check that dropping the sender cancels the operation
    #[test]
    fn dropped_sender() {
        let (sender, receiver) = oneshot::channel::<Result<u32, OpError>>();
        let (op, driver) = AsyncOpClient::from_receiver(receiver);
        drop(sender);
        block_on(driver);
        assert!(op.is_canceled());
    }

    /// Check that canceling the operation aborts the driver
    #[test]
    fn cancel_aborts_driver() {
        let (_sender, receiver) = oneshot::channel::<Result<u32, OpError>>();
        let (op, driver) = AsyncOpClient::from_receiver(receiver);
        op.cancel();
        assert!(op.is_canceled());

        // The driver finishes even though nothing was ever sent
        block_on(driver);
    }

    /// Check that an unpolled driver abandons its operation
    #[test]
    fn dropped_driver() {
        let (op, driver) = AsyncOpClient::<u32>::from_future(async { Ok(1) });
        drop(driver);
        assert_eq!(op.result(), Err(OpError::Abandoned));
    }
}
