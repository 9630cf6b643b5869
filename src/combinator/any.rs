//! Wait for the first operation of a set
//!
//! `when_any` completes with the outcome of whichever input completes first,
//! be it success, failure or cancellation. The other inputs keep running.

use crate::client::AsyncOpClient;
use crate::combinator::link;
use crate::error::{OpError, UsageError};
use crate::op::{AsyncOp, AsyncOpResult};
use tracing::trace;


/// Build an operation which completes with the outcome of the first input
/// to complete
///
/// There is no sensible outcome for an empty set of inputs, so this is
/// reported as a usage error.
///
pub fn when_any<T, I>(ops: I) -> Result<AsyncOpClient<T>, UsageError>
    where T: AsyncOpResult + Clone,
          I: IntoIterator<Item = AsyncOpClient<T>>
{
    let ops = ops.into_iter().collect::<Vec<_>>();
    if ops.is_empty() {
        return Err(UsageError::InvalidArgument(
            "when_any needs at least one operation"
        ));
    }

    let (server, result) = AsyncOp::<T>::new().split();
    link(&server, ops.clone());
    for op in ops.iter() {
        let server = server.clone();
        op.add_completion_callback(move |op: &AsyncOpClient<T>| {
            if let Some(outcome) = op.outcome() {
                if server.try_set_outcome(outcome.clone()) {
                    trace!(winner = %op.id(), "when_any settled");
                }
            }
        }, None);
    }
    Ok(result)
}


impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Once this operation succeeds, start a set of operations and wait for
    /// the first of them
    ///
    /// If the step produces no operation, the resulting operation faults with
    /// the corresponding usage error.
    ///
    pub fn then_any<U, F>(&self, step: F) -> AsyncOpClient<U>
        where U: AsyncOpResult + Clone,
              F: FnOnce(&T) -> Result<Vec<AsyncOpClient<U>>, OpError>
                 + Send + 'static
    {
        self.then(move |value| {
            step(value).and_then(|ops| when_any(ops).map_err(OpError::new))
        })
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::combinator::any::*;
    use std::thread;
    use std::time::Duration;

    /// Check that the fastest operation wins
    #[test]
    fn first_wins() {
        let (fast_server, fast) = AsyncOp::<&'static str>::new().split();
        let (slow_server, slow) = AsyncOp::<&'static str>::new().split();
        let any = when_any(vec![fast.clone(), slow.clone()]).unwrap();

        let fast_worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(1));
            fast_server.set_result("fast").unwrap();
        });
        let slow_worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            slow_server.set_result("slow").unwrap();
        });

        assert_eq!(*any.result().unwrap(), "fast");
        assert!(fast.is_completed());
        fast_worker.join().unwrap();
        slow_worker.join().unwrap();
        assert_eq!(*any.result().unwrap(), "fast");
    }

    /// Check that failures and cancellations win too
    #[test]
    fn any_outcome_wins() {
        let (_server, pending) = AsyncOp::<u32>::new().split();
        let error = OpError::msg("first to finish");
        let any = when_any(vec![pending.clone(),
                                AsyncOpClient::from_error(error.clone())])
            .unwrap();
        assert_eq!(any.exception(), Some(error));
        assert!(!pending.is_completed());

        let any = when_any(vec![AsyncOpClient::<u32>::canceled()]).unwrap();
        assert!(any.is_canceled());
    }

    /// Check that an empty set of inputs is rejected
    #[test]
    fn empty() {
        assert_eq!(when_any(Vec::<AsyncOpClient<u32>>::new()).unwrap_err(),
                   UsageError::InvalidArgument(
                       "when_any needs at least one operation"
                   ));
    }

    /// Check then_any
    #[test]
    fn then_any() {
        let (_server, pending) = AsyncOp::<u32>::new().split();
        let any = AsyncOpClient::from_result(()).then_any(move |_| {
            Ok(vec![pending, AsyncOpClient::from_result(4)])
        });
        assert_eq!(*any.result().unwrap(), 4);

        let none = AsyncOpClient::from_result(())
            .then_any(|_| Ok(Vec::<AsyncOpClient<u32>>::new()));
        assert!(none.is_faulted());
        assert!(none.exception()
                    .unwrap()
                    .downcast_ref::<UsageError>()
                    .is_some());
    }
}
