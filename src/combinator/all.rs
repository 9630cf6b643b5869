//! Wait for every operation of a set
//!
//! `when_all` succeeds once every input has succeeded, with the results in
//! input order. The first input to fault or be canceled settles it early with
//! that outcome, and the remaining inputs are left to run to their own
//! natural completion. Canceling the resulting operation cancels every input.

use crate::client::AsyncOpClient;
use crate::combinator::link;
use crate::error::OpError;
use crate::op::{AsyncOp, AsyncOpResult};
use crate::status::Outcome;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;


/// Build an operation which completes when every input has succeeded, or as
/// soon as one input fails
///
/// An empty set of inputs succeeds right away, with no results.
///
pub fn when_all<T, I>(ops: I) -> AsyncOpClient<Vec<T>>
    where T: AsyncOpResult + Clone,
          I: IntoIterator<Item = AsyncOpClient<T>>
{
    let ops = ops.into_iter().collect::<Vec<_>>();
    if ops.is_empty() {
        return AsyncOpClient::from_result(Vec::new());
    }

    let (server, result) = AsyncOp::<Vec<T>>::new().split();
    link(&server, ops.clone());
    let remaining = Arc::new(AtomicUsize::new(ops.len()));
    for op in ops.iter() {
        let server = server.clone();
        let remaining = remaining.clone();
        let inputs = ops.clone();
        op.add_completion_callback(move |op: &AsyncOpClient<T>| {
            match op.outcome() {
                Some(Outcome::Success(_)) => {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        server.try_set_result(collect_results(&inputs));
                    }
                }
                Some(failure) => {
                    if server.try_set_outcome(failure.failure()) {
                        debug!(input = %op.id(), "when_all settled early");
                    }
                }
                None => {}
            }
        }, None);
    }
    result
}

/// Gather the results of a set of operations which all succeeded
fn collect_results<T: AsyncOpResult + Clone>(ops: &[AsyncOpClient<T>]) -> Vec<T> {
    ops.iter()
       .filter_map(|op| op.outcome().and_then(|o| o.as_result().ok()))
       .cloned()
       .collect()
}


impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Once this operation succeeds, start a set of operations and wait for
    /// all of them
    pub fn then_all<U, F>(&self, step: F) -> AsyncOpClient<Vec<U>>
        where U: AsyncOpResult + Clone,
              F: FnOnce(&T) -> Result<Vec<AsyncOpClient<U>>, OpError>
                 + Send + 'static
    {
        self.then(move |value| step(value).map(when_all))
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::combinator::all::*;
    use crate::server::AsyncOpServer;

    /// Build a few pending operations
    fn pending(count: usize) -> (Vec<AsyncOpServer<u32>>, Vec<AsyncOpClient<u32>>) {
        (0..count).map(|_| AsyncOp::<u32>::new().split()).unzip()
    }

    /// Check that results come out in input order
    #[test]
    fn input_order() {
        let (servers, clients) = pending(3);
        let all = when_all(clients);
        servers[2].set_result(30).unwrap();
        servers[0].set_result(10).unwrap();
        assert!(!all.is_completed());
        servers[1].set_result(20).unwrap();
        assert_eq!(*all.result().unwrap(), vec![10, 20, 30]);
    }

    /// Check that the first failure settles the aggregate without canceling
    /// the other inputs
    #[test]
    fn early_failure() {
        let (servers, clients) = pending(3);
        let all = when_all(clients.clone());
        let error = OpError::msg("second input failed");
        servers[1].set_exception(error.clone()).unwrap();
        assert_eq!(all.exception(), Some(error));

        // The other inputs still run to their natural completion
        assert!(!clients[0].is_completed());
        assert!(!servers[0].is_cancellation_requested());
        servers[0].set_result(1).unwrap();
        servers[2].set_result(3).unwrap();
        assert!(clients[0].is_completed_successfully());
        assert!(clients[2].is_completed_successfully());
        assert!(all.is_faulted());
    }

    /// Check edge cases of input sets
    #[test]
    fn edge_cases() {
        let empty = when_all(Vec::<AsyncOpClient<u32>>::new());
        assert_eq!(*empty.result().unwrap(), Vec::<u32>::new());

        let done = when_all((1..4).map(AsyncOpClient::from_result));
        assert_eq!(*done.result().unwrap(), vec![1, 2, 3]);

        let canceled = when_all(vec![AsyncOpClient::from_result(1u32),
                                     AsyncOpClient::canceled()]);
        assert!(canceled.is_canceled());
    }

    /// Check that canceling the aggregate cancels every input
    #[test]
    fn cancel_inputs() {
        let (servers, clients) = pending(2);
        let all = when_all(clients.clone());
        all.cancel();
        assert!(all.is_canceled());
        assert!(clients.iter().all(AsyncOpClient::is_canceled));
        assert!(servers.iter().all(AsyncOpServer::is_cancellation_requested));
    }

    /// Check then_all
    #[test]
    fn then_all() {
        let all = AsyncOpClient::from_result(3u32).then_all(|&count| {
            Ok((0..count).map(|i| AsyncOpClient::from_result(i * 10)).collect())
        });
        assert_eq!(*all.result().unwrap(), vec![0, 10, 20]);
    }
}
