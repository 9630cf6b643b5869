//! Retry combinator: re-run a failing operation according to a policy
//!
//! An operation factory is invoked once, and invoked again each time the
//! operation it produced faults, until one attempt succeeds or the policy
//! runs out of retries. In the latter case, the last failure is reported.
//! Cancellation is never retried. Errors returned by the factory itself, and
//! panics inside it, count as failed attempts.
//!
//! There is no timer in this crate, so retries happen as soon as the failure
//! is observed. Factories which need a backoff can build it into the
//! operations that they produce.

use crate::client::AsyncOpClient;
use crate::combinator::{guarded, link};
use crate::error::OpError;
use crate::op::{AsyncOp, AsyncOpResult};
use crate::server::AsyncOpServer;
use crate::status::Outcome;
use tracing::debug;


/// Policy for retrying failed operations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt, or None for no
    /// limit at all
    pub max_retries: Option<u32>,
}
//
impl RetryPolicy {
    /// Allow some number of retries after the first attempt
    pub const fn new(max_retries: u32) -> Self {
        RetryPolicy { max_retries: Some(max_retries) }
    }

    /// Retry for as long as attempts keep failing
    pub const fn unlimited() -> Self {
        RetryPolicy { max_retries: None }
    }

    /// Never retry
    pub const fn never() -> Self {
        Self::new(0)
    }

    /// Check if another retry is allowed after some number of retries
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        self.max_retries.map_or(true, |max| retries_so_far < max)
    }
}
//
impl Default for RetryPolicy {
    /// Three retries, for up to four attempts in total
    fn default() -> Self {
        Self::new(3)
    }
}


/// Build an operation which retries a failing operation factory
pub fn retry<T, F>(factory: F, policy: RetryPolicy) -> AsyncOpClient<T>
    where T: AsyncOpResult + Clone,
          F: FnMut() -> Result<AsyncOpClient<T>, OpError> + Send + 'static
{
    let (server, result) = AsyncOp::<T>::new().split();
    Retrier { factory, policy, retries: 0, server }.run();
    result
}


/// State of an ongoing retry loop
struct Retrier<T: AsyncOpResult, F> {
    /// Source of new attempts
    factory: F,

    /// When to give up
    policy: RetryPolicy,

    /// Number of retries performed so far
    retries: u32,

    /// Operation reporting the final outcome
    server: AsyncOpServer<T>,
}
//
impl<T, F> Retrier<T, F>
    where T: AsyncOpResult + Clone,
          F: FnMut() -> Result<AsyncOpClient<T>, OpError> + Send + 'static
{
    /// Start attempts until one is pending or the outcome is known
    ///
    /// Attempts which complete synchronously are handled in a loop, so that
    /// a factory which keeps failing immediately does not grow the stack.
    ///
    fn run(mut self) {
        loop {
            if self.server.status().is_final() {
                return;
            }
            let factory = &mut self.factory;
            let attempt = match guarded(|| factory()) {
                Ok(attempt) => attempt,
                Err(error) => {
                    if self.settle(Outcome::Faulted(error)) {
                        continue;
                    }
                    return;
                }
            };
            link(&self.server, attempt.clone());
            match attempt.outcome() {
                Some(outcome) => {
                    if self.settle(outcome.clone()) {
                        continue;
                    }
                    return;
                }
                None => {
                    attempt.add_completion_callback(
                        move |attempt: &AsyncOpClient<T>| {
                            if let Some(outcome) = attempt.outcome() {
                                if self.settle(outcome.clone()) {
                                    self.run();
                                }
                            }
                        },
                        None
                    );
                    return;
                }
            }
        }
    }

    /// Handle the outcome of an attempt, telling whether to try again
    fn settle(&mut self, outcome: Outcome<T>) -> bool {
        if let Outcome::Faulted(ref error) = outcome {
            if self.policy.allows_retry(self.retries)
               && !self.server.is_cancellation_requested() {
                self.retries += 1;
                debug!(id = %self.server.id(),
                       retry = self.retries,
                       %error,
                       "attempt failed, retrying");
                return true;
            }
        }
        self.server.try_set_outcome(outcome);
        false
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::combinator::retry::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Build a factory which fails some number of times, then succeeds, and
    /// counts its invocations
    fn flaky(failures: u32, calls: Arc<AtomicU32>)
        -> impl FnMut() -> Result<AsyncOpClient<u32>, OpError> + Send + 'static
    {
        move || {
            let call = calls.fetch_add(1, Ordering::Relaxed) + 1;
            if call <= failures {
                Ok(AsyncOpClient::from_error(OpError::msg(format!("failure {}",
                                                                   call))))
            } else {
                Ok(AsyncOpClient::from_result(call))
            }
        }
    }

    /// Check policy bookkeeping
    #[test]
    fn policy() {
        assert!(RetryPolicy::new(2).allows_retry(1));
        assert!(!RetryPolicy::new(2).allows_retry(2));
        assert!(!RetryPolicy::never().allows_retry(0));
        assert!(RetryPolicy::unlimited().allows_retry(u32::MAX));
        assert_eq!(RetryPolicy::default(), RetryPolicy::new(3));
    }

    /// Check success on the third attempt
    #[test]
    fn succeeds_eventually() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = retry(flaky(2, calls.clone()), RetryPolicy::new(3));
        assert_eq!(*op.result().unwrap(), 3);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    /// Check that the last failure is reported once retries run out
    #[test]
    fn gives_up() {
        let calls = Arc::new(AtomicU32::new(0));
        let op = retry(flaky(u32::MAX, calls.clone()), RetryPolicy::new(1));
        assert_eq!(op.result().unwrap_err().to_string(), "failure 2");
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    /// Check retries of operations which fail asynchronously
    #[test]
    fn asynchronous_attempts() {
        let servers = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let c_servers = servers.clone();
        let op = retry(move || {
            let (server, client) = AsyncOp::<u32>::new().split();
            c_servers.lock().push(server);
            Ok(client)
        }, RetryPolicy::unlimited());

        // The retry runs inline, so the lock must not be held meanwhile
        let first = servers.lock().pop().unwrap();
        first.set_exception(OpError::msg("first")).unwrap();
        assert!(!op.is_completed());
        let second = servers.lock().pop().unwrap();
        assert!(servers.lock().is_empty());
        second.set_result(2).unwrap();
        assert_eq!(*op.result().unwrap(), 2);
    }

    /// Check that factory errors and panics count as failed attempts
    #[test]
    fn factory_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c_calls = calls.clone();
        let op = retry(move || {
            match c_calls.fetch_add(1, Ordering::Relaxed) {
                0 => Err(OpError::msg("no attempt")),
                1 => panic!("factory panicked"),
                _ => Ok(AsyncOpClient::from_result(7u32)),
            }
        }, RetryPolicy::new(2));
        assert_eq!(*op.result().unwrap(), 7);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    /// Check that cancellation is not retried
    #[test]
    fn cancellation() {
        let calls = Arc::new(AtomicU32::new(0));
        let c_calls = calls.clone();
        let op = retry(move || {
            c_calls.fetch_add(1, Ordering::Relaxed);
            Ok(AsyncOpClient::<u32>::canceled())
        }, RetryPolicy::unlimited());
        assert!(op.is_canceled());
        assert_eq!(calls.load(Ordering::Relaxed), 1);

        // Canceling the retry cancels the pending attempt
        let (server, attempt) = AsyncOp::<u32>::new().split();
        let op = retry(move || Ok(attempt.clone()), RetryPolicy::unlimited());
        op.cancel();
        assert!(op.is_canceled());
        assert!(server.is_cancellation_requested());
    }
}
