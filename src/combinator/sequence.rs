//! Run operations strictly one after another
//!
//! Each step is an operation factory, which is only invoked once the
//! operation started by the previous step has succeeded. The first step
//! which faults or is canceled stops the sequence and settles it with the
//! same outcome. Otherwise, the sequence succeeds with every step's result,
//! in order.

use crate::client::AsyncOpClient;
use crate::combinator::{guarded, link};
use crate::error::OpError;
use crate::op::{AsyncOp, AsyncOpResult};
use crate::server::AsyncOpServer;
use crate::status::Outcome;
use std::collections::VecDeque;
use tracing::trace;


/// Step of a sequence, starting one operation
pub type OpFactory<T> =
    Box<dyn FnOnce() -> Result<AsyncOpClient<T>, OpError> + Send + 'static>;


/// Build an operation which runs a list of steps one after another
pub fn sequence<T, I>(steps: I) -> AsyncOpClient<Vec<T>>
    where T: AsyncOpResult + Clone,
          I: IntoIterator<Item = OpFactory<T>>
{
    let (server, result) = AsyncOp::<Vec<T>>::new().split();
    let steps = steps.into_iter().collect::<VecDeque<_>>();
    let results = Vec::with_capacity(steps.len());
    Sequencer { steps, results, server }.run();
    result
}


/// State of an ongoing sequence
struct Sequencer<T: AsyncOpResult> {
    /// Steps which did not run yet
    steps: VecDeque<OpFactory<T>>,

    /// Results of the steps which already succeeded
    results: Vec<T>,

    /// Operation reporting the final outcome
    server: AsyncOpServer<Vec<T>>,
}
//
impl<T: AsyncOpResult + Clone> Sequencer<T> {
    /// Run steps until one is pending or the sequence is over
    fn run(mut self) {
        loop {
            if self.server.status().is_final() {
                return;
            }
            let step = match self.steps.pop_front() {
                Some(step) => step,
                None => {
                    let results = std::mem::take(&mut self.results);
                    self.server.try_set_result(results);
                    return;
                }
            };
            let op = match guarded(step) {
                Ok(op) => op,
                Err(error) => {
                    self.server.try_set_exception(error);
                    return;
                }
            };
            link(&self.server, op.clone());
            match op.outcome() {
                Some(outcome) => {
                    if !self.settle(outcome) {
                        return;
                    }
                }
                None => {
                    op.add_completion_callback(move |op: &AsyncOpClient<T>| {
                        if let Some(outcome) = op.outcome() {
                            if self.settle(outcome) {
                                self.run();
                            }
                        }
                    }, None);
                    return;
                }
            }
        }
    }

    /// Handle the outcome of a step, telling whether to carry on
    fn settle(&mut self, outcome: &Outcome<T>) -> bool {
        match *outcome {
            Outcome::Success(ref value) => {
                self.results.push(value.clone());
                true
            }
            ref failure => {
                trace!(id = %self.server.id(),
                       step = self.results.len(),
                       status = %failure.status(),
                       "sequence stopped");
                self.server.try_set_outcome(failure.failure());
                false
            }
        }
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::combinator::sequence::*;
    use crate::server::AsyncOpServer;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Box a step, letting its signature drive closure inference
    fn step<T, F>(factory: F) -> OpFactory<T>
        where T: AsyncOpResult,
              F: FnOnce() -> Result<AsyncOpClient<T>, OpError> + Send + 'static
    {
        Box::new(factory)
    }

    /// Build a step which logs when it starts and hands out its server
    fn logged_step(index: usize,
                   log: Arc<Mutex<Vec<usize>>>,
                   servers: Arc<Mutex<Vec<AsyncOpServer<usize>>>>)
        -> OpFactory<usize>
    {
        step(move || {
            log.lock().push(index);
            let (server, client) = AsyncOp::new().split();
            servers.lock().push(server);
            Ok(client)
        })
    }

    /// Check that steps run strictly one after another
    #[test]
    fn strict_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let servers = Arc::new(Mutex::new(Vec::new()));
        let steps = (0..3).map(|i| logged_step(i, log.clone(), servers.clone()))
                          .collect::<Vec<_>>();
        let all = sequence(steps);

        for i in 0..3 {
            // Only the current step has started
            assert_eq!(*log.lock(), (0..=i).collect::<Vec<_>>());
            assert!(!all.is_completed());
            let server = servers.lock().pop().unwrap();
            server.set_result(i * 100).unwrap();
        }
        assert_eq!(*all.result().unwrap(), vec![0, 100, 200]);
    }

    /// Check that the first failure stops the sequence
    #[test]
    fn stops_on_failure() {
        let error = OpError::msg("second step failed");
        let c_error = error.clone();
        let steps: Vec<OpFactory<u32>> = vec![
            step(|| Ok(AsyncOpClient::from_result(1))),
            step(move || Ok(AsyncOpClient::from_error(c_error))),
            step(|| panic!("third step should not run")),
        ];
        assert_eq!(sequence(steps).exception(), Some(error));

        let steps: Vec<OpFactory<u32>> = vec![
            step(|| Ok(AsyncOpClient::canceled())),
            step(|| panic!("second step should not run")),
        ];
        assert!(sequence(steps).is_canceled());
    }

    /// Check that failing and panicking factories fault the sequence
    #[test]
    fn factory_failures() {
        let error = OpError::msg("could not start");
        let c_error = error.clone();
        let steps: Vec<OpFactory<u32>> = vec![step(move || Err(c_error))];
        assert_eq!(sequence(steps).exception(), Some(error));

        let steps: Vec<OpFactory<u32>> = vec![step(|| panic!("boom"))];
        assert_eq!(sequence(steps).exception(),
                   Some(OpError::Panicked("boom".into())));
    }

    /// Check the empty sequence
    #[test]
    fn empty() {
        let all = sequence(Vec::<OpFactory<u32>>::new());
        assert!(all.is_completed());
        assert_eq!(*all.result().unwrap(), Vec::<u32>::new());
    }

    /// Check that canceling the sequence cancels the current step
    #[test]
    fn cancellation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let servers = Arc::new(Mutex::new(Vec::new()));
        let steps = (0..2).map(|i| logged_step(i, log.clone(), servers.clone()))
                          .collect::<Vec<_>>();
        let all = sequence(steps);
        all.cancel();
        assert!(all.is_canceled());
        assert!(servers.lock()[0].is_cancellation_requested());
        assert_eq!(*log.lock(), vec![0]);
    }
}
