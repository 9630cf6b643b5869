//! Continuations on a single asynchronous operation
//!
//! These combinators run some user-provided step once a source operation
//! completes, and expose the outcome of that step as a new operation. Steps
//! run inline on whichever thread completes the source, except for
//! `continue_on`, which hops to a given executor first.

use crate::client::AsyncOpClient;
use crate::combinator::{forward, guarded, link};
use crate::error::OpError;
use crate::executor::ExecutorRef;
use crate::op::{AsyncOp, AsyncOpResult};
use crate::status::Outcome;
use std::error::Error;
use tracing::trace;


impl<T: AsyncOpResult> AsyncOpClient<T> {
    /// Start another operation once this one succeeds
    ///
    /// If this operation faults or is canceled, the step does not run and
    /// the resulting operation reproduces that outcome. If the step fails,
    /// the resulting operation faults with its error.
    ///
    pub fn then<U, F>(&self, step: F) -> AsyncOpClient<U>
        where U: AsyncOpResult + Clone,
              F: FnOnce(&T) -> Result<AsyncOpClient<U>, OpError> + Send + 'static
    {
        self.then_with_error(step, |error| Err(error.clone()))
    }

    /// Start another operation once this one completes, using a different
    /// step depending on whether it succeeded
    ///
    /// The error step also runs on cancellation, with `OpError::Canceled`.
    ///
    pub fn then_with_error<U, F, G>(&self,
                                    on_success: F,
                                    on_error: G) -> AsyncOpClient<U>
        where U: AsyncOpResult + Clone,
              F: FnOnce(&T) -> Result<AsyncOpClient<U>, OpError> + Send + 'static,
              G: FnOnce(&OpError) -> Result<AsyncOpClient<U>, OpError>
                 + Send + 'static
    {
        let (server, result) = AsyncOp::<U>::new().split();
        link(&server, self.clone());
        self.add_completion_callback(move |source: &AsyncOpClient<T>| {
            let next = match source.outcome() {
                Some(Outcome::Success(value)) => guarded(|| on_success(value)),
                Some(failure) => {
                    let error = failure.error().unwrap_or(OpError::Canceled);
                    guarded(|| on_error(&error))
                }
                None => return,
            };
            match next {
                Ok(next) => forward(&next, server),
                Err(error) => {
                    trace!(id = %source.id(), %error, "continuation failed");
                    server.try_set_exception(error);
                }
            }
        }, None);
        result
    }

    /// Map the result of this operation once it succeeds
    ///
    /// This is a lighter `then`, for steps which compute a value directly
    /// rather than starting another operation.
    ///
    pub fn rebind<U, F>(&self, step: F) -> AsyncOpClient<U>
        where U: AsyncOpResult,
              F: FnOnce(&T) -> Result<U, OpError> + Send + 'static
    {
        self.continue_with(move |source: &AsyncOpClient<T>| {
            match source.outcome() {
                Some(Outcome::Success(value)) => step(value),
                Some(failure) => Err(failure.error().unwrap_or(OpError::Canceled)),
                None => Err(OpError::Abandoned),
            }
        })
    }

    /// Run a step once this operation completes, whatever its outcome, and
    /// expose the step's result as a new operation
    pub fn continue_with<U, F>(&self, step: F) -> AsyncOpClient<U>
        where U: AsyncOpResult,
              F: FnOnce(&AsyncOpClient<T>) -> Result<U, OpError> + Send + 'static
    {
        let (server, result) = AsyncOp::<U>::new().split();
        link(&server, self.clone());
        self.add_completion_callback(move |source: &AsyncOpClient<T>| {
            server.try_set_outcome(guarded(|| step(source)).into());
        }, None);
        result
    }
}
//
impl<T: AsyncOpResult + Clone> AsyncOpClient<T> {
    /// Recover from the failure or cancellation of this operation
    ///
    /// Success passes through unchanged. If the handler fails, the resulting
    /// operation faults with the handler's error.
    ///
    pub fn catch<F>(&self, handler: F) -> AsyncOpClient<T>
        where F: FnOnce(&OpError) -> Result<T, OpError> + Send + 'static
    {
        self.continue_with(move |source: &AsyncOpClient<T>| {
            match source.outcome() {
                Some(Outcome::Success(value)) => Ok(value.clone()),
                Some(failure) => {
                    let error = failure.error().unwrap_or(OpError::Canceled);
                    handler(&error)
                }
                None => Err(OpError::Abandoned),
            }
        })
    }

    /// Recover from one specific kind of application error
    ///
    /// Any other failure, including cancellation, propagates unchanged.
    ///
    pub fn catch_error<E, F>(&self, handler: F) -> AsyncOpClient<T>
        where E: Error + 'static,
              F: FnOnce(&E) -> Result<T, OpError> + Send + 'static
    {
        self.catch(move |error| match error.downcast_ref::<E>() {
            Some(matched) => handler(matched),
            None => Err(error.clone()),
        })
    }

    /// Run an action once this operation completes, whatever its outcome,
    /// then reproduce that outcome
    ///
    /// If the action panics, the resulting operation faults instead.
    ///
    pub fn finally<F>(&self, action: F) -> AsyncOpClient<T>
        where F: FnOnce() + Send + 'static
    {
        self.continue_with(move |source: &AsyncOpClient<T>| {
            action();
            match source.outcome() {
                Some(outcome) => outcome.clone().into_result(),
                None => Err(OpError::Abandoned),
            }
        })
    }

    /// Mirror this operation, but complete from a given executor
    ///
    /// Continuations attached to the resulting operation then run on that
    /// executor's context.
    ///
    pub fn continue_on(&self, executor: ExecutorRef) -> AsyncOpClient<T> {
        let (server, result) = AsyncOp::<T>::new().split();
        link(&server, self.clone());
        self.add_completion_callback(move |source: &AsyncOpClient<T>| {
            if let Some(outcome) = source.outcome() {
                server.try_set_outcome(outcome.clone());
            }
        }, Some(executor));
        result
    }
}
