//! Combinators for chaining and aggregating asynchronous operations
//!
//! Every combinator follows the same pattern: it creates a new operation,
//! subscribes to the completion of one or more source operations, and drives
//! its own operation to completion from inside that subscription. No thread
//! ever blocks on a source just to link two stages together.
//!
//! - [`then`]: continuations on one operation (`then`, `then_with_error`,
//!   `catch`, `catch_error`, `finally`, `rebind`, `continue_with`,
//!   `continue_on`)
//! - [`unwrap`]: flattening of operations which produce operations
//! - [`all`]: wait for every operation of a set (`when_all`, `then_all`)
//! - [`any`]: wait for the first operation of a set (`when_any`, `then_any`)
//! - [`retry`]: re-run a failing operation according to a policy
//! - [`sequence`]: run operations strictly one after another
//!
//! Canceling the operation produced by a combinator also cancels whichever
//! source operations it is currently waiting on. Steps and factories which
//! panic fault the resulting operation with `OpError::Panicked`.

pub mod all;
pub mod any;
pub mod retry;
pub mod sequence;
pub mod then;
pub mod unwrap;

pub use self::all::when_all;
pub use self::any::when_any;
pub use self::retry::{retry, RetryPolicy};
pub use self::sequence::{sequence, OpFactory};

use crate::client::{AsyncOpClient, IAsyncOpClient};
use crate::error::OpError;
use crate::op::AsyncOpResult;
use crate::server::AsyncOpServer;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;


/// Run a user-provided step, turning panics into operation errors
pub(crate) fn guarded<R>(step: impl FnOnce() -> Result<R, OpError>)
    -> Result<R, OpError>
{
    panic::catch_unwind(AssertUnwindSafe(step))
        .unwrap_or_else(|payload| Err(OpError::from_panic(payload)))
}

/// Make cancellation of a combinator's operation reach its current sources
pub(crate) fn link<T, S>(server: &AsyncOpServer<T>, sources: S)
    where T: AsyncOpResult,
          S: IAsyncOpClient + 'static
{
    server.state().set_cancel_hook(Arc::new(sources));
}

/// Complete a combinator's operation with the outcome of some source
pub(crate) fn forward<T>(source: &AsyncOpClient<T>, server: AsyncOpServer<T>)
    where T: AsyncOpResult + Clone
{
    link(&server, source.clone());
    source.add_completion_callback(move |source: &AsyncOpClient<T>| {
        if let Some(outcome) = source.outcome() {
            server.try_set_outcome(outcome.clone());
        }
    }, None);
}
