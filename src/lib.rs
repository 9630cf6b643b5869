//! Thread-safe asynchronous operation handles
//!
//! Picture yourself in a situation where: you want to delegate work to another
//! hardware or software entity, such as a coroutine, a thread pool, a GPU, an
//! IO device, or even a server over a network. You know that the work is going
//! to take some time, and you have other things to do meanwhile, so you would
//! rather not wait for its completion. But you would like a way to monitor the
//! progress of this work, know when it's done, manage errors, and chain
//! further work after it...
//!
//! This crate provides a single handle type for such asynchronous operations,
//! which is split into two faces:
//!
//! - The server (`AsyncOpServer`) is held by whoever produces the outcome. It
//!   drives the operation from `Created` through `Scheduled` and `Running` to
//!   exactly one final status: `RanToCompletion`, `Faulted` or `Canceled`.
//! - The client (`AsyncOpClient`) is held by whoever consumes the outcome. It
//!   can poll the status and progress, block until completion, register
//!   callbacks, request cancellation, and chain further operations using the
//!   combinators of the `combinator` module.
//!
//! The handle does not come with any thread pool or scheduler. Producers
//! complete operations from whichever thread they run on, and the handle
//! only coordinates the visibility and ordering of what they publish. Where
//! callbacks run is controlled by explicit `CallbackExecutor`s, and
//! operations can be bridged to the `futures` ecosystem and `.await`ed.
//!
//! ```
//! use async_ops::AsyncOp;
//! use std::thread;
//!
//! let (server, client) = AsyncOp::<u32>::new().split();
//! let doubled = client.rebind(|value| Ok(value * 2));
//! thread::spawn(move || {
//!     server.set_running().unwrap();
//!     server.set_progress(0.5).unwrap();
//!     server.set_result(21).unwrap();
//! });
//! assert_eq!(*doubled.result().unwrap(), 42);
//! ```

pub mod awaiter;
pub mod client;
pub mod combinator;
pub mod error;
pub mod executor;
pub mod interop;
pub mod multithread;
pub mod op;
pub mod options;
pub mod server;
pub mod status;

pub use crate::awaiter::{Awaiter, OpFuture};
pub use crate::client::{AsyncOpClient, IAsyncOpClient};
pub use crate::combinator::{retry, sequence, when_all, when_any, OpFactory,
                            RetryPolicy};
pub use crate::error::{OpError, UsageError};
pub use crate::executor::{CallbackExecutor, DispatchMode, ExecutorRef};
pub use crate::interop::OpDriver;
pub use crate::multithread::callback::CallbackKey;
pub use crate::multithread::polling::{Snapshot, StatusMonitor};
pub use crate::op::{AsyncOp, AsyncOpResult, OpId};
pub use crate::options::CreationOptions;
pub use crate::server::AsyncOpServer;
pub use crate::status::{AsyncOpStatus, Outcome};
