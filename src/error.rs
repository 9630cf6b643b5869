//! Errors of asynchronous operations
//!
//! Two very different kinds of errors are involved in asynchronous operation
//! monitoring, and they must not be confused:
//!
//! - Usage errors (`UsageError`) are caller bugs, such as completing the same
//!   operation twice or disposing of an operation which is still running.
//!   They are reported synchronously to the offending caller.
//! - Operation errors (`OpError`) are what a producer deliberately attaches
//!   to a failed operation. They are stored inside of the operation, and
//!   replayed to every consumer which looks at the operation's result.
//!
//! Cancellation is a distinguished operation error, not a usage error.

use crate::op::OpId;
use crate::status::AsyncOpStatus;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;


/// Caller bug detected by the controller or observer interface
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum UsageError {
    /// The operation was not in a state which allows the requested action
    #[error("cannot {action} operation {id} while it is {status}")]
    InvalidState {
        /// Operation on which the action was attempted
        id: OpId,

        /// Status of the operation at the time of the attempt
        status: AsyncOpStatus,

        /// What the caller tried to do
        action: &'static str,
    },

    /// The operation has already been disposed of
    #[error("operation {id} has been disposed")]
    Disposed {
        /// Operation on which the action was attempted
        id: OpId,
    },

    /// An argument passed to a combinator is not acceptable
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}


/// Error stored in a failed or canceled asynchronous operation
///
/// Operation errors are cheap to clone, so that they can be handed out to
/// every consumer of an operation.
///
#[derive(Clone, Debug, Error)]
pub enum OpError {
    /// The operation was canceled
    #[error("the operation was canceled")]
    Canceled,

    /// Every producer of the operation went away without completing it
    #[error("the operation was abandoned by its producer")]
    Abandoned,

    /// A continuation step or operation factory panicked
    #[error("a continuation panicked: {0}")]
    Panicked(Arc<str>),

    /// An application-specific error has occurred
    #[error(transparent)]
    Failed(Arc<dyn Error + Send + Sync + 'static>),
}
//
impl OpError {
    /// Wrap an application-specific error
    pub fn new<E: Error + Send + Sync + 'static>(error: E) -> Self {
        OpError::Failed(Arc::new(error))
    }

    /// Build an application-specific error out of a plain message
    pub fn msg<M: Into<String>>(message: M) -> Self {
        OpError::new(MessageError(message.into()))
    }

    /// Check if this error signals a cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(*self, OpError::Canceled)
    }

    /// Access the application-specific error, if it has type E
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        match *self {
            OpError::Failed(ref inner) => {
                let inner: &(dyn Error + Send + Sync + 'static) = &**inner;
                inner.downcast_ref::<E>()
            }
            _ => None,
        }
    }

    /// Turn a panic payload into an operation error
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message: Arc<str> = if let Some(s) = payload.downcast_ref::<&str>() {
            Arc::from(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Arc::from(s.as_str())
        } else {
            Arc::from("<non-string panic payload>")
        };
        OpError::Panicked(message)
    }
}
//
impl PartialEq for OpError {
    /// Application errors only compare equal if they are the same instance
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OpError::Canceled, OpError::Canceled) => true,
            (OpError::Abandoned, OpError::Abandoned) => true,
            (OpError::Panicked(a), OpError::Panicked(b)) => a == b,
            (OpError::Failed(a), OpError::Failed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}


/// Application error carrying nothing but a message
#[derive(Debug, Error)]
#[error("{0}")]
struct MessageError(String);


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::error::*;
    use std::fmt;

    #[derive(Debug)]
    struct Timeout;
    //
    impl fmt::Display for Timeout {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "timed out")
        }
    }
    //
    impl Error for Timeout {}

    /// Check that application errors can be recovered by type
    #[test]
    fn downcast() {
        let error = OpError::new(Timeout);
        assert!(error.downcast_ref::<Timeout>().is_some());
        assert_eq!(error.to_string(), "timed out");
        assert!(!error.is_canceled());

        assert!(OpError::Canceled.downcast_ref::<Timeout>().is_none());
        assert!(OpError::msg("nope").downcast_ref::<Timeout>().is_none());
    }

    /// Check that clones of an error compare equal, but not distinct errors
    #[test]
    fn identity() {
        let a = OpError::msg("a");
        assert_eq!(a, a.clone());
        assert_ne!(a, OpError::msg("a"));
        assert_eq!(OpError::Canceled, OpError::Canceled);
        assert_ne!(OpError::Canceled, OpError::Abandoned);
    }

    /// Check that panic payloads keep their message
    #[test]
    fn panic_payload() {
        let payload = std::panic::catch_unwind(|| panic!("kaboom"))
            .unwrap_err();
        match OpError::from_panic(payload) {
            OpError::Panicked(msg) => assert_eq!(&*msg, "kaboom"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
