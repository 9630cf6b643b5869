//! Facilities to represent the status of asynchronous operations
//!
//! This module provides facilities to represent and reason about the status
//! of asynchronous operations. The model is the following: any kind of async
//! operation can be represented as a state machine which starts out in a
//! pending state (created, then possibly scheduled and running), and finally
//! ends up in exactly one of three final states: ran to completion, faulted,
//! or canceled.
//!
//! Once a final state has been reached, it never changes anymore. The final
//! payload of an operation is represented by the tagged `Outcome` type.

use crate::error::OpError;
use std::fmt;


/// Representation of an asynchronous operation's status
///
/// Here are the possible state transitions:
///
/// - Created -> Scheduled / Running / RanToCompletion / Faulted / Canceled
/// - Scheduled -> Running / RanToCompletion / Faulted / Canceled
/// - Running -> RanToCompletion / Faulted / Canceled
///
/// Pending statuses compare lower than every final status, so "is this
/// operation complete" boils down to a single comparison. The relative order
/// of the final statuses carries no meaning.
///
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AsyncOpStatus {
    /// The operation has been created, but nothing has happened yet
    Created = 0,

    /// The operation has been submitted to whatever will run it
    Scheduled = 1,

    /// The operation is being processed
    Running = 2,

    /// The operation has successfully produced its result
    RanToCompletion = 3,

    /// The operation has failed
    Faulted = 4,

    /// The operation was canceled before it could complete
    Canceled = 5,
}
//
impl AsyncOpStatus {
    /// Check if this status is final (i.e. won't change anymore)
    pub fn is_final(self) -> bool {
        self >= AsyncOpStatus::RanToCompletion
    }

    /// Check if this status is one of the pending ones
    pub fn is_pending(self) -> bool {
        !self.is_final()
    }

    /// Check if this status denotes a successful completion
    pub fn is_success(self) -> bool {
        self == AsyncOpStatus::RanToCompletion
    }

    /// Check if this status denotes a failure
    pub fn is_faulted(self) -> bool {
        self == AsyncOpStatus::Faulted
    }

    /// Check if this status denotes a cancellation
    pub fn is_canceled(self) -> bool {
        self == AsyncOpStatus::Canceled
    }

    /// Decode a status from its packed representation
    pub(crate) fn from_bits(bits: u32) -> Self {
        use self::AsyncOpStatus::*;
        match bits {
            0 => Created,
            1 => Scheduled,
            2 => Running,
            3 => RanToCompletion,
            4 => Faulted,
            _ => Canceled,
        }
    }
}
//
impl fmt::Display for AsyncOpStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            AsyncOpStatus::Created => "created",
            AsyncOpStatus::Scheduled => "scheduled",
            AsyncOpStatus::Running => "running",
            AsyncOpStatus::RanToCompletion => "completed",
            AsyncOpStatus::Faulted => "faulted",
            AsyncOpStatus::Canceled => "canceled",
        };
        f.write_str(name)
    }
}


/// Final payload of an asynchronous operation
///
/// Consumers are expected to pattern-match on the tag rather than to inspect
/// the kind of error that was stored.
///
#[derive(Clone, Debug)]
pub enum Outcome<T> {
    /// The operation ran to completion and produced this result
    Success(T),

    /// The operation failed with this error
    Faulted(OpError),

    /// The operation was canceled
    Canceled,
}
//
impl<T> Outcome<T> {
    /// Build the outcome matching an operation error
    ///
    /// A cancellation error yields `Canceled` rather than `Faulted`.
    ///
    pub fn from_error(error: OpError) -> Self {
        if error.is_canceled() {
            Outcome::Canceled
        } else {
            Outcome::Faulted(error)
        }
    }

    /// Final status that an operation holding this outcome reports
    pub fn status(&self) -> AsyncOpStatus {
        match *self {
            Outcome::Success(_) => AsyncOpStatus::RanToCompletion,
            Outcome::Faulted(_) => AsyncOpStatus::Faulted,
            Outcome::Canceled => AsyncOpStatus::Canceled,
        }
    }

    /// Access the result of a successful operation
    pub fn as_result(&self) -> Result<&T, OpError> {
        match *self {
            Outcome::Success(ref value) => Ok(value),
            Outcome::Faulted(ref error) => Err(error.clone()),
            Outcome::Canceled => Err(OpError::Canceled),
        }
    }

    /// Convert into a standard result, cancellation becoming an error
    pub fn into_result(self) -> Result<T, OpError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Faulted(error) => Err(error),
            Outcome::Canceled => Err(OpError::Canceled),
        }
    }

    /// Error carried by an unsuccessful outcome, if any
    pub fn error(&self) -> Option<OpError> {
        match *self {
            Outcome::Success(_) => None,
            Outcome::Faulted(ref error) => Some(error.clone()),
            Outcome::Canceled => Some(OpError::Canceled),
        }
    }

    /// Keep the failure of this outcome, but swap in another success type
    ///
    /// Must not be called on a successful outcome.
    ///
    pub(crate) fn failure<U>(&self) -> Outcome<U> {
        match *self {
            Outcome::Faulted(ref error) => Outcome::Faulted(error.clone()),
            Outcome::Success(_) | Outcome::Canceled => Outcome::Canceled,
        }
    }
}
//
impl<T> From<Result<T, OpError>> for Outcome<T> {
    fn from(result: Result<T, OpError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::from_error(error),
        }
    }
}


/// Unit tests
#[cfg(test)]
mod tests {
    use crate::error::OpError;
    use crate::status::*;

    /// Check that pending statuses all sort before the final ones
    #[test]
    fn status_ordering() {
        use crate::status::AsyncOpStatus::*;
        let pending = [Created, Scheduled, Running];
        let finals = [RanToCompletion, Faulted, Canceled];
        for p in pending.iter() {
            assert!(!p.is_final());
            for f in finals.iter() {
                assert!(p < f);
                assert!(f.is_final());
            }
        }
    }

    /// Check that the packed representation round-trips
    #[test]
    fn bits_decoding() {
        use crate::status::AsyncOpStatus::*;
        for s in [Created, Scheduled, Running, RanToCompletion, Faulted,
                  Canceled].iter() {
            assert_eq!(AsyncOpStatus::from_bits(*s as u32), *s);
        }
    }

    /// Check the status predicates
    #[test]
    fn predicates() {
        assert!(AsyncOpStatus::RanToCompletion.is_success());
        assert!(AsyncOpStatus::Faulted.is_faulted());
        assert!(AsyncOpStatus::Canceled.is_canceled());
        assert!(AsyncOpStatus::Running.is_pending());
        assert!(!AsyncOpStatus::Canceled.is_success());
    }

    /// Check that cancellation errors produce canceled outcomes
    #[test]
    fn outcome_from_error() {
        let canceled: Outcome<u32> = Outcome::from_error(OpError::Canceled);
        assert_eq!(canceled.status(), AsyncOpStatus::Canceled);

        let faulted: Outcome<u32> = Outcome::from_error(OpError::msg("boom"));
        assert_eq!(faulted.status(), AsyncOpStatus::Faulted);
        assert_eq!(faulted.error().unwrap().to_string(), "boom");

        let success: Outcome<u32> = Ok(3).into();
        assert_eq!(*success.as_result().unwrap(), 3);
        assert!(success.error().is_none());
    }
}
