use std::error::Error as StdError;
use std::fmt::{self, Display};

use crate::lifecycle::Operation;

/// Error returned by [`crate::ChatStore`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The remote call failed. `message` is the same string the store
    /// recorded as its last error.
    Rejected {
        /// The operation that failed.
        operation: Operation,
        /// Human-readable reason.
        message: String,
    },
    /// The input was refused before any request was issued.
    InvalidInput(&'static str),
    /// The store task is gone, so the operation will never complete.
    StoreStopped,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Rejected { message, .. } => f.write_str(message),
            Error::InvalidInput(reason) => f.write_str(reason),
            Error::StoreStopped => f.write_str("the chat store has stopped"),
        }
    }
}

impl StdError for Error {}
