//! Register access errors

use core::fmt;

/// Errors from register operations
///
/// `E` is the error type of the transaction engine. Buffer and register
/// contents are unspecified after any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The engine reported failure (NACK, arbitration loss, timeout)
    TransactionFailed(E),
    /// An empty buffer was passed under [`ZeroLengthPolicy::Reject`](crate::ZeroLengthPolicy::Reject)
    InvalidBufferSize,
}

impl<E> Error<E> {
    /// Engine error behind a failed transaction
    pub fn transaction_error(&self) -> Option<&E> {
        match self {
            Error::TransactionFailed(e) => Some(e),
            Error::InvalidBufferSize => None,
        }
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransactionFailed(e) => write!(f, "i2c transaction failed: {:?}", e),
            Error::InvalidBufferSize => f.write_str("buffer length must be at least 1"),
        }
    }
}
