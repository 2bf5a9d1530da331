//! Cursor error types.

use std::fmt;

use tds_codec::CodecError;
use tds_protocol::{ErrorRecord, ProtocolError};
use thiserror::Error;

use crate::cursor::CursorState;

/// Errors returned by cursor operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed reply or wire framing. The session is unusable.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Framing or transport failure below the RPC layer.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The server reported one or more errors.
    #[error("server error: {0}")]
    Server(ServerErrors),

    /// Operation not allowed in the cursor's current state.
    #[error("cannot {operation} cursor: it is {state}")]
    IllegalState {
        /// Operation attempted.
        operation: &'static str,
        /// State the cursor was in.
        state: CursorState,
    },

    /// Page size of zero or less.
    #[error("invalid fetch size {0}: must be at least 1")]
    InvalidFetchSize(i32),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error leaves the session unusable.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Codec(_) | Self::Io(_))
    }

    /// Check if this error indicates a protocol violation.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Codec(CodecError::Protocol(_))
        )
    }

    /// Check if this error is transient and may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Codec(CodecError::Io(_)))
    }

    /// Check if this is a server error with a specific number.
    #[must_use]
    pub fn is_server_error(&self, number: i32) -> bool {
        matches!(self, Self::Server(errors) if errors.iter().any(|e| e.number == number))
    }

    /// Highest severity among server errors, if this is a server error.
    #[must_use]
    pub fn class(&self) -> Option<u8> {
        match self {
            Self::Server(errors) => errors.iter().map(|e| e.class).max(),
            _ => None,
        }
    }
}

/// Server errors for one request, in arrival order.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerErrors(Vec<ErrorRecord>);

impl ServerErrors {
    /// Wrap a sequence of records, `None` if it is empty.
    #[must_use]
    pub fn new(records: Vec<ErrorRecord>) -> Option<Self> {
        (!records.is_empty()).then_some(Self(records))
    }

    /// First record received.
    #[must_use]
    pub fn first(&self) -> &ErrorRecord {
        &self.0[0]
    }

    /// Iterate over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, ErrorRecord> {
        self.0.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for the `len`/`is_empty` pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the records.
    #[must_use]
    pub fn into_vec(self) -> Vec<ErrorRecord> {
        self.0
    }
}

impl fmt::Display for ServerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{record}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ServerErrors {
    type Item = &'a ErrorRecord;
    type IntoIter = std::slice::Iter<'a, ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result type for cursor operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_keep_order() {
        let errors = ServerErrors::new(vec![
            ErrorRecord::new(16945, 16, "The cursor was not declared."),
            ErrorRecord::new(208, 16, "Invalid object name 't'."),
        ])
        .unwrap();
        assert_eq!(errors.first().number, 16945);
        assert_eq!(errors.len(), 2);
        let text = errors.to_string();
        assert!(text.find("16945").unwrap() < text.find("208").unwrap());

        let err = Error::Server(errors);
        assert!(err.is_server_error(208));
        assert!(!err.is_fatal());
        assert_eq!(err.class(), Some(16));
    }

    #[test]
    fn test_empty_server_errors() {
        assert!(ServerErrors::new(Vec::new()).is_none());
    }

    #[test]
    fn test_fatal_classification() {
        let err = Error::from(ProtocolError::InvalidPacketType(0x42));
        assert!(err.is_fatal());
        assert!(err.is_protocol_error());
        assert!(!err.is_transient());

        let err = Error::InvalidFetchSize(0);
        assert!(!err.is_fatal());
    }
}
