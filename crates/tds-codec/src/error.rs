//! Codec error types.

use tds_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while framing packets on a transport.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed packet or message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Outgoing packet exceeds the negotiated packet size.
    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge {
        /// Packet size in bytes.
        size: usize,
        /// Negotiated maximum.
        max: usize,
    },

    /// Connection closed while a message was partially received.
    #[error("connection closed mid-message")]
    ConnectionClosed,

    /// IO error from the transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Check if the error leaves the byte stream misaligned.
    ///
    /// After such an error the session must be torn down.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::ConnectionClosed)
    }
}
