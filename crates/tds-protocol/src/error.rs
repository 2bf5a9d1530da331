//! Protocol-level error types.

use thiserror::Error;

use crate::packet::PacketType;

/// Errors raised while encoding or decoding TDS protocol structures.
///
/// Every variant is fatal to the session that produced it: the byte stream
/// can no longer be trusted to be aligned on a packet boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Not enough bytes for the structure being decoded.
    #[error("incomplete packet: expected {expected} bytes, got {actual}")]
    IncompletePacket {
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        actual: usize,
    },

    /// Unknown packet type byte.
    #[error("invalid packet type: 0x{0:02X}")]
    InvalidPacketType(u8),

    /// Status byte with unknown bits set.
    #[error("invalid packet status: 0x{0:02X}")]
    InvalidPacketStatus(u8),

    /// Header declared a length outside `8..=max`.
    #[error("invalid packet length {length} (allowed 8..={max})")]
    InvalidPacketLength {
        /// Declared total length.
        length: usize,
        /// Negotiated maximum packet size.
        max: usize,
    },

    /// Packet size that cannot carry a header plus payload.
    #[error("invalid packet size {0} (allowed 9..=65535)")]
    InvalidPacketSize(usize),

    /// Stream ended in the middle of a packet.
    #[error("stream ended mid-packet: {remaining} bytes buffered")]
    TruncatedStream {
        /// Bytes of the partial packet that were buffered.
        remaining: usize,
    },

    /// A message of an unexpected type was received.
    #[error("unexpected packet type: expected {expected:?}, got {actual:?}")]
    UnexpectedPacketType {
        /// Type the caller was waiting for.
        expected: PacketType,
        /// Type that arrived.
        actual: PacketType,
    },

    /// A stored procedure returned a non-zero status where zero is required.
    #[error("{procedure} returned status {status}")]
    ProcedureFailed {
        /// Procedure name.
        procedure: &'static str,
        /// Return status.
        status: i32,
    },

    /// A reply lacked a required output parameter.
    #[error("{procedure} reply is missing output parameter {parameter}")]
    MissingOutput {
        /// Procedure name.
        procedure: &'static str,
        /// Parameter name.
        parameter: &'static str,
    },
}
