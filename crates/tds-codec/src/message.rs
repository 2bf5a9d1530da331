//! TDS message reassembly.
//!
//! A logical message spans one or more packets; the final packet carries the
//! `END_OF_MESSAGE` status bit. The assembler concatenates payloads until
//! that bit is seen.

use bytes::{Bytes, BytesMut};
use tds_protocol::ProtocolError;
use tds_protocol::packet::PacketType;

use crate::packet_codec::Packet;

/// A complete TDS message reassembled from one or more packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The packet type of this message.
    pub packet_type: PacketType,
    /// The complete message payload (all packets combined).
    pub payload: Bytes,
}

impl Message {
    /// Create a new message from a single packet.
    #[must_use]
    pub fn from_packet(packet: Packet) -> Self {
        Self {
            packet_type: packet.header.packet_type,
            payload: packet.payload,
        }
    }

    /// Get the message payload length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Check if the message is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Reassembles multiple TDS packets into complete messages.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: BytesMut,
    /// Packet type of the message being assembled.
    packet_type: Option<PacketType>,
    packet_count: usize,
}

impl MessageAssembler {
    /// Create a new message assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new message assembler with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Push a packet into the assembler.
    ///
    /// Returns `Ok(Some(message))` when this packet completes a message and
    /// `Ok(None)` when more packets are needed. A packet whose type differs
    /// from the first packet of the pending message is a protocol error and
    /// discards the partial message.
    pub fn push(&mut self, packet: Packet) -> Result<Option<Message>, ProtocolError> {
        let actual = packet.header.packet_type;
        let packet_type = match self.packet_type {
            Some(expected) if expected != actual => {
                self.clear();
                return Err(ProtocolError::UnexpectedPacketType { expected, actual });
            }
            Some(expected) => expected,
            None => {
                self.packet_type = Some(actual);
                actual
            }
        };

        self.buffer.extend_from_slice(&packet.payload);
        self.packet_count += 1;

        tracing::trace!(
            packet_type = ?packet_type,
            packet_count = self.packet_count,
            buffer_len = self.buffer.len(),
            is_eom = packet.is_end_of_message(),
            "assembling message"
        );

        if !packet.is_end_of_message() {
            return Ok(None);
        }

        let message = Message {
            packet_type,
            payload: self.buffer.split().freeze(),
        };
        self.packet_type = None;
        self.packet_count = 0;
        Ok(Some(message))
    }

    /// Check if the assembler has partial data buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        self.packet_type.is_some()
    }

    /// Get the number of packets accumulated so far.
    #[must_use]
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    /// Get the current buffer length.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear any partial message data.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.packet_type = None;
        self.packet_count = 0;
    }
}
