//! TDS packet header definitions.

use bitflags::bitflags;
use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// TDS packet header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 8;

/// Maximum TDS packet size (64KB - 1).
pub const MAX_PACKET_SIZE: usize = 65535;

/// Smallest packet size able to carry at least one payload byte.
pub const MIN_PACKET_SIZE: usize = PACKET_HEADER_SIZE + 1;

/// Default TDS packet size.
pub const DEFAULT_PACKET_SIZE: usize = 4096;

/// TDS packet type.
///
/// The discriminants are the byte values used on the wire by both
/// SQL Server and Sybase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    /// SQL batch request.
    SqlBatch = 0x01,
    /// Pre-TDS7 login packet.
    PreTds7Login = 0x02,
    /// Remote procedure call.
    Rpc = 0x03,
    /// Tabular response (server reply).
    TabularResult = 0x04,
    /// Attention signal (cancel).
    Attention = 0x06,
    /// Bulk load data.
    BulkLoad = 0x07,
    /// Distributed transaction (XA) control.
    TransactionManager = 0x0E,
    /// TDS 5.0 (Sybase) request.
    Tds5Query = 0x0F,
    /// TDS7+ login packet.
    Tds7Login = 0x10,
    /// NTLM / SSPI authentication.
    Sspi = 0x11,
    /// Pre-login packet, also used to carry the TLS handshake.
    PreLogin = 0x12,
}

impl PacketType {
    /// Create a packet type from a raw byte value.
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(Self::SqlBatch),
            0x02 => Ok(Self::PreTds7Login),
            0x03 => Ok(Self::Rpc),
            0x04 => Ok(Self::TabularResult),
            0x06 => Ok(Self::Attention),
            0x07 => Ok(Self::BulkLoad),
            0x0E => Ok(Self::TransactionManager),
            0x0F => Ok(Self::Tds5Query),
            0x10 => Ok(Self::Tds7Login),
            0x11 => Ok(Self::Sspi),
            0x12 => Ok(Self::PreLogin),
            _ => Err(ProtocolError::InvalidPacketType(value)),
        }
    }
}

bitflags! {
    /// TDS packet status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PacketStatus: u8 {
        /// Normal packet, more packets to follow.
        const NORMAL = 0x00;
        /// End of message (last packet).
        const END_OF_MESSAGE = 0x01;
        /// Ignore this event (used for attention acknowledgment).
        const IGNORE_EVENT = 0x02;
        /// Reset connection (SQL Server 2000+).
        const RESET_CONNECTION = 0x08;
        /// Reset connection but keep transaction state.
        const RESET_CONNECTION_KEEP_TRANSACTION = 0x10;
    }
}

/// TDS packet header.
///
/// Every TDS packet begins with an 8-byte header that describes
/// the packet type, status, and length. `spid`, `packet_id` and `window`
/// are carried through decoding untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Type of packet.
    pub packet_type: PacketType,
    /// Status flags.
    pub status: PacketStatus,
    /// Total packet length including header.
    pub length: u16,
    /// Server process ID (SPID).
    pub spid: u16,
    /// Packet sequence number (wraps at 255).
    pub packet_id: u8,
    /// Window (unused, should be 0).
    pub window: u8,
}

impl PacketHeader {
    /// Create a new packet header.
    #[must_use]
    pub const fn new(packet_type: PacketType, status: PacketStatus, length: u16) -> Self {
        Self {
            packet_type,
            status,
            length,
            spid: 0,
            packet_id: 0,
            window: 0,
        }
    }

    /// Parse a packet header from bytes.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < PACKET_HEADER_SIZE {
            return Err(ProtocolError::IncompletePacket {
                expected: PACKET_HEADER_SIZE,
                actual: src.remaining(),
            });
        }

        let packet_type = PacketType::from_u8(src.get_u8())?;
        let status_byte = src.get_u8();
        let status = PacketStatus::from_bits(status_byte)
            .ok_or(ProtocolError::InvalidPacketStatus(status_byte))?;
        let length = src.get_u16();
        let spid = src.get_u16();
        let packet_id = src.get_u8();
        let window = src.get_u8();

        Ok(Self {
            packet_type,
            status,
            length,
            spid,
            packet_id,
            window,
        })
    }

    /// Encode the packet header to bytes.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.packet_type as u8);
        dst.put_u8(self.status.bits());
        dst.put_u16(self.length);
        dst.put_u16(self.spid);
        dst.put_u8(self.packet_id);
        dst.put_u8(self.window);
    }

    /// Get the payload length (total length minus header).
    #[must_use]
    pub const fn payload_length(&self) -> usize {
        self.length.saturating_sub(PACKET_HEADER_SIZE as u16) as usize
    }

    /// Check if this is the last packet in a message.
    #[must_use]
    pub const fn is_end_of_message(&self) -> bool {
        self.status.contains(PacketStatus::END_OF_MESSAGE)
    }

    /// Set the packet ID (sequence number).
    #[must_use]
    pub const fn with_packet_id(mut self, id: u8) -> Self {
        self.packet_id = id;
        self
    }
}

/// Check that a negotiated packet size can carry a header and some payload.
pub fn validate_packet_size(size: usize) -> Result<usize, ProtocolError> {
    if (MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
        Ok(size)
    } else {
        Err(ProtocolError::InvalidPacketSize(size))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_header_roundtrip() {
        let header = PacketHeader {
            packet_type: PacketType::Rpc,
            status: PacketStatus::END_OF_MESSAGE,
            length: 100,
            spid: 54,
            packet_id: 7,
            window: 3,
        };

        let mut bytes = BytesMut::new();
        header.encode(&mut bytes);
        assert_eq!(bytes.len(), PACKET_HEADER_SIZE);
        assert_eq!(&bytes[..4], &[0x03, 0x01, 0x00, 100]);

        let mut cursor = &bytes[..];
        let decoded = PacketHeader::decode(&mut cursor).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_payload_length() {
        let header = PacketHeader::new(PacketType::SqlBatch, PacketStatus::END_OF_MESSAGE, 100);
        assert_eq!(header.payload_length(), 92);
    }

    #[test]
    fn test_packet_type_table() {
        let table = [
            (1, PacketType::SqlBatch),
            (2, PacketType::PreTds7Login),
            (3, PacketType::Rpc),
            (4, PacketType::TabularResult),
            (6, PacketType::Attention),
            (7, PacketType::BulkLoad),
            (14, PacketType::TransactionManager),
            (15, PacketType::Tds5Query),
            (16, PacketType::Tds7Login),
            (17, PacketType::Sspi),
            (18, PacketType::PreLogin),
        ];
        for (byte, ty) in table {
            assert_eq!(PacketType::from_u8(byte).unwrap(), ty);
            assert_eq!(ty as u8, byte);
        }
        assert!(PacketType::from_u8(0x05).is_err());
        assert!(PacketType::from_u8(0xFF).is_err());
    }

    #[test]
    fn test_unknown_status_bits_rejected() {
        let raw = [0x04, 0x80, 0x00, 0x08, 0x00, 0x00, 0x01, 0x00];
        let mut cursor = &raw[..];
        assert!(matches!(
            PacketHeader::decode(&mut cursor),
            Err(ProtocolError::InvalidPacketStatus(0x80))
        ));
    }

    #[test]
    fn test_short_header() {
        let raw = [0x04, 0x01, 0x00];
        let mut cursor = &raw[..];
        assert!(matches!(
            PacketHeader::decode(&mut cursor),
            Err(ProtocolError::IncompletePacket { expected: 8, actual: 3 })
        ));
    }

    #[test]
    fn test_validate_packet_size() {
        assert!(validate_packet_size(8).is_err());
        assert_eq!(validate_packet_size(9).unwrap(), 9);
        assert_eq!(validate_packet_size(DEFAULT_PACKET_SIZE).unwrap(), 4096);
        assert!(validate_packet_size(MAX_PACKET_SIZE + 1).is_err());
    }
}
