//! TDS packet codec implementation.

use bytes::{BufMut, Bytes, BytesMut};
use tds_protocol::ProtocolError;
use tds_protocol::packet::{MAX_PACKET_SIZE, PACKET_HEADER_SIZE, PacketHeader};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// A TDS packet with header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header.
    pub header: PacketHeader,
    /// Packet payload (excluding header).
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet with the given header and payload.
    #[must_use]
    pub fn new(header: PacketHeader, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Get the total packet size including header.
    #[must_use]
    pub fn total_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }

    /// Check if this is the last packet in a message.
    #[must_use]
    pub fn is_end_of_message(&self) -> bool {
        self.header.is_end_of_message()
    }

    /// Write header and payload, with the header length fixed up to match
    /// the payload.
    pub fn encode(&self, dst: &mut impl BufMut) {
        let mut header = self.header;
        header.length = self.total_size() as u16;
        header.encode(dst);
        dst.put_slice(&self.payload);
    }
}

/// Validate a declared total packet length against the negotiated maximum.
pub(crate) fn check_length(length: usize, max: usize) -> Result<(), ProtocolError> {
    if length < PACKET_HEADER_SIZE || length > max {
        return Err(ProtocolError::InvalidPacketLength { length, max });
    }
    Ok(())
}

/// Split one complete packet off the front of `src`, if fully buffered.
pub(crate) fn split_packet(
    src: &mut BytesMut,
    max_packet_size: usize,
) -> Result<Option<Packet>, ProtocolError> {
    if src.len() < PACKET_HEADER_SIZE {
        return Ok(None);
    }

    // Peek at the header to get the length
    let length = u16::from_be_bytes([src[2], src[3]]) as usize;
    check_length(length, max_packet_size)?;

    if src.len() < length {
        src.reserve(length - src.len());
        return Ok(None);
    }

    let mut packet_bytes = src.split_to(length);
    let header = PacketHeader::decode(&mut &packet_bytes[..])?;
    let payload = packet_bytes.split_off(PACKET_HEADER_SIZE).freeze();

    Ok(Some(Packet::new(header, payload)))
}

/// TDS packet codec for tokio-util framing.
///
/// This codec handles the low-level encoding and decoding of TDS packets
/// over a byte stream.
#[derive(Debug)]
pub struct TdsCodec {
    /// Maximum packet size to accept.
    max_packet_size: usize,
    /// Current packet sequence number for encoding.
    packet_id: u8,
}

impl TdsCodec {
    /// Create a new TDS codec with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_packet_size: MAX_PACKET_SIZE,
            packet_id: 1,
        }
    }

    /// Create a new TDS codec with a custom maximum packet size.
    #[must_use]
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size.min(MAX_PACKET_SIZE);
        self
    }

    /// Negotiated maximum packet size.
    #[must_use]
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Get the next packet ID and increment the counter.
    fn next_packet_id(&mut self) -> u8 {
        let id = self.packet_id;
        self.packet_id = self.packet_id.wrapping_add(1);
        if self.packet_id == 0 {
            self.packet_id = 1;
        }
        id
    }

    /// Reset the packet ID counter.
    pub fn reset_packet_id(&mut self) {
        self.packet_id = 1;
    }
}

impl Default for TdsCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for TdsCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(packet) = split_packet(src, self.max_packet_size)? else {
            return Ok(None);
        };

        tracing::trace!(
            packet_type = ?packet.header.packet_type,
            length = packet.total_size(),
            is_eom = packet.is_end_of_message(),
            "decoded TDS packet"
        );

        Ok(Some(packet))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(packet) => Ok(Some(packet)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::TruncatedStream {
                remaining: src.len(),
            }
            .into()),
        }
    }
}

impl Encoder<Packet> for TdsCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let total_length = item.total_size();

        if total_length > self.max_packet_size {
            return Err(CodecError::PacketTooLarge {
                size: total_length,
                max: self.max_packet_size,
            });
        }

        dst.reserve(total_length);

        let mut header = item.header;
        header.length = total_length as u16;
        header.packet_id = self.next_packet_id();
        header.encode(dst);
        dst.put_slice(&item.payload);

        tracing::trace!(
            packet_type = ?header.packet_type,
            length = total_length,
            packet_id = header.packet_id,
            "encoded TDS packet"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tds_protocol::packet::{PacketStatus, PacketType};

    fn raw_packet(length: u16, payload: &[u8]) -> BytesMut {
        let mut data = BytesMut::new();
        data.put_u8(PacketType::TabularResult as u8);
        data.put_u8(PacketStatus::END_OF_MESSAGE.bits());
        data.put_u16(length);
        data.put_u16(52); // spid
        data.put_u8(3); // packet_id
        data.put_u8(0); // window
        data.put_slice(payload);
        data
    }

    #[test]
    fn test_decode_packet() {
        let mut codec = TdsCodec::new();
        let mut data = raw_packet(12, b"test");

        let packet = codec.decode(&mut data).unwrap().unwrap();
        assert_eq!(packet.header.packet_type, PacketType::TabularResult);
        assert!(packet.header.is_end_of_message());
        assert_eq!(packet.header.spid, 52);
        assert_eq!(packet.header.packet_id, 3);
        assert_eq!(&packet.payload[..], b"test");
        assert!(data.is_empty());
    }

    #[test]
    fn test_encode_packet() {
        let mut codec = TdsCodec::new();

        let header = PacketHeader::new(PacketType::Rpc, PacketStatus::END_OF_MESSAGE, 0);
        let packet = Packet::new(header, Bytes::from_static(b"test"));

        let mut dst = BytesMut::new();
        codec.encode(packet.clone(), &mut dst).unwrap();
        codec.encode(packet, &mut dst).unwrap();

        assert_eq!(dst.len(), 24);
        assert_eq!(dst[0], PacketType::Rpc as u8);
        assert_eq!(&dst[2..4], &[0, 12]);
        assert_eq!(dst[6], 1);
        assert_eq!(dst[12 + 6], 2);
    }

    #[test]
    fn test_incomplete_packet() {
        let mut codec = TdsCodec::new();
        let mut data = raw_packet(12, b"");

        assert!(codec.decode(&mut data).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut data),
            Err(CodecError::Protocol(ProtocolError::TruncatedStream { remaining: 8 }))
        ));
    }

    #[test]
    fn test_length_below_header_rejected() {
        let mut codec = TdsCodec::new();
        let mut data = raw_packet(7, b"");
        assert!(matches!(
            codec.decode(&mut data),
            Err(CodecError::Protocol(ProtocolError::InvalidPacketLength { length: 7, .. }))
        ));
    }

    #[test]
    fn test_length_above_max_rejected() {
        let mut codec = TdsCodec::new().with_max_packet_size(512);
        let mut data = raw_packet(513, b"");
        assert!(matches!(
            codec.decode(&mut data),
            Err(CodecError::Protocol(ProtocolError::InvalidPacketLength {
                length: 513,
                max: 512
            }))
        ));
    }

    #[test]
    fn test_encode_too_large() {
        let mut codec = TdsCodec::new().with_max_packet_size(16);
        let header = PacketHeader::new(PacketType::Rpc, PacketStatus::END_OF_MESSAGE, 0);
        let packet = Packet::new(header, Bytes::from(vec![0u8; 9]));
        let mut dst = BytesMut::new();
        assert!(matches!(
            codec.encode(packet, &mut dst),
            Err(CodecError::PacketTooLarge { size: 17, max: 16 })
        ));
    }
}
