//! Message framing: payload → packets, and packets → payload chunks.
//!
//! [`frame`] is the encode side used by every request. [`unframe`] walks a
//! fully buffered byte slice; live transports use [`TdsCodec`](crate::TdsCodec)
//! which applies the same header checks incrementally.

use bytes::{Bytes, BytesMut};
use tds_protocol::ProtocolError;
use tds_protocol::packet::{
    PACKET_HEADER_SIZE, PacketHeader, PacketStatus, PacketType, validate_packet_size,
};

use crate::packet_codec::{Packet, split_packet};

/// Number of packets [`frame`] produces for a payload of `len` bytes.
///
/// `max_packet_size` must already be validated. An empty payload still
/// takes one packet.
#[must_use]
pub fn packet_count(len: usize, max_packet_size: usize) -> usize {
    let chunk = max_packet_size.saturating_sub(PACKET_HEADER_SIZE).max(1);
    len.div_ceil(chunk).max(1)
}

/// Split a payload into packets of at most `max_packet_size` bytes.
///
/// Only the final packet carries `END_OF_MESSAGE`. Packet ids are left at
/// zero; the codec numbers packets as they are written.
pub fn frame(
    payload: &[u8],
    packet_type: PacketType,
    max_packet_size: usize,
) -> Result<Vec<Packet>, ProtocolError> {
    let max_packet_size = validate_packet_size(max_packet_size)?;
    let chunk_size = max_packet_size - PACKET_HEADER_SIZE;

    if payload.is_empty() {
        let header = PacketHeader::new(packet_type, PacketStatus::END_OF_MESSAGE, 0);
        return Ok(vec![Packet::new(header, Bytes::new())]);
    }

    let count = packet_count(payload.len(), max_packet_size);
    let mut packets = Vec::with_capacity(count);

    for (index, chunk) in payload.chunks(chunk_size).enumerate() {
        let status = if index + 1 == count {
            PacketStatus::END_OF_MESSAGE
        } else {
            PacketStatus::NORMAL
        };
        let header = PacketHeader::new(packet_type, status, 0);
        packets.push(Packet::new(header, Bytes::copy_from_slice(chunk)));
    }

    tracing::trace!(
        packet_type = ?packet_type,
        payload_len = payload.len(),
        packets = packets.len(),
        "framed message"
    );

    Ok(packets)
}

/// Iterate over the packets contained in `data`.
///
/// Each header is checked against `max_packet_size`. Iteration stops after
/// the first error; bytes left over after the last whole packet yield
/// [`ProtocolError::TruncatedStream`].
#[must_use]
pub fn unframe(data: &[u8], max_packet_size: usize) -> Unframe {
    Unframe {
        buf: BytesMut::from(data),
        max_packet_size,
        done: false,
    }
}

/// Iterator returned by [`unframe`].
#[derive(Debug)]
pub struct Unframe {
    buf: BytesMut,
    max_packet_size: usize,
    done: bool,
}

impl Iterator for Unframe {
    type Item = Result<Packet, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.buf.is_empty() {
            return None;
        }

        match split_packet(&mut self.buf, self.max_packet_size) {
            Ok(Some(packet)) => Some(Ok(packet)),
            Ok(None) => {
                self.done = true;
                Some(Err(ProtocolError::TruncatedStream {
                    remaining: self.buf.len(),
                }))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Unframe {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode_all(packets: &[Packet]) -> Vec<u8> {
        let mut wire = Vec::new();
        for packet in packets {
            packet.encode(&mut wire);
        }
        wire
    }

    #[test]
    fn test_empty_payload_single_eom_packet() {
        let packets = frame(&[], PacketType::SqlBatch, 512).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_end_of_message());
        assert!(packets[0].payload.is_empty());
    }

    #[test]
    fn test_exact_multiple_of_chunk() {
        let payload = vec![1u8; 64];
        let packets = frame(&payload, PacketType::Rpc, 40).unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload.len(), 32);
        assert!(!packets[0].is_end_of_message());
        assert!(packets[1].is_end_of_message());
    }

    #[test]
    fn test_invalid_packet_size() {
        assert!(matches!(
            frame(b"x", PacketType::Rpc, 8),
            Err(ProtocolError::InvalidPacketSize(8))
        ));
        assert!(matches!(
            frame(b"x", PacketType::Rpc, 65536),
            Err(ProtocolError::InvalidPacketSize(65536))
        ));
    }

    #[test]
    fn test_unframe_truncated() {
        let packets = frame(&[9u8; 50], PacketType::Rpc, 40).unwrap();
        let wire = encode_all(&packets);
        let cut = &wire[..wire.len() - 3];

        let results: Vec<_> = unframe(cut, 40).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(ProtocolError::TruncatedStream { remaining: 23 })
        ));
    }

    #[test]
    fn test_unframe_rejects_oversized_header() {
        let packets = frame(&[0u8; 100], PacketType::Rpc, 200).unwrap();
        let wire = encode_all(&packets);

        let mut iter = unframe(&wire, 64);
        assert!(matches!(
            iter.next(),
            Some(Err(ProtocolError::InvalidPacketLength {
                length: 108,
                max: 64
            }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_unframe_rejects_short_length() {
        let wire = [0x04, 0x01, 0x00, 0x04, 0, 0, 0, 0];
        let mut iter = unframe(&wire, 4096);
        assert!(matches!(
            iter.next(),
            Some(Err(ProtocolError::InvalidPacketLength { length: 4, .. }))
        ));
    }

    proptest! {
        #[test]
        fn prop_frame_round_trip(
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
            max in 9usize..600,
        ) {
            let packets = frame(&payload, PacketType::TabularResult, max).unwrap();
            prop_assert_eq!(packets.len(), packet_count(payload.len(), max));
            prop_assert_eq!(
                packets.len(),
                payload.len().div_ceil(max - PACKET_HEADER_SIZE).max(1)
            );

            let eom: Vec<bool> = packets.iter().map(Packet::is_end_of_message).collect();
            prop_assert!(eom[eom.len() - 1]);
            prop_assert!(eom[..eom.len() - 1].iter().all(|e| !e));

            let wire = encode_all(&packets);
            let mut rebuilt = Vec::new();
            for packet in unframe(&wire, max) {
                let packet = packet.unwrap();
                prop_assert!(packet.total_size() <= max);
                rebuilt.extend_from_slice(&packet.payload);
            }
            prop_assert_eq!(rebuilt, payload);
        }
    }
}
