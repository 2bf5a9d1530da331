//! TLS record and handshake sub-record headers.
//!
//! Only the fields needed to decide how a record is batched are read; record
//! bodies stay opaque.

/// TLS record header size: content type, version, length.
pub const TLS_HEADER_SIZE: usize = 5;

/// Handshake sub-header size: type and 24-bit length.
pub const HANDSHAKE_HEADER_SIZE: usize = 4;

/// TLS record content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ContentType {
    /// ChangeCipherSpec.
    ChangeCipherSpec = 20,
    /// Alert.
    Alert = 21,
    /// Handshake.
    Handshake = 22,
    /// Application data.
    ApplicationData = 23,
}

impl ContentType {
    /// Map a content type byte, `None` outside 20..=23.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            _ => None,
        }
    }
}

/// Handshake message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeType {
    /// ClientHello.
    ClientHello,
    /// ClientKeyExchange.
    ClientKeyExchange,
    /// Finished.
    Finished,
    /// Any other handshake message.
    Other(u8),
}

impl From<u8> for HandshakeType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::ClientHello,
            16 => Self::ClientKeyExchange,
            20 => Self::Finished,
            other => Self::Other(other),
        }
    }
}

/// A well-formed TLS record: known content type and a declared length that
/// matches the bytes present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Record content type.
    pub content_type: ContentType,
    /// Whole record including the 5-byte header.
    pub bytes: &'a [u8],
}

impl<'a> Record<'a> {
    /// Parse `buf` as exactly one record.
    ///
    /// Returns `None` for buffers shorter than a header, unknown content
    /// types and length mismatches (legacy SSLv2 hello).
    #[must_use]
    pub fn parse(buf: &'a [u8]) -> Option<Self> {
        let (content_type, length) = header(buf)?;
        (length == buf.len() - TLS_HEADER_SIZE).then_some(Self {
            content_type,
            bytes: buf,
        })
    }

    /// Record body after the header.
    #[must_use]
    pub fn body(&self) -> &'a [u8] {
        &self.bytes[TLS_HEADER_SIZE..]
    }

    /// Handshake sub-header, if this is a Handshake record long enough to
    /// carry one.
    ///
    /// The flag is true when the sub-record's declared length covers the
    /// rest of the record exactly.
    #[must_use]
    pub fn handshake(&self) -> Option<(HandshakeType, bool)> {
        if self.content_type != ContentType::Handshake {
            return None;
        }
        let body = self.body();
        if body.len() < HANDSHAKE_HEADER_SIZE {
            return None;
        }
        let hs_len = u32::from_be_bytes([0, body[1], body[2], body[3]]) as usize;
        Some((
            HandshakeType::from(body[0]),
            hs_len == body.len() - HANDSHAKE_HEADER_SIZE,
        ))
    }
}

fn header(buf: &[u8]) -> Option<(ContentType, usize)> {
    if buf.len() < TLS_HEADER_SIZE {
        return None;
    }
    let content_type = ContentType::from_u8(buf[0])?;
    let length = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    Some((content_type, length))
}

/// Split a write holding two or more back-to-back well-formed records.
///
/// Returns `None` unless the whole buffer is covered by at least two
/// records, so single records and anything malformed are classified as one
/// buffer.
#[must_use]
pub fn split_records(buf: &[u8]) -> Option<Vec<&[u8]>> {
    let mut records = Vec::new();
    let mut rest = buf;
    while !rest.is_empty() {
        let (_, length) = header(rest)?;
        let end = TLS_HEADER_SIZE + length;
        if end > rest.len() {
            return None;
        }
        let (record, tail) = rest.split_at(end);
        records.push(record);
        rest = tail;
    }
    (records.len() >= 2).then_some(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CCS: [u8; 6] = [20, 3, 3, 0, 1, 1];

    #[test]
    fn test_parse_change_cipher_spec() {
        let record = Record::parse(&CCS).unwrap();
        assert_eq!(record.content_type, ContentType::ChangeCipherSpec);
        assert_eq!(record.body(), &[1]);
        assert!(record.handshake().is_none());
    }

    #[test]
    fn test_parse_rejects_length_mismatch() {
        assert!(Record::parse(&[22, 3, 3, 0, 9, 1, 0, 0, 0]).is_none());
        assert!(Record::parse(&[0x80, 0x2e, 1, 3, 1]).is_none());
        assert!(Record::parse(&[22, 3, 3]).is_none());
    }

    #[test]
    fn test_handshake_sub_header() {
        let hello = [22, 3, 1, 0, 6, 1, 0, 0, 2, 0xAA, 0xBB];
        let record = Record::parse(&hello).unwrap();
        assert_eq!(record.handshake(), Some((HandshakeType::ClientHello, true)));

        let encrypted_finished = [22, 3, 3, 0, 6, 0x9C, 0x11, 0x22, 0x33, 0x44, 0x55];
        let record = Record::parse(&encrypted_finished).unwrap();
        assert_eq!(
            record.handshake(),
            Some((HandshakeType::Other(0x9C), false))
        );

        let short = [22, 3, 3, 0, 2, 16, 0];
        assert!(Record::parse(&short).unwrap().handshake().is_none());
    }

    #[test]
    fn test_split_records() {
        let mut coalesced = CCS.to_vec();
        coalesced.extend_from_slice(&[22, 3, 3, 0, 4, 20, 0, 0, 0]);
        let records = split_records(&coalesced).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], &CCS);

        assert!(split_records(&CCS).is_none());
        coalesced.push(0);
        assert!(split_records(&coalesced).is_none());
    }
}
