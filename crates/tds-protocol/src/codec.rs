//! UTF-16 string writers used by the RPC encoder.

use bytes::BufMut;

use crate::prelude::*;

/// Write a `B_VARCHAR`: a 1-byte length in UTF-16 code units, then the
/// UTF-16LE bytes.
///
/// Names longer than 255 code units are truncated.
pub fn write_b_varchar(dst: &mut impl BufMut, s: &str) {
    let units: Vec<u16> = s.encode_utf16().take(255).collect();
    dst.put_u8(units.len() as u8);
    for unit in units {
        dst.put_u16_le(unit);
    }
}

/// Write UTF-16LE bytes with no length prefix.
pub fn write_utf16_string(dst: &mut impl BufMut, s: &str) {
    for unit in s.encode_utf16() {
        dst.put_u16_le(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_b_varchar() {
        let mut buf = Vec::new();
        write_b_varchar(&mut buf, "@cursor");
        assert_eq!(buf[0], 7);
        assert_eq!(buf.len(), 1 + 14);
        assert_eq!(&buf[1..3], &[b'@', 0]);
    }

    #[test]
    fn test_b_varchar_truncates() {
        let mut buf = Vec::new();
        write_b_varchar(&mut buf, &"x".repeat(300));
        assert_eq!(buf[0], 255);
        assert_eq!(buf.len(), 1 + 510);
    }
}
