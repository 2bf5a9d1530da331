//! RPC (Remote Procedure Call) request encoding.
//!
//! This module provides encoding for RPC requests (packet type 0x03). The
//! server cursor protocol is driven entirely through RPC: `sp_cursoropen`,
//! `sp_cursorfetch` and `sp_cursorclose` are addressed by their well-known
//! procedure IDs and take positional parameters.
//!
//! ## Wire Format
//!
//! ```text
//! RPC Request:
//! +-------------------+
//! | ALL_HEADERS       | (TDS 7.2+)
//! +-------------------+
//! | ProcName/ProcID   | (procedure identifier)
//! +-------------------+
//! | Option Flags      | (2 bytes)
//! +-------------------+
//! | Parameters        | (repeated)
//! +-------------------+
//! ```

use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{write_b_varchar, write_utf16_string};
use crate::prelude::*;

/// Well-known stored procedure IDs.
///
/// These are special procedure IDs that SQL Server recognizes
/// without requiring the procedure name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ProcId {
    /// sp_cursoropen (0x0002)
    CursorOpen = 0x0002,
    /// sp_cursorfetch (0x0007)
    CursorFetch = 0x0007,
    /// sp_cursorclose (0x0009)
    CursorClose = 0x0009,
}

impl ProcId {
    /// Procedure name as used in server messages and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CursorOpen => "sp_cursoropen",
            Self::CursorFetch => "sp_cursorfetch",
            Self::CursorClose => "sp_cursorclose",
        }
    }
}

/// `sp_cursorfetch` fetch type asking for position information only.
pub const FETCH_INFO: i32 = 0x100;

bitflags! {
    /// RPC option flags (2 bytes on the wire).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RpcOptionFlags: u16 {
        /// No metadata in response.
        const NO_METADATA = 0x0002;
    }
}

bitflags! {
    /// RPC parameter status flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        /// Passed by reference (OUTPUT parameter).
        const BY_REF = 0x01;
        /// Use the parameter's default value.
        const DEFAULT_VALUE = 0x02;
    }
}

/// Default collation (Latin1_General_CI_AS equivalent).
const DEFAULT_COLLATION: [u8; 5] = [0x09, 0x04, 0xD0, 0x00, 0x34];

/// TDS type information for RPC parameters.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Type ID.
    pub type_id: u8,
    /// Maximum length for variable-length types.
    pub max_length: Option<u16>,
    /// Collation for string types.
    pub collation: Option<[u8; 5]>,
}

impl TypeInfo {
    /// Create type info for INT.
    pub fn int() -> Self {
        Self {
            type_id: 0x26, // INTNTYPE (variable-length int)
            max_length: Some(4),
            collation: None,
        }
    }

    /// Create type info for NVARCHAR with max length.
    pub fn nvarchar(max_len: u16) -> Self {
        Self {
            type_id: 0xE7,                 // NVARCHARTYPE
            max_length: Some(max_len * 2), // UTF-16, so double the char count
            collation: Some(DEFAULT_COLLATION),
        }
    }

    /// Create type info for NVARCHAR(MAX).
    pub fn nvarchar_max() -> Self {
        Self {
            type_id: 0xE7,            // NVARCHARTYPE
            max_length: Some(0xFFFF), // MAX indicator
            collation: Some(DEFAULT_COLLATION),
        }
    }

    /// Encode type info to buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.type_id);

        match self.type_id {
            0x26 => {
                if let Some(len) = self.max_length {
                    buf.put_u8(len as u8);
                }
            }
            0xE7 => {
                if let Some(len) = self.max_length {
                    buf.put_u16_le(len);
                }
                if let Some(collation) = self.collation {
                    buf.put_slice(&collation);
                }
            }
            _ => {}
        }
    }
}

/// An RPC parameter.
#[derive(Debug, Clone)]
pub struct RpcParam {
    /// Parameter name (empty for positional params).
    pub name: String,
    /// Status flags.
    pub flags: ParamFlags,
    /// Type information.
    pub type_info: TypeInfo,
    /// Parameter value (raw bytes).
    pub value: Option<Bytes>,
}

impl RpcParam {
    /// Create a new parameter with a value.
    pub fn new(name: impl Into<String>, type_info: TypeInfo, value: Bytes) -> Self {
        Self {
            name: name.into(),
            flags: ParamFlags::empty(),
            type_info,
            value: Some(value),
        }
    }

    /// Create a NULL parameter.
    pub fn null(name: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            name: name.into(),
            flags: ParamFlags::empty(),
            type_info,
            value: None,
        }
    }

    /// Create an INT parameter.
    pub fn int(name: impl Into<String>, value: i32) -> Self {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_i32_le(value);
        Self::new(name, TypeInfo::int(), buf.freeze())
    }

    /// Create an NVARCHAR parameter.
    pub fn nvarchar(name: impl Into<String>, value: &str) -> Self {
        let mut buf = BytesMut::new();
        write_utf16_string(&mut buf, value);
        let char_len = value.encode_utf16().count();
        let type_info = if char_len > 4000 {
            TypeInfo::nvarchar_max()
        } else {
            TypeInfo::nvarchar(char_len.max(1) as u16)
        };
        Self::new(name, type_info, buf.freeze())
    }

    /// Mark as output parameter.
    #[must_use]
    pub fn as_output(mut self) -> Self {
        self.flags |= ParamFlags::BY_REF;
        self
    }

    /// Encode the parameter to buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        write_b_varchar(buf, &self.name);
        buf.put_u8(self.flags.bits());
        self.type_info.encode(buf);

        match (&self.value, self.type_info.type_id) {
            (Some(value), 0xE7) if self.type_info.max_length == Some(0xFFFF) => {
                // PLP, sent as a single chunk
                buf.put_u64_le(value.len() as u64);
                buf.put_u32_le(value.len() as u32);
                buf.put_slice(value);
                buf.put_u32_le(0);
            }
            (Some(value), 0xE7) => {
                buf.put_u16_le(value.len() as u16);
                buf.put_slice(value);
            }
            (Some(value), _) => {
                buf.put_u8(value.len() as u8);
                buf.put_slice(value);
            }
            (None, 0xE7) if self.type_info.max_length == Some(0xFFFF) => {
                buf.put_u64_le(0xFFFF_FFFF_FFFF_FFFF);
            }
            (None, 0xE7) => buf.put_u16_le(0xFFFF),
            (None, _) => buf.put_u8(0),
        }
    }
}

/// RPC request addressed by well-known procedure ID.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    proc_id: ProcId,
    options: RpcOptionFlags,
    params: Vec<RpcParam>,
}

impl RpcRequest {
    /// Create a request with no parameters.
    pub fn by_id(proc_id: ProcId) -> Self {
        Self {
            proc_id,
            options: RpcOptionFlags::empty(),
            params: Vec::new(),
        }
    }

    /// Create an `sp_cursoropen` request.
    ///
    /// Parameters: cursor handle (OUT), statement, scroll options (INOUT),
    /// concurrency options (INOUT), row count (OUT).
    ///
    /// ```
    /// use tds_protocol::rpc::{ProcId, RpcRequest};
    ///
    /// let rpc = RpcRequest::cursor_open("select * from t order by id", 0x01, 0x02);
    /// assert_eq!(rpc.proc_id(), ProcId::CursorOpen);
    /// assert_eq!(rpc.params().len(), 5);
    /// ```
    pub fn cursor_open(sql: &str, scroll_options: i32, concurrency_options: i32) -> Self {
        Self::by_id(ProcId::CursorOpen)
            .param(RpcParam::null("", TypeInfo::int()).as_output())
            .param(RpcParam::nvarchar("", sql))
            .param(RpcParam::int("", scroll_options).as_output())
            .param(RpcParam::int("", concurrency_options).as_output())
            .param(RpcParam::null("", TypeInfo::int()).as_output())
    }

    /// Create an `sp_cursorfetch` request that moves the cursor.
    pub fn cursor_fetch(handle: i32, fetch_type: i32, row_number: i32, number_of_rows: i32) -> Self {
        Self::by_id(ProcId::CursorFetch)
            .param(RpcParam::int("", handle))
            .param(RpcParam::int("", fetch_type))
            .param(RpcParam::int("", row_number))
            .param(RpcParam::int("", number_of_rows))
    }

    /// Create an `sp_cursorfetch` request that reports position and row count.
    pub fn cursor_fetch_info(handle: i32) -> Self {
        Self::by_id(ProcId::CursorFetch)
            .param(RpcParam::int("", handle))
            .param(RpcParam::int("", FETCH_INFO))
            .param(RpcParam::null("", TypeInfo::int()).as_output())
            .param(RpcParam::null("", TypeInfo::int()).as_output())
    }

    /// Create an `sp_cursorclose` request.
    pub fn cursor_close(handle: i32) -> Self {
        Self::by_id(ProcId::CursorClose).param(RpcParam::int("", handle))
    }

    /// Set option flags.
    #[must_use]
    pub fn with_options(mut self, options: RpcOptionFlags) -> Self {
        self.options = options;
        self
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, param: RpcParam) -> Self {
        self.params.push(param);
        self
    }

    /// Procedure addressed by this request.
    #[must_use]
    pub fn proc_id(&self) -> ProcId {
        self.proc_id
    }

    /// Parameters in wire order.
    #[must_use]
    pub fn params(&self) -> &[RpcParam] {
        &self.params
    }

    /// Encode the RPC request to bytes (auto-commit mode).
    #[must_use]
    pub fn encode(&self) -> Bytes {
        self.encode_with_transaction(0)
    }

    /// Encode the RPC request with a transaction descriptor.
    ///
    /// For auto-commit mode (no explicit transaction), use 0.
    #[must_use]
    pub fn encode_with_transaction(&self, transaction_descriptor: u64) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);

        // ALL_HEADERS: total length + one transaction descriptor header
        let all_headers_start = buf.len();
        buf.put_u32_le(0);
        buf.put_u32_le(18);
        buf.put_u16_le(0x0002);
        buf.put_u64_le(transaction_descriptor);
        buf.put_u32_le(1);

        let all_headers_len = buf.len() - all_headers_start;
        let len_bytes = (all_headers_len as u32).to_le_bytes();
        buf[all_headers_start..all_headers_start + 4].copy_from_slice(&len_bytes);

        // Name length 0xFFFF means a PROCID follows
        buf.put_u16_le(0xFFFF);
        buf.put_u16_le(self.proc_id as u16);
        buf.put_u16_le(self.options.bits());

        for param in &self.params {
            param.encode(&mut buf);
        }

        buf.freeze()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Offset of the procedure identifier, right after ALL_HEADERS.
    const PROC_OFFSET: usize = 22;

    #[test]
    fn test_proc_id_values() {
        assert_eq!(ProcId::CursorOpen as u16, 0x0002);
        assert_eq!(ProcId::CursorFetch as u16, 0x0007);
        assert_eq!(ProcId::CursorClose as u16, 0x0009);
        assert_eq!(ProcId::CursorFetch.name(), "sp_cursorfetch");
    }

    #[test]
    fn test_option_flags_encoded() {
        let encoded = RpcRequest::cursor_close(1)
            .with_options(RpcOptionFlags::NO_METADATA)
            .encode();
        assert_eq!(&encoded[PROC_OFFSET + 4..PROC_OFFSET + 6], &[0x02, 0x00]);
    }

    #[test]
    fn test_int_param_encoding() {
        let mut buf = BytesMut::new();
        RpcParam::int("", 0x20).encode(&mut buf);
        // name len, flags, INTN, max len, value len, value
        assert_eq!(&buf[..], &[0x00, 0x00, 0x26, 0x04, 0x04, 0x20, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_null_output_param_encoding() {
        let mut buf = BytesMut::new();
        RpcParam::null("", TypeInfo::int()).as_output().encode(&mut buf);
        assert_eq!(&buf[..], &[0x00, 0x01, 0x26, 0x04, 0x00]);
    }

    #[test]
    fn test_cursor_open_request() {
        let rpc = RpcRequest::cursor_open("select 1", 0x01, 0x02);
        let params = rpc.params();
        assert!(params[0].flags.contains(ParamFlags::BY_REF));
        assert!(!params[1].flags.contains(ParamFlags::BY_REF));
        assert!(params[2].flags.contains(ParamFlags::BY_REF));
        assert!(params[3].flags.contains(ParamFlags::BY_REF));
        assert!(params[4].flags.contains(ParamFlags::BY_REF));
        assert!(params[4].value.is_none());
    }

    #[test]
    fn test_cursor_fetch_encodes_proc_id() {
        let encoded = RpcRequest::cursor_fetch(180150003, 0x02, 1, 2).encode();
        assert_eq!(&encoded[..4], &[22, 0, 0, 0]);
        assert_eq!(
            &encoded[PROC_OFFSET..PROC_OFFSET + 4],
            &[0xFF, 0xFF, ProcId::CursorFetch as u8, 0x00]
        );
        // four INT params of 9 bytes each after the option flags
        assert_eq!(encoded.len(), PROC_OFFSET + 4 + 2 + 4 * 9);
    }

    #[test]
    fn test_cursor_fetch_info_request() {
        let rpc = RpcRequest::cursor_fetch_info(7);
        assert_eq!(rpc.proc_id(), ProcId::CursorFetch);
        assert!(rpc.params()[2].flags.contains(ParamFlags::BY_REF));
        assert!(rpc.params()[3].flags.contains(ParamFlags::BY_REF));
    }

    #[test]
    fn test_cursor_close_request() {
        let rpc = RpcRequest::cursor_close(123);
        assert_eq!(rpc.proc_id(), ProcId::CursorClose);
        assert_eq!(rpc.params().len(), 1);
    }
}
