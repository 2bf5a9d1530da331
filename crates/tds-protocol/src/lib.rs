//! # tds-protocol
//!
//! Wire-level building blocks of the Tabular Data Stream (TDS) protocol used
//! by Microsoft SQL Server and Sybase.
//!
//! This crate is intentionally IO-agnostic. It defines the 8-byte packet
//! header, the RPC request encoding used for the `sp_cursor*` procedures, and
//! the server message records (error number, severity, SQLSTATE) that higher
//! layers attach to their errors. Framing over a live transport lives in
//! `tds-codec`.
//!
//! ## Features
//!
//! - `std` (default): Enable standard library support
//! - `alloc`: Enable allocation without full std (requires `alloc` crate)
//!
//! ## Example
//!
//! ```rust
//! use tds_protocol::{PacketHeader, PacketStatus, PacketType};
//!
//! let header = PacketHeader::new(PacketType::Rpc, PacketStatus::END_OF_MESSAGE, 100);
//! assert_eq!(header.payload_length(), 92);
//! assert!(header.is_end_of_message());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod codec;
pub mod error;
pub mod message;
pub mod packet;
pub mod rpc;
pub mod sqlstate;

mod prelude;

pub use error::ProtocolError;
pub use message::{ErrorRecord, ServerKind};
pub use packet::{
    DEFAULT_PACKET_SIZE, MAX_PACKET_SIZE, MIN_PACKET_SIZE, PACKET_HEADER_SIZE, PacketHeader,
    PacketStatus, PacketType,
};
pub use rpc::{ParamFlags, ProcId, RpcOptionFlags, RpcParam, RpcRequest, TypeInfo as RpcTypeInfo};
