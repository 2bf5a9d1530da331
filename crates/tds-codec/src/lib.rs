//! # tds-codec
//!
//! Framing layer for TDS packet handling.
//!
//! This crate turns logical messages into wire packets and back:
//!
//! - [`frame`] splits a payload into packets no larger than the negotiated
//!   packet size, setting End-Of-Message on the final one only.
//! - [`unframe`] (in-memory) and [`TdsCodec`] (incremental, via tokio-util)
//!   produce packets one at a time as bytes arrive.
//! - [`MessageAssembler`] concatenates packet payloads until EOM.
//! - [`Connection`] ties these to an async transport and exposes an
//!   out-of-band [`CancelHandle`].
//!
//! ## Architecture
//!
//! ```text
//! payload → frame() → TdsCodec (encode) → transport
//! transport → TdsCodec (decode) → MessageAssembler → message
//! ```
//!
//! ```rust
//! use bytes::Bytes;
//! use tds_codec::{frame, unframe};
//! use tds_protocol::PacketType;
//!
//! let payload = Bytes::from(vec![7u8; 100]);
//! let packets = frame(&payload, PacketType::Rpc, 40).unwrap();
//! assert_eq!(packets.len(), 4);
//!
//! let mut wire = Vec::new();
//! for packet in &packets {
//!     packet.encode(&mut wire);
//! }
//! let rebuilt: Vec<u8> = unframe(&wire, 40)
//!     .flat_map(|p| p.unwrap().payload.to_vec())
//!     .collect();
//! assert_eq!(rebuilt, payload);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod framed;
pub mod framing;
pub mod message;
pub mod packet_codec;

pub use connection::{CancelHandle, Connection};
pub use error::CodecError;
pub use framed::{PacketReader, PacketStream, PacketWriter};
pub use framing::{Unframe, frame, packet_count, unframe};
pub use message::{Message, MessageAssembler};
pub use packet_codec::{Packet, TdsCodec};
