//! # tds-tls
//!
//! TLS negotiation for TDS sessions.
//!
//! In TDS 7.x the TLS handshake runs after the cleartext PreLogin exchange,
//! with every TLS record carried inside PreLogin packets:
//!
//! ```text
//! TCP Connect → PreLogin (cleartext) → TLS Handshake (in PreLogin packets) → Login (encrypted)
//! ```
//!
//! The server wants ClientKeyExchange, ChangeCipherSpec and Finished in one
//! packet and one transport write. [`BatchState`] decides per record whether
//! it is sent, deferred or dropped; [`HandshakeStream`] applies those
//! decisions to an async transport; [`TlsConnector`] drives rustls over it.
//!
//! TDS 8.0 strict mode skips the PreLogin framing and runs TLS directly on
//! the transport ([`TlsConnector::connect_strict`]).
//!
//! ```rust
//! use tds_tls::{BatchState, Outcome};
//!
//! let ccs = [20, 3, 3, 0, 1, 1];
//! let cke = [22, 3, 3, 0, 6, 16, 0, 0, 2, 0xAA, 0xBB];
//! let fin = [22, 3, 3, 0, 5, 20, 0, 0, 1, 0xCC];
//!
//! let (state, first) = BatchState::PassThrough.step(&cke);
//! let (state, second) = state.step(&ccs);
//! let (state, third) = state.step(&fin);
//!
//! assert_eq!(first, Outcome::Deferred);
//! assert_eq!(second, Outcome::Deferred);
//! assert_eq!(third, Outcome::Packet([&cke[..], &ccs[..], &fin[..]].concat().into()));
//! assert_eq!(state, BatchState::PassThrough);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod batch;
pub mod config;
pub mod connector;
pub mod error;
pub mod record;
pub mod stream;

pub use batch::{BatchState, Outcome};
pub use config::{TlsConfig, TlsVersion};
pub use connector::TlsConnector;
pub use error::TlsError;
pub use record::{ContentType, HandshakeType};
pub use stream::HandshakeStream;

// Re-export tokio-rustls stream type for convenience
pub use tokio_rustls::client::TlsStream;
