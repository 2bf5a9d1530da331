//! # tds-cursor
//!
//! Client side of the TDS server cursor protocol.
//!
//! A [`Cursor`] opens a server-side cursor over a statement with
//! `sp_cursoropen`, pages through the result with `sp_cursorfetch` and
//! releases it with `sp_cursorclose`. The procedures are reached through
//! the [`CursorRpc`] trait:
//!
//! - [`WireCursorRpc`] sends them as RPC messages over a
//!   [`tds_codec::Connection`];
//! - [`MemoryCursorServer`] answers them in-process from registered result
//!   sets.
//!
//! ## Example
//!
//! ```rust
//! use tds_cursor::{Cursor, FetchStatus, FetchType, MemoryCursorServer};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let server = MemoryCursorServer::new().with_result("select n from t", (1..=10).collect::<Vec<i32>>());
//! let mut cursor = Cursor::new(server);
//!
//! let opened = cursor.open_default("select n from t").await?;
//! assert_eq!(opened.row_count, 10);
//!
//! let page = cursor.fetch(FetchType::Next, 0, 2).await?;
//! assert_eq!(page.rows, vec![1, 2]);
//!
//! let page = cursor.fetch(FetchType::Previous, 0, 2).await?;
//! assert_eq!(page.rows, vec![1, 2]);
//! assert_eq!(page.status, FetchStatus::Boundary);
//!
//! cursor.close().await?;
//! # Ok::<(), tds_cursor::Error>(())
//! # }).unwrap();
//! ```
//!
//! ## Errors
//!
//! Boundary conditions are reported through [`FetchResult::status`], never
//! as errors. Protocol and transport failures poison the cursor; server
//! errors leave it usable.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod fetch;
pub mod memory;
pub mod rpc;
pub mod window;
pub mod wire;

pub use config::CursorConfig;
pub use cursor::{Cursor, CursorState, FetchResult, OpenedCursor};
pub use error::{Error, Result, ServerErrors};
pub use events::{CursorEvent, EventListeners, ListenerId};
pub use fetch::{ConcurrencyOptions, FetchRequest, FetchType, ScrollOptions};
pub use memory::MemoryCursorServer;
pub use rpc::{CloseReply, CursorRpc, FetchReply, InfoReply, OpenReply};
pub use window::{FetchStatus, Position, Window, resolve};
pub use wire::{ReplyDecoder, RpcReply, WireCursorRpc};
