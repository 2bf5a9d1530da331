//! The three cursor procedures as a request/response surface.

use tds_protocol::ErrorRecord;

use crate::error::Result;
use crate::fetch::{ConcurrencyOptions, FetchRequest, ScrollOptions};

/// Reply to `sp_cursoropen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenReply {
    /// Procedure return status; non-zero means the open failed.
    pub return_status: i32,
    /// Server-allocated cursor handle.
    pub handle: i32,
    /// Scroll options the server settled on.
    pub scroll: ScrollOptions,
    /// Concurrency options the server settled on.
    pub concurrency: ConcurrencyOptions,
    /// Rows in the result.
    pub row_count: i32,
    /// Errors and informational messages, in arrival order.
    pub messages: Vec<ErrorRecord>,
}

/// Reply to `sp_cursorfetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReply<R> {
    /// Procedure return status (0, or 2 at the start boundary).
    pub return_status: i32,
    /// Rows of the window.
    pub rows: Vec<R>,
    /// Errors and informational messages, in arrival order.
    pub messages: Vec<ErrorRecord>,
}

/// Reply to an `sp_cursorfetch` with fetch type `FETCH_INFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoReply {
    /// Procedure return status.
    pub return_status: i32,
    /// First row of the current window (0 before the first row).
    pub row_number: i32,
    /// Rows in the result.
    pub row_count: i32,
    /// Errors and informational messages, in arrival order.
    pub messages: Vec<ErrorRecord>,
}

/// Reply to `sp_cursorclose`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CloseReply {
    /// Procedure return status.
    pub return_status: i32,
    /// Errors and informational messages, in arrival order.
    pub messages: Vec<ErrorRecord>,
}

/// Executes cursor procedures, one strict round trip per call.
#[allow(async_fn_in_trait)]
pub trait CursorRpc {
    /// Row type returned by fetches.
    type Row;

    /// `sp_cursoropen`.
    async fn cursor_open(
        &mut self,
        sql: &str,
        scroll: ScrollOptions,
        concurrency: ConcurrencyOptions,
    ) -> Result<OpenReply>;

    /// `sp_cursorfetch`.
    async fn cursor_fetch(
        &mut self,
        handle: i32,
        request: FetchRequest,
    ) -> Result<FetchReply<Self::Row>>;

    /// `sp_cursorfetch` with `FETCH_INFO`: position and row count, without
    /// moving.
    async fn cursor_fetch_info(&mut self, handle: i32) -> Result<InfoReply>;

    /// `sp_cursorclose`.
    async fn cursor_close(&mut self, handle: i32) -> Result<CloseReply>;
}
