//! In-process cursor server.
//!
//! [`MemoryCursorServer`] answers the cursor procedures from result sets
//! registered up front, positioning windows with [`resolve`]. It stands in
//! for a live server in tests and offline tools.

use std::collections::HashMap;
use std::sync::Arc;

use tds_protocol::ErrorRecord;

use crate::error::Result;
use crate::fetch::{ConcurrencyOptions, FetchRequest, ScrollOptions};
use crate::rpc::{CloseReply, CursorRpc, FetchReply, InfoReply, OpenReply};
use crate::window::{Position, resolve};

/// Server error 16917.
const CURSOR_NOT_OPEN: i32 = 16917;

const FIRST_HANDLE: i32 = 180_150_001;

struct ServerCursor<R> {
    rows: Arc<[R]>,
    position: Position,
}

/// Cursor server backed by in-memory result sets.
pub struct MemoryCursorServer<R> {
    results: HashMap<String, Arc<[R]>>,
    cursors: HashMap<i32, ServerCursor<R>>,
    next_handle: i32,
    round_trips: usize,
}

impl<R: Clone> MemoryCursorServer<R> {
    /// Create a server with no result sets.
    #[must_use]
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            cursors: HashMap::new(),
            next_handle: FIRST_HANDLE,
            round_trips: 0,
        }
    }

    /// Register the rows a statement produces.
    #[must_use]
    pub fn with_result(mut self, sql: impl Into<String>, rows: impl Into<Vec<R>>) -> Self {
        let rows: Vec<R> = rows.into();
        self.results.insert(sql.into(), Arc::from(rows));
        self
    }

    /// Requests answered so far.
    #[must_use]
    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    /// Handles currently open.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// Position of an open cursor.
    #[must_use]
    pub fn position(&self, handle: i32) -> Option<Position> {
        self.cursors.get(&handle).map(|c| c.position)
    }
}

impl<R: Clone> Default for MemoryCursorServer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> std::fmt::Debug for MemoryCursorServer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCursorServer")
            .field("results", &self.results.len())
            .field("open_cursors", &self.cursors.len())
            .field("round_trips", &self.round_trips)
            .finish()
    }
}

fn not_open(procedure: &str) -> Vec<ErrorRecord> {
    vec![ErrorRecord::new(CURSOR_NOT_OPEN, 16, "Cursor is not open.").with_procedure(procedure)]
}

impl<R: Clone> CursorRpc for MemoryCursorServer<R> {
    type Row = R;

    async fn cursor_open(
        &mut self,
        sql: &str,
        scroll: ScrollOptions,
        concurrency: ConcurrencyOptions,
    ) -> Result<OpenReply> {
        self.round_trips += 1;
        // The server reports back the options it applied, minus the
        // request-only bit.
        let scroll = scroll.difference(ScrollOptions::PARAMETERIZED);

        let Some(rows) = self.results.get(sql) else {
            tracing::debug!(sql, "no result registered for statement");
            return Ok(OpenReply {
                return_status: 1,
                handle: 0,
                scroll,
                concurrency,
                row_count: 0,
                messages: Vec::new(),
            });
        };

        let handle = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        let row_count = i32::try_from(rows.len()).unwrap_or(i32::MAX);
        self.cursors.insert(
            handle,
            ServerCursor {
                rows: Arc::clone(rows),
                position: Position::default(),
            },
        );

        Ok(OpenReply {
            return_status: 0,
            handle,
            scroll,
            concurrency,
            row_count,
            messages: Vec::new(),
        })
    }

    async fn cursor_fetch(
        &mut self,
        handle: i32,
        request: FetchRequest,
    ) -> Result<FetchReply<R>> {
        self.round_trips += 1;
        let Some(cursor) = self.cursors.get_mut(&handle) else {
            return Ok(FetchReply {
                return_status: 1,
                rows: Vec::new(),
                messages: not_open("sp_cursorfetch"),
            });
        };

        let row_count = i32::try_from(cursor.rows.len()).unwrap_or(i32::MAX);
        let window = resolve(request, row_count, cursor.position);
        cursor.position = window.position;

        let rows = cursor
            .rows
            .get(window.range())
            .map(<[R]>::to_vec)
            .unwrap_or_default();

        tracing::trace!(
            handle,
            first = window.first,
            len = window.len,
            status = window.status.code(),
            "resolved fetch window"
        );

        Ok(FetchReply {
            return_status: window.status.code(),
            rows,
            messages: Vec::new(),
        })
    }

    async fn cursor_fetch_info(&mut self, handle: i32) -> Result<InfoReply> {
        self.round_trips += 1;
        let Some(cursor) = self.cursors.get(&handle) else {
            return Ok(InfoReply {
                return_status: 1,
                row_number: 0,
                row_count: 0,
                messages: not_open("sp_cursorfetch"),
            });
        };

        Ok(InfoReply {
            return_status: 0,
            row_number: cursor.position.start,
            row_count: i32::try_from(cursor.rows.len()).unwrap_or(i32::MAX),
            messages: Vec::new(),
        })
    }

    async fn cursor_close(&mut self, handle: i32) -> Result<CloseReply> {
        self.round_trips += 1;
        if self.cursors.remove(&handle).is_none() {
            return Ok(CloseReply {
                return_status: 1,
                messages: not_open("sp_cursorclose"),
            });
        }
        Ok(CloseReply::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchType;

    fn server() -> MemoryCursorServer<i32> {
        MemoryCursorServer::new().with_result("select n from t", (1..=5).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_open_allocates_distinct_handles() {
        let mut server = server();
        let a = server
            .cursor_open(
                "select n from t",
                ScrollOptions::STATIC | ScrollOptions::PARAMETERIZED,
                ConcurrencyOptions::READ_ONLY,
            )
            .await
            .unwrap();
        let b = server
            .cursor_open("select n from t", ScrollOptions::KEYSET, ConcurrencyOptions::READ_ONLY)
            .await
            .unwrap();

        assert_ne!(a.handle, b.handle);
        assert_eq!(a.row_count, 5);
        assert_eq!(a.scroll, ScrollOptions::STATIC);
        assert_eq!(server.open_cursors(), 2);
        assert_eq!(server.round_trips(), 2);
    }

    #[tokio::test]
    async fn test_fetch_moves_position() {
        let mut server = server();
        let open = server
            .cursor_open("select n from t", ScrollOptions::KEYSET, ConcurrencyOptions::READ_ONLY)
            .await
            .unwrap();

        let reply = server
            .cursor_fetch(open.handle, FetchRequest::new(FetchType::Last, 0, 2))
            .await
            .unwrap();
        assert_eq!(reply.rows, vec![4, 5]);

        let info = server.cursor_fetch_info(open.handle).await.unwrap();
        assert_eq!((info.row_number, info.row_count), (4, 5));

        let reply = server
            .cursor_fetch(open.handle, FetchRequest::new(FetchType::Next, 0, 2))
            .await
            .unwrap();
        assert!(reply.rows.is_empty());
        assert_eq!(reply.return_status, 0);
        assert_eq!(server.position(open.handle).unwrap().start, 6);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let mut server = server();
        let reply = server
            .cursor_fetch(7, FetchRequest::new(FetchType::Next, 0, 1))
            .await
            .unwrap();
        assert_eq!(reply.return_status, 1);
        assert_eq!(reply.messages[0].number, CURSOR_NOT_OPEN);

        let reply = server.cursor_close(7).await.unwrap();
        assert_eq!(reply.messages[0].number, CURSOR_NOT_OPEN);
    }

    #[tokio::test]
    async fn test_unknown_statement_fails_open() {
        let mut server = server();
        let reply = server
            .cursor_open("select 1", ScrollOptions::KEYSET, ConcurrencyOptions::READ_ONLY)
            .await
            .unwrap();
        assert_eq!(reply.return_status, 1);
        assert_eq!(server.open_cursors(), 0);
    }
}
