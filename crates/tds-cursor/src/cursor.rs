//! Client-side cursor state machine.
//!
//! ```text
//! Closed ──open──▶ Open ──fetch──▶ Open ──close──▶ Closed
//!                    │
//!                    └──fatal error──▶ Poisoned
//! ```
//!
//! Every operation is one request/response exchange with the server; the
//! `&mut self` receivers keep a cursor from having two requests in flight.

use std::fmt;

use tds_protocol::{ErrorRecord, ProtocolError};

use crate::config::CursorConfig;
use crate::error::{Error, Result, ServerErrors};
use crate::events::{CursorEvent, EventListeners};
use crate::fetch::{ConcurrencyOptions, FetchRequest, FetchType, ScrollOptions};
use crate::rpc::CursorRpc;
use crate::window::FetchStatus;

/// Lifecycle state of a [`Cursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// No server handle.
    Closed,
    /// A server handle is held.
    Open,
    /// A fatal error occurred; the session must be discarded.
    Poisoned,
}

impl fmt::Display for CursorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Poisoned => "poisoned",
        })
    }
}

/// Result of a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenedCursor {
    /// Server-allocated handle.
    pub handle: i32,
    /// Scroll options the server settled on.
    pub scroll: ScrollOptions,
    /// Concurrency options the server settled on.
    pub concurrency: ConcurrencyOptions,
    /// Rows in the result.
    pub row_count: i32,
}

/// Result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult<R> {
    /// Rows of the window.
    pub rows: Vec<R>,
    /// First row of the current window: 0 before the first row,
    /// `row_count + 1` after the last.
    pub current_row: i32,
    /// Boundary status.
    pub status: FetchStatus,
    /// Informational messages received with the reply.
    pub warnings: Vec<ErrorRecord>,
}

#[derive(Debug)]
enum Session {
    Closed,
    Open {
        cursor: OpenedCursor,
        current_row: Option<i32>,
        /// Last non-refresh request, re-issued by Refresh.
        last_request: Option<FetchRequest>,
    },
    Poisoned,
}

impl Session {
    fn state(&self) -> CursorState {
        match self {
            Self::Closed => CursorState::Closed,
            Self::Open { .. } => CursorState::Open,
            Self::Poisoned => CursorState::Poisoned,
        }
    }
}

/// A server-side scrollable cursor driven through [`CursorRpc`].
pub struct Cursor<R: CursorRpc> {
    rpc: R,
    config: CursorConfig,
    session: Session,
    listeners: EventListeners<CursorEvent>,
}

impl<R: CursorRpc> Cursor<R> {
    /// Create a closed cursor with default configuration.
    pub fn new(rpc: R) -> Self {
        Self::with_config(rpc, CursorConfig::default())
    }

    /// Create a closed cursor.
    pub fn with_config(rpc: R, config: CursorConfig) -> Self {
        Self {
            rpc,
            config,
            session: Session::Closed,
            listeners: EventListeners::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.session.state()
    }

    /// Server handle while open.
    #[must_use]
    pub fn handle(&self) -> Option<i32> {
        match &self.session {
            Session::Open { cursor, .. } => Some(cursor.handle),
            _ => None,
        }
    }

    /// Row count reported by the server while open.
    #[must_use]
    pub fn row_count(&self) -> Option<i32> {
        match &self.session {
            Session::Open { cursor, .. } => Some(cursor.row_count),
            _ => None,
        }
    }

    /// First row of the current window; `None` until the first fetch.
    #[must_use]
    pub fn current_row(&self) -> Option<i32> {
        match &self.session {
            Session::Open { current_row, .. } => *current_row,
            _ => None,
        }
    }

    /// Listeners notified of lifecycle events.
    #[must_use]
    pub fn listeners(&self) -> &EventListeners<CursorEvent> {
        &self.listeners
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CursorConfig {
        &self.config
    }

    /// Get a reference to the RPC executor.
    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Consume the cursor and return the RPC executor.
    pub fn into_inner(self) -> R {
        self.rpc
    }

    /// Open a cursor over `sql` (`sp_cursoropen`).
    pub async fn open(
        &mut self,
        sql: &str,
        scroll: ScrollOptions,
        concurrency: ConcurrencyOptions,
    ) -> Result<OpenedCursor> {
        self.require(CursorState::Closed, "open")?;

        let result = self.rpc.cursor_open(sql, scroll, concurrency).await;
        let reply = self.check(result)?;
        take_warnings(reply.messages)?;

        if reply.return_status != 0 {
            return Err(self.fail(ProtocolError::ProcedureFailed {
                procedure: "sp_cursoropen",
                status: reply.return_status,
            }));
        }

        let cursor = OpenedCursor {
            handle: reply.handle,
            scroll: reply.scroll,
            concurrency: reply.concurrency,
            row_count: reply.row_count,
        };
        self.session = Session::Open {
            cursor,
            current_row: None,
            last_request: None,
        };

        tracing::debug!(
            handle = cursor.handle,
            row_count = cursor.row_count,
            scroll = cursor.scroll.bits(),
            concurrency = cursor.concurrency.bits(),
            "cursor opened"
        );
        self.listeners.dispatch(&CursorEvent::Opened {
            handle: cursor.handle,
            row_count: cursor.row_count,
        });
        Ok(cursor)
    }

    /// Open with the configured scroll and concurrency options.
    pub async fn open_default(&mut self, sql: &str) -> Result<OpenedCursor> {
        let (scroll, concurrency) = (self.config.scroll, self.config.concurrency);
        self.open(sql, scroll, concurrency).await
    }

    /// Fetch a window (`sp_cursorfetch`).
    ///
    /// `number_of_rows` must be at least 1, except for
    /// [`FetchType::Refresh`], which re-issues the previous request and
    /// ignores both `row_number` and `number_of_rows`.
    pub async fn fetch(
        &mut self,
        fetch_type: FetchType,
        row_number: i32,
        number_of_rows: i32,
    ) -> Result<FetchResult<R::Row>> {
        let (handle, last_request) = match &self.session {
            Session::Open {
                cursor,
                last_request,
                ..
            } => (cursor.handle, *last_request),
            other => {
                return Err(Error::IllegalState {
                    operation: "fetch from",
                    state: other.state(),
                });
            }
        };

        let request = if fetch_type == FetchType::Refresh {
            let previous = last_request.unwrap_or(FetchRequest::new(FetchType::Refresh, 0, 0));
            FetchRequest::new(FetchType::Refresh, 0, previous.number_of_rows)
        } else if number_of_rows <= 0 {
            return Err(Error::InvalidFetchSize(number_of_rows));
        } else {
            FetchRequest::new(fetch_type, row_number, number_of_rows)
        };

        let result = self.rpc.cursor_fetch(handle, request).await;
        let reply = self.check(result)?;
        let mut warnings = take_warnings(reply.messages)?;

        let result = self.rpc.cursor_fetch_info(handle).await;
        let info = self.check(result)?;
        warnings.extend(take_warnings(info.messages)?);
        if info.return_status != 0 {
            return Err(self.fail(ProtocolError::ProcedureFailed {
                procedure: "sp_cursorfetch",
                status: info.return_status,
            }));
        }

        if let Session::Open {
            cursor,
            current_row,
            last_request,
        } = &mut self.session
        {
            *current_row = Some(info.row_number);
            cursor.row_count = info.row_count;
            if fetch_type != FetchType::Refresh {
                *last_request = Some(request);
            }
        }

        let status = FetchStatus::from_code(reply.return_status);
        tracing::trace!(
            handle,
            fetch_type = ?fetch_type,
            rows = reply.rows.len(),
            current_row = info.row_number,
            status = status.code(),
            "cursor fetch"
        );
        self.listeners.dispatch(&CursorEvent::Fetched {
            handle,
            fetch_type,
            rows: reply.rows.len(),
            current_row: info.row_number,
            status,
        });

        Ok(FetchResult {
            rows: reply.rows,
            current_row: info.row_number,
            status,
            warnings,
        })
    }

    /// Fetch using the configured page size.
    pub async fn fetch_page(&mut self, fetch_type: FetchType) -> Result<FetchResult<R::Row>> {
        let rows = self.config.fetch_size;
        self.fetch(fetch_type, 0, rows).await
    }

    /// Release the server handle (`sp_cursorclose`).
    ///
    /// Closing a cursor that holds no handle does nothing.
    pub async fn close(&mut self) -> Result<()> {
        let handle = match &self.session {
            Session::Open { cursor, .. } => cursor.handle,
            Session::Closed | Session::Poisoned => return Ok(()),
        };

        let result = self.rpc.cursor_close(handle).await;
        let reply = self.check(result)?;
        self.session = Session::Closed;
        tracing::debug!(handle, "cursor closed");
        self.listeners.dispatch(&CursorEvent::Closed { handle });

        take_warnings(reply.messages)?;
        if reply.return_status != 0 {
            return Err(self.fail(ProtocolError::ProcedureFailed {
                procedure: "sp_cursorclose",
                status: reply.return_status,
            }));
        }
        Ok(())
    }

    fn require(&self, expected: CursorState, operation: &'static str) -> Result<()> {
        let state = self.state();
        if state == expected {
            Ok(())
        } else {
            Err(Error::IllegalState { operation, state })
        }
    }

    /// Poison the session if `result` carries a fatal error.
    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|e| {
            if e.is_fatal() {
                self.poison(&e);
            }
            e
        })
    }

    fn fail(&mut self, error: ProtocolError) -> Error {
        let error = Error::Protocol(error);
        self.poison(&error);
        error
    }

    fn poison(&mut self, error: &Error) {
        tracing::warn!(error = %error, "cursor session poisoned");
        self.session = Session::Poisoned;
        self.listeners.dispatch(&CursorEvent::Poisoned {
            reason: error.to_string(),
        });
    }
}

impl<R: CursorRpc + fmt::Debug> fmt::Debug for Cursor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("rpc", &self.rpc)
            .field("session", &self.session)
            .field("listeners", &self.listeners)
            .finish()
    }
}

/// Split server messages into warnings, or fail with the errors.
fn take_warnings(messages: Vec<ErrorRecord>) -> Result<Vec<ErrorRecord>> {
    let (warnings, errors): (Vec<_>, Vec<_>) =
        messages.into_iter().partition(ErrorRecord::is_warning);
    for warning in &warnings {
        tracing::debug!(number = warning.number, message = %warning.message, "server message");
    }
    match ServerErrors::new(errors) {
        Some(errors) => Err(Error::Server(errors)),
        None => Ok(warnings),
    }
}
