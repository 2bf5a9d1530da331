//! Server-side cursor positioning.
//!
//! [`resolve`] computes which rows a fetch returns and where the cursor ends
//! up, reproducing the positional behavior SQL Server shows for keyset and
//! static cursors. Row numbers are 1-based; position 0 is "before the first
//! row" and `row_count + 1` is "after the last row".

use crate::fetch::{FetchRequest, FetchType};

/// Status reported by `sp_cursorfetch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    /// The window was fetched as requested (code 0). Also reported for an
    /// empty window past the end.
    Success,
    /// The window start fell before row 1 and was moved to row 1 (code 2).
    Boundary,
    /// Any other status the server reported.
    Other(i32),
}

impl FetchStatus {
    /// Map a procedure return status.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            2 => Self::Boundary,
            other => Self::Other(other),
        }
    }

    /// Procedure return status.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Boundary => 2,
            Self::Other(code) => code,
        }
    }
}

/// Cursor position after a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Start of the last non-refresh window; 0 before the first fetch.
    pub start: i32,
    /// Rows that window returned.
    pub len: i32,
    /// Page size that window requested.
    pub requested: i32,
}

/// Rows selected by one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First row returned. Meaningless when `len` is 0.
    pub first: i32,
    /// Number of rows returned.
    pub len: i32,
    /// Status to report.
    pub status: FetchStatus,
    /// Position after the fetch.
    pub position: Position,
}

impl Window {
    /// 0-based index range into the result rows.
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        if self.len <= 0 {
            return 0..0;
        }
        let start = (self.first - 1) as usize;
        start..start + self.len as usize
    }

    fn empty(position: Position) -> Self {
        Self {
            first: position.start,
            len: 0,
            status: FetchStatus::Success,
            position,
        }
    }
}

/// Resolve a fetch against a result of `row_count` rows.
///
/// `request.number_of_rows` must be positive except for Refresh, which
/// reuses the page size of the window it re-reads.
#[must_use]
pub fn resolve(request: FetchRequest, row_count: i32, position: Position) -> Window {
    let row_count = i64::from(row_count.max(0));
    let rows = i64::from(request.number_of_rows);
    let k = i64::from(request.row_number);
    let p = i64::from(position.start);

    let (target, may_clamp) = match request.fetch_type {
        FetchType::Refresh => return refresh(row_count, position),
        FetchType::First => (1, false),
        FetchType::Last => ((row_count - rows + 1).max(1), false),
        FetchType::Next if p == 0 => (1, false),
        FetchType::Next => (p + i64::from(position.len), false),
        FetchType::Previous => (p - rows, true),
        FetchType::Absolute if k >= 1 => (k, false),
        FetchType::Absolute if k < 0 => (row_count + 1 + k, true),
        FetchType::Absolute => {
            return Window::empty(Position {
                start: 0,
                len: 0,
                requested: request.number_of_rows,
            });
        }
        FetchType::Relative => (p + k, true),
    };

    let (start, status) = if target < 1 {
        let status = if may_clamp {
            FetchStatus::Boundary
        } else {
            FetchStatus::Success
        };
        (1, status)
    } else {
        (target, FetchStatus::Success)
    };

    if start > row_count {
        return Window::empty(Position {
            start: clamp_i32(row_count + 1),
            len: 0,
            requested: request.number_of_rows,
        });
    }

    let len = rows.min(row_count - start + 1);
    let position = Position {
        start: clamp_i32(start),
        len: clamp_i32(len),
        requested: request.number_of_rows,
    };
    Window {
        first: position.start,
        len: position.len,
        status,
        position,
    }
}

/// Re-read the window at `position` without moving.
fn refresh(row_count: i64, position: Position) -> Window {
    let start = i64::from(position.start);
    if start < 1 || start > row_count {
        return Window::empty(position);
    }
    let len = i64::from(position.requested).min(row_count - start + 1).max(0);
    Window {
        first: position.start,
        len: clamp_i32(len),
        status: FetchStatus::Success,
        position,
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
