//! Fetch requests and cursor option codes.

use bitflags::bitflags;

/// `sp_cursorfetch` fetch type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FetchType {
    /// Window starting at row 1.
    First = 0x01,
    /// Window following the current one.
    Next = 0x02,
    /// Window preceding the current one.
    Previous = 0x04,
    /// Window ending at the last row.
    Last = 0x08,
    /// Window starting at an absolute row number.
    Absolute = 0x10,
    /// Window starting at an offset from the current window start.
    Relative = 0x20,
    /// Re-read the current window.
    Refresh = 0x80,
}

impl FetchType {
    /// Wire code of this fetch type.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Map a wire code back to a fetch type.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0x01 => Some(Self::First),
            0x02 => Some(Self::Next),
            0x04 => Some(Self::Previous),
            0x08 => Some(Self::Last),
            0x10 => Some(Self::Absolute),
            0x20 => Some(Self::Relative),
            0x80 => Some(Self::Refresh),
            _ => None,
        }
    }

    /// Check whether the `row_number` argument is significant.
    #[must_use]
    pub const fn uses_row_number(self) -> bool {
        matches!(self, Self::Absolute | Self::Relative)
    }
}

/// One `sp_cursorfetch` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    /// Fetch type.
    pub fetch_type: FetchType,
    /// Row number for Absolute, signed offset for Relative, ignored
    /// otherwise.
    pub row_number: i32,
    /// Page size.
    pub number_of_rows: i32,
}

impl FetchRequest {
    /// Build a request.
    #[must_use]
    pub const fn new(fetch_type: FetchType, row_number: i32, number_of_rows: i32) -> Self {
        Self {
            fetch_type,
            row_number,
            number_of_rows,
        }
    }
}

bitflags! {
    /// `sp_cursoropen` scroll options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScrollOptions: i32 {
        /// Keyset-driven cursor.
        const KEYSET = 0x0001;
        /// Dynamic cursor.
        const DYNAMIC = 0x0002;
        /// Forward-only cursor.
        const FORWARD_ONLY = 0x0004;
        /// Static (insensitive) cursor.
        const STATIC = 0x0008;
        /// Fast forward-only, read-only cursor.
        const FAST_FORWARD = 0x0010;
        /// Statement text carries parameter declarations.
        const PARAMETERIZED = 0x1000;
        /// Fetch the first window as part of the open.
        const AUTO_FETCH = 0x2000;
    }
}

bitflags! {
    /// `sp_cursoropen` concurrency options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConcurrencyOptions: i32 {
        /// No updates through the cursor.
        const READ_ONLY = 0x01;
        /// Rows are locked as they are read.
        const SCROLL_LOCKS = 0x02;
        /// Optimistic concurrency using timestamps or checksums.
        const OPTIMISTIC = 0x04;
        /// Optimistic concurrency comparing values.
        const OPTIMISTIC_VALUES = 0x08;
    }
}
