//! Server messages (errors and informational messages).

use core::fmt;

use crate::prelude::*;
use crate::sqlstate::{
    DEFAULT_ERROR_STATE, DEFAULT_WARNING_STATE, SQL_SERVER_STATES, SYBASE_STATES, lookup,
};

/// Server family, which selects the SQLSTATE table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerKind {
    /// Microsoft SQL Server.
    #[default]
    SqlServer,
    /// Sybase Adaptive Server.
    Sybase,
}

/// A single error or informational message sent by the server.
///
/// Several records may arrive for one request; callers keep them in arrival
/// order rather than chaining them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Error number.
    pub number: i32,
    /// Error class/severity (0-25). 10 and below are informational.
    pub class: u8,
    /// Error state.
    pub state: u8,
    /// Error message.
    pub message: String,
    /// Server name where error occurred.
    pub server: Option<String>,
    /// Stored procedure name (if applicable).
    pub procedure: Option<String>,
    /// Line number in the SQL batch or procedure.
    pub line: u32,
    /// Which server family produced the record.
    pub server_kind: ServerKind,
}

impl ErrorRecord {
    /// Create a record with the given number, severity and message.
    pub fn new(number: i32, class: u8, message: impl Into<String>) -> Self {
        Self {
            number,
            class,
            state: 1,
            message: message.into(),
            server: None,
            procedure: None,
            line: 0,
            server_kind: ServerKind::SqlServer,
        }
    }

    /// Set the server family.
    #[must_use]
    pub fn with_server_kind(mut self, kind: ServerKind) -> Self {
        self.server_kind = kind;
        self
    }

    /// Set the procedure the message originated from.
    #[must_use]
    pub fn with_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.procedure = Some(procedure.into());
        self
    }

    /// Check if this record is a warning rather than an error.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.class <= 10
    }

    /// ANSI SQLSTATE for this record.
    #[must_use]
    pub fn sql_state(&self) -> &'static str {
        let table = match self.server_kind {
            ServerKind::SqlServer => SQL_SERVER_STATES,
            ServerKind::Sybase => SYBASE_STATES,
        };
        lookup(table, self.number).unwrap_or(if self.is_warning() {
            DEFAULT_WARNING_STATE
        } else {
            DEFAULT_ERROR_STATE
        })
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Msg {}, Severity {}, State {}, SQL State {}, {}",
            self.number,
            self.class,
            self.state,
            self.sql_state(),
            self.message
        )?;
        if let Some(procedure) = &self.procedure {
            write!(f, ", Procedure {procedure}")?;
        }
        if self.line > 0 {
            write!(f, ", Line {}", self.line)?;
        }
        Ok(())
    }
}
