//! Cursor configuration.

use tds_protocol::DEFAULT_PACKET_SIZE;

use crate::fetch::{ConcurrencyOptions, ScrollOptions};

/// Defaults applied by [`Cursor`](crate::Cursor) and the wire client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorConfig {
    /// Scroll options for [`Cursor::open_default`](crate::Cursor::open_default).
    pub scroll: ScrollOptions,
    /// Concurrency options for
    /// [`Cursor::open_default`](crate::Cursor::open_default).
    pub concurrency: ConcurrencyOptions,
    /// Page size for [`Cursor::fetch_page`](crate::Cursor::fetch_page).
    pub fetch_size: i32,
    /// Packet size used to frame RPC requests.
    pub packet_size: usize,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            scroll: ScrollOptions::KEYSET,
            concurrency: ConcurrencyOptions::READ_ONLY,
            fetch_size: 100,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

impl CursorConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default scroll options.
    #[must_use]
    pub fn scroll(mut self, scroll: ScrollOptions) -> Self {
        self.scroll = scroll;
        self
    }

    /// Set the default concurrency options.
    #[must_use]
    pub fn concurrency(mut self, concurrency: ConcurrencyOptions) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the default page size.
    #[must_use]
    pub fn fetch_size(mut self, rows: i32) -> Self {
        self.fetch_size = rows;
        self
    }

    /// Set the packet size.
    #[must_use]
    pub fn packet_size(mut self, size: usize) -> Self {
        self.packet_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = CursorConfig::new()
            .scroll(ScrollOptions::STATIC)
            .concurrency(ConcurrencyOptions::OPTIMISTIC)
            .fetch_size(2)
            .packet_size(512);
        assert_eq!(config.scroll, ScrollOptions::STATIC);
        assert_eq!(config.concurrency, ConcurrencyOptions::OPTIMISTIC);
        assert_eq!(config.fetch_size, 2);
        assert_eq!(config.packet_size, 512);
        assert_eq!(CursorConfig::default().packet_size, 4096);
    }
}
