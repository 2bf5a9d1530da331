//! TLS-related error types.

use thiserror::Error;

/// Errors that can occur while negotiating TLS.
#[derive(Debug, Error)]
pub enum TlsError {
    /// The TLS handshake did not complete.
    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(#[source] std::io::Error),

    /// The server name is not a valid DNS name or IP address.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// A configured root certificate was rejected.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Minimum and maximum protocol versions leave nothing to negotiate.
    #[error("no TLS protocol version between {min:?} and {max:?}")]
    NoProtocolVersion {
        /// Configured minimum.
        min: crate::config::TlsVersion,
        /// Configured maximum.
        max: crate::config::TlsVersion,
    },

    /// Rustls rejected the configuration.
    #[error("rustls error: {0}")]
    Rustls(#[from] rustls::Error),

    /// IO error during TLS operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
