//! TLS configuration options.

use rustls::pki_types::CertificateDer;

/// TLS configuration for TDS connections.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    /// Accept any server certificate.
    ///
    /// **Warning:** This is insecure and should only be used for testing.
    pub trust_server_certificate: bool,

    /// Root certificates to trust. When empty, the Mozilla roots from
    /// `webpki-roots` are used.
    pub root_certificates: Vec<CertificateDer<'static>>,

    /// Name presented for SNI and certificate validation, overriding the
    /// host the caller connects to.
    pub server_name: Option<String>,

    /// Minimum TLS version to accept.
    pub min_protocol_version: TlsVersion,

    /// Maximum TLS version to accept.
    pub max_protocol_version: TlsVersion,

    /// TDS 8.0 strict mode: TLS directly on the transport, no PreLogin
    /// framing.
    pub strict_mode: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            trust_server_certificate: false,
            root_certificates: Vec::new(),
            server_name: None,
            min_protocol_version: TlsVersion::Tls12,
            max_protocol_version: TlsVersion::Tls13,
            strict_mode: false,
        }
    }
}

impl TlsConfig {
    /// Create a new TLS configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust the server certificate without validation.
    #[must_use]
    pub fn trust_server_certificate(mut self, trust: bool) -> Self {
        self.trust_server_certificate = trust;
        self
    }

    /// Add a custom root certificate to trust.
    #[must_use]
    pub fn add_root_certificate(mut self, cert: CertificateDer<'static>) -> Self {
        self.root_certificates.push(cert);
        self
    }

    /// Set the server name for certificate validation.
    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the minimum TLS version.
    #[must_use]
    pub fn min_protocol_version(mut self, version: TlsVersion) -> Self {
        self.min_protocol_version = version;
        self
    }

    /// Set the maximum TLS version.
    #[must_use]
    pub fn max_protocol_version(mut self, version: TlsVersion) -> Self {
        self.max_protocol_version = version;
        self
    }

    /// Enable TDS 8.0 strict mode.
    #[must_use]
    pub fn strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = enabled;
        self
    }

    /// Protocol versions allowed by the min/max bounds, newest last.
    #[must_use]
    pub fn protocol_versions(&self) -> Vec<&'static rustls::SupportedProtocolVersion> {
        [TlsVersion::Tls12, TlsVersion::Tls13]
            .into_iter()
            .filter(|v| (self.min_protocol_version..=self.max_protocol_version).contains(v))
            .map(TlsVersion::to_rustls)
            .collect()
    }

    /// Versions usable for a PreLogin-framed (TDS 7.x) handshake.
    ///
    /// Capped at TLS 1.2: the PreLogin batching only understands the
    /// TLS 1.2 client flight.
    #[must_use]
    pub fn prelogin_protocol_versions(&self) -> Vec<&'static rustls::SupportedProtocolVersion> {
        let max = self.max_protocol_version.min(TlsVersion::Tls12);
        if self.min_protocol_version > max {
            return Vec::new();
        }
        vec![TlsVersion::Tls12.to_rustls()]
    }
}

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TlsVersion {
    /// TLS 1.2
    #[default]
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Convert to rustls protocol version.
    #[must_use]
    pub fn to_rustls(self) -> &'static rustls::SupportedProtocolVersion {
        match self {
            Self::Tls12 => &rustls::version::TLS12,
            Self::Tls13 => &rustls::version::TLS13,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_versions() {
        assert_eq!(TlsConfig::new().protocol_versions().len(), 2);

        let only_13 = TlsConfig::new().min_protocol_version(TlsVersion::Tls13);
        let versions = only_13.protocol_versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_3);

        let inverted = TlsConfig::new()
            .min_protocol_version(TlsVersion::Tls13)
            .max_protocol_version(TlsVersion::Tls12);
        assert!(inverted.protocol_versions().is_empty());
    }

    #[test]
    fn test_prelogin_versions_capped_at_tls12() {
        let versions = TlsConfig::new().prelogin_protocol_versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, rustls::ProtocolVersion::TLSv1_2);

        let only_13 = TlsConfig::new().min_protocol_version(TlsVersion::Tls13);
        assert!(only_13.prelogin_protocol_versions().is_empty());
    }
}
