//! TLS connector for TDS 7.x (PreLogin-framed) and TDS 8.0 strict sessions.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector as TokioTlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::TlsConfig;
use crate::error::TlsError;
use crate::stream::HandshakeStream;

/// Certificate verifier used when `trust_server_certificate` is set.
///
/// The chain is not validated, but handshake signatures are still checked
/// against the presented certificate.
#[derive(Debug)]
struct AcceptAnyServerCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// TLS connector for TDS sessions.
///
/// ```rust,ignore
/// use tds_tls::{TlsConfig, TlsConnector};
///
/// let connector = TlsConnector::new(TlsConfig::new())?;
/// // after the cleartext PreLogin exchange:
/// let tls = connector.connect_tds7(tcp, "db.example.com").await?;
/// ```
pub struct TlsConnector {
    config: TlsConfig,
    inner: TokioTlsConnector,
    /// TLS 1.2 connector for PreLogin-framed handshakes; `None` when the
    /// configured range excludes TLS 1.2.
    prelogin: Option<TokioTlsConnector>,
}

impl TlsConnector {
    /// Create a new TLS connector with the given configuration.
    pub fn new(config: TlsConfig) -> Result<Self, TlsError> {
        let versions = config.protocol_versions();
        if versions.is_empty() {
            return Err(TlsError::NoProtocolVersion {
                min: config.min_protocol_version,
                max: config.max_protocol_version,
            });
        }
        let inner = TokioTlsConnector::from(Arc::new(build_client_config(&config, &versions)?));

        let prelogin_versions = config.prelogin_protocol_versions();
        let prelogin = if prelogin_versions.is_empty() {
            None
        } else {
            let client_config = build_client_config(&config, &prelogin_versions)?;
            Some(TokioTlsConnector::from(Arc::new(client_config)))
        };

        Ok(Self {
            config,
            inner,
            prelogin,
        })
    }

    /// Run the TDS 7.x handshake, with TLS records carried in PreLogin
    /// packets.
    ///
    /// Negotiates TLS 1.2 only; a configuration that requires TLS 1.3 fails
    /// with [`TlsError::NoProtocolVersion`].
    ///
    /// On success the [`HandshakeStream`] has been switched to pass-through,
    /// so the returned stream carries TDS packets inside TLS.
    pub async fn connect_tds7<S>(
        &self,
        stream: S,
        server_name: &str,
    ) -> Result<TlsStream<HandshakeStream<S>>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let connector = self.prelogin.as_ref().ok_or(TlsError::NoProtocolVersion {
            min: self.config.min_protocol_version,
            max: self.config.max_protocol_version,
        })?;
        let mut tls = self
            .handshake(connector, HandshakeStream::new(stream), server_name)
            .await?;
        tls.get_mut().0.handshake_complete();
        Ok(tls)
    }

    /// Run the TDS 8.0 strict-mode handshake directly on the transport.
    pub async fn connect_strict<S>(
        &self,
        stream: S,
        server_name: &str,
    ) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.handshake(&self.inner, stream, server_name).await
    }

    async fn handshake<S>(
        &self,
        connector: &TokioTlsConnector,
        stream: S,
        server_name: &str,
    ) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = self.config.server_name.as_deref().unwrap_or(server_name);
        let dns_name = ServerName::try_from(server_name.to_owned())
            .map_err(|_| TlsError::InvalidServerName(server_name.to_owned()))?;

        tracing::debug!(
            server_name = %server_name,
            strict = self.config.strict_mode,
            "performing TLS handshake"
        );

        let tls = connector
            .connect(dns_name, stream)
            .await
            .map_err(TlsError::HandshakeFailed)?;

        tracing::debug!("TLS handshake complete");
        Ok(tls)
    }

    /// Check if this connector is configured for TDS 8.0 strict mode.
    #[must_use]
    pub fn is_strict_mode(&self) -> bool {
        self.config.strict_mode
    }

    /// Get the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn build_client_config(
    config: &TlsConfig,
    versions: &[&'static rustls::SupportedProtocolVersion],
) -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let algorithms = provider.signature_verification_algorithms;
    let builder = ClientConfig::builder_with_provider(provider).with_protocol_versions(versions)?;

    if config.trust_server_certificate {
        tracing::warn!(
            "trust_server_certificate is enabled; server certificates are not validated"
        );
        return Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { algorithms }))
            .with_no_client_auth());
    }

    Ok(builder
        .with_root_certificates(root_store(config)?)
        .with_no_client_auth())
}

fn root_store(config: &TlsConfig) -> Result<RootCertStore, TlsError> {
    if config.root_certificates.is_empty() {
        return Ok(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        });
    }

    let mut store = RootCertStore::empty();
    for cert in &config.root_certificates {
        store
            .add(cert.clone())
            .map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
    }
    Ok(store)
}
