//! HTTPS transport
//!
//! Opens a TCP connection (optionally through a proxy tunnel), upgrades it to
//! TLS with optional client certificate and CA pinning, and performs one
//! request/response exchange. Any failure below HTTP (refused connection,
//! DNS, TLS handshake or verification, timeout) is reported as
//! [`Error::Unreachable`], never as a parse error.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;

use crate::error::{ConfigError, Error, Result};

use super::router::HttpMethod;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS protocol version to pin the session to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Tls12,
    Tls13,
}

impl TlsVersion {
    fn to_reqwest(self) -> reqwest::tls::Version {
        match self {
            TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls13 => reqwest::tls::Version::TLS_1_3,
        }
    }
}

/// Client certificate presented during the TLS handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// PEM certificate (chain) file
    pub cert: PathBuf,
    /// PEM private key file
    pub key: PathBuf,
}

impl ClientIdentity {
    /// Create a new identity from certificate and key paths
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }
}

/// Transport configuration options
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// CA certificate to verify the server against; `None` disables
    /// verification (loopback use only)
    pub ca_cert: Option<PathBuf>,

    /// Client certificate for mutual authentication
    pub client_identity: Option<ClientIdentity>,

    /// Pin the TLS version
    pub tls_version: Option<TlsVersion>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout (none by default)
    pub request_timeout: Option<Duration>,

    /// Tunnel through this proxy URL
    pub proxy: Option<String>,

    /// Also require the certificate to name the host being dialled
    pub verify_hostname: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ca_cert: None,
            client_identity: None,
            tls_version: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            proxy: None,
            verify_hostname: false,
        }
    }
}

impl TransportConfig {
    /// Create a config that verifies the server against a CA certificate
    pub fn with_ca_cert(path: impl Into<PathBuf>) -> Self {
        Self {
            ca_cert: Some(path.into()),
            ..Default::default()
        }
    }

    /// Set the client identity
    pub fn client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = Some(identity);
        self
    }

    /// Pin the TLS version
    pub fn tls_version(mut self, version: TlsVersion) -> Self {
        self.tls_version = Some(version);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set whole-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Tunnel through a proxy
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Require the certificate to name the host being dialled
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }
}

/// A fully built control-plane request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// Header name/value pairs
    pub headers: Vec<(String, String)>,
    /// JSON body, if any
    pub body: Option<Bytes>,
}

impl ApiRequest {
    /// Look up a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A raw response: status code and the full body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

impl ApiResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request/response exchange
///
/// Implementations must map connection-level failures to
/// [`Error::Unreachable`]. HTTP error statuses are not failures at this
/// layer; they are returned as responses and classified by the caller.
pub trait Transport: Send + Sync {
    /// Send the request and read the full response body
    fn execute(&self, request: ApiRequest) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// HTTPS transport backed by `reqwest` (rustls)
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    http: reqwest::Client,
}

impl HttpsTransport {
    /// Build the HTTPS client. Certificate files are read here, once.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.connect_timeout);

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        match &config.ca_cert {
            Some(path) => {
                let pem = read_file(path)?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    ConfigError::InvalidCertificate(format!("{}: {}", path.display(), e))
                })?;
                builder = builder
                    .tls_built_in_root_certs(false)
                    .add_root_certificate(cert);
                // chain is checked against the pinned CA; the name only on request
                if !config.verify_hostname {
                    builder = builder.danger_accept_invalid_hostnames(true);
                }
            }
            None => {
                tracing::warn!("Server certificate verification disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(identity) = &config.client_identity {
            let mut pem = read_file(&identity.cert)?;
            pem.push(b'\n');
            pem.extend_from_slice(&read_file(&identity.key)?);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| ConfigError::InvalidCertificate(e.to_string()))?;
            builder = builder.identity(identity);
        }

        if let Some(version) = config.tls_version {
            builder = builder
                .min_tls_version(version.to_reqwest())
                .max_tls_version(version.to_reqwest());
        }

        // system proxy variables are ignored; only an explicit proxy tunnels
        builder = match &config.proxy {
            Some(url) => {
                let proxy = reqwest::Proxy::all(url)
                    .map_err(|e| ConfigError::Transport(format!("proxy {}: {}", url, e)))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let http = builder
            .build()
            .map_err(|e| ConfigError::Transport(e.to_string()))?;

        Ok(Self { http })
    }
}

impl Transport for HttpsTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Unreachable(describe(&e)))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Unreachable(describe(&e)))?;

        Ok(ApiResponse { status, body })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::CertificateNotFound(path.to_path_buf()).into()
        } else {
            ConfigError::InvalidCertificate(format!("{}: {}", path.display(), e)).into()
        }
    })
}

/// Flatten an error and its sources into one line
fn describe(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        msg.push_str(": ");
        msg.push_str(&inner.to_string());
        source = inner.source();
    }
    msg
}
