//! Client configuration
//!
//! [`ClientConfigBuilder`] collects explicit settings; [`resolve`] fills in
//! the gaps from an ordered list of credential providers and then from
//! defaults, producing one immutable [`ClientConfig`].
//!
//! [`resolve`]: ClientConfigBuilder::resolve

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

use super::credentials::{default_providers, CredentialKey, CredentialProvider};
use super::router::{strip_leading_slash, VERSION_ENDPOINT};
use super::transport::{ClientIdentity, TlsVersion, TransportConfig, DEFAULT_CONNECT_TIMEOUT};

/// Default recorder host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default recorder port
pub const DEFAULT_PORT: u16 = 6083;

/// Default API version
pub const DEFAULT_API_VERSION: u32 = 1;

/// Path of the CA certificate bundled with the crate
pub fn bundled_ca_cert() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/certs/server.crt"))
}

/// Resolved client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// Recorder host name or address
    pub host: String,

    /// Recorder HTTPS port
    pub port: u16,

    /// Key sent as `X-Api-Key` on every request
    pub api_key: String,

    /// CA certificate the server is verified against
    pub ca_cert: PathBuf,

    /// Client certificate for mutual authentication
    pub client_identity: Option<ClientIdentity>,

    /// API version used in the `api/<version>/` prefix
    pub api_version: u32,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout (none by default)
    pub request_timeout: Option<Duration>,

    /// Pin the TLS version
    pub tls_version: Option<TlsVersion>,

    /// Tunnel through this proxy URL
    pub proxy: Option<String>,

    /// Also require the certificate to name `host` (off by default; the
    /// chain is always checked against `ca_cert`)
    pub verify_hostname: bool,
}

impl ClientConfig {
    /// Start building a configuration
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Path prefix put in front of every endpoint but `version`
    pub fn api_prefix(&self) -> String {
        format!("api/{}/", self.api_version)
    }

    /// Absolute URL for an endpoint
    pub fn url_for(&self, endpoint: &str) -> String {
        let endpoint = strip_leading_slash(endpoint);
        if endpoint == VERSION_ENDPOINT {
            format!("https://{}:{}/{}", self.host, self.port, endpoint)
        } else {
            format!(
                "https://{}:{}/{}{}",
                self.host,
                self.port,
                self.api_prefix(),
                endpoint
            )
        }
    }

    /// Settings for the transport layer
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            ca_cert: Some(self.ca_cert.clone()),
            client_identity: self.client_identity.clone(),
            tls_version: self.tls_version,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            proxy: self.proxy.clone(),
            verify_hostname: self.verify_hostname,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("ca_cert", &self.ca_cert)
            .field("client_identity", &self.client_identity)
            .field("api_version", &self.api_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("tls_version", &self.tls_version)
            .field("proxy", &self.proxy)
            .field("verify_hostname", &self.verify_hostname)
            .finish()
    }
}

/// Builder for [`ClientConfig`]
///
/// Values set here always win over providers and defaults.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    api_key: Option<String>,
    ca_cert: Option<PathBuf>,
    client_identity: Option<ClientIdentity>,
    api_version: Option<u32>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    tls_version: Option<TlsVersion>,
    proxy: Option<String>,
    verify_hostname: bool,
}

impl ClientConfigBuilder {
    /// Set the recorder host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the recorder port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a CA certificate other than the bundled one
    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Present a client certificate
    pub fn client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = Some(identity);
        self
    }

    /// Set the API version
    pub fn api_version(mut self, version: u32) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set whole-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Pin the TLS version
    pub fn tls_version(mut self, version: TlsVersion) -> Self {
        self.tls_version = Some(version);
        self
    }

    /// Tunnel through a proxy
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Require the server certificate to name the host being dialled
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    /// Resolve using the environment and the `recnode-apikey` helper
    pub fn build(self) -> Result<ClientConfig> {
        self.resolve(&default_providers())
    }

    /// Resolve missing values from `providers`, in order, then defaults.
    ///
    /// Fails if no API key is found anywhere or if the CA certificate
    /// does not exist on disk.
    pub fn resolve(self, providers: &[Box<dyn CredentialProvider>]) -> Result<ClientConfig> {
        let host = self
            .host
            .or_else(|| lookup(providers, CredentialKey::Host))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match self.port {
            Some(port) => port,
            None => match lookup(providers, CredentialKey::Port) {
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(value = %raw, default = DEFAULT_PORT, "Invalid port, using default");
                    DEFAULT_PORT
                }),
                None => DEFAULT_PORT,
            },
        };

        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .or_else(|| lookup(providers, CredentialKey::ApiKey))
            .ok_or(ConfigError::MissingApiKey)?;

        let ca_cert = self.ca_cert.unwrap_or_else(bundled_ca_cert);
        if !ca_cert.exists() {
            return Err(ConfigError::CertificateNotFound(ca_cert).into());
        }

        Ok(ClientConfig {
            host,
            port,
            api_key,
            ca_cert,
            client_identity: self.client_identity,
            api_version: self.api_version.unwrap_or(DEFAULT_API_VERSION),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: self.request_timeout,
            tls_version: self.tls_version,
            proxy: self.proxy,
            verify_hostname: self.verify_hostname,
        })
    }
}

fn lookup(providers: &[Box<dyn CredentialProvider>], key: CredentialKey) -> Option<String> {
    providers.iter().find_map(|provider| {
        let value = provider.lookup(key)?;
        tracing::debug!(provider = provider.name(), key = ?key, "Took setting from provider");
        Some(value)
    })
}
