//! Error types
//!
//! Every failure is surfaced to the immediate caller; nothing is retried
//! internally. The variants separate the layers a request can fail in:
//!
//! ```text
//! construction ──► Config
//! routing      ──► UnknownEndpoint
//! encoding     ──► Serialization
//! network      ──► Unreachable
//! HTTP         ──► Api { message, code } | Protocol(UnknownApiError)
//! body         ──► Protocol(InvalidResponse)
//! streaming    ──► Stream(..)
//! ```

use std::path::PathBuf;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Client could not be configured
    Config(ConfigError),

    /// Endpoint string matched no known route (string kept verbatim)
    UnknownEndpoint(String),

    /// Call arguments could not be encoded as a JSON object
    Serialization(String),

    /// Recorder not running or reachable (refused, TLS failure, timeout, DNS)
    Unreachable(String),

    /// Recorder rejected the call with a structured error body
    Api { message: String, code: i64 },

    /// Response could not be interpreted
    Protocol(ProtocolError),

    /// Stream discovery or decoding failed
    Stream(StreamError),
}

impl Error {
    /// True when the recorder could not be reached at all.
    ///
    /// Callers polling for a recorder that is still starting up should
    /// retry on this condition rather than treat it as fatal.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Unreachable(_))
    }

    /// Application status code, if the recorder returned one
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Error::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "configuration error: {}", e),
            Error::UnknownEndpoint(endpoint) => write!(
                f,
                "unknown endpoint '{}' (are you missing/adding '/')",
                endpoint
            ),
            Error::Serialization(msg) => {
                write!(f, "arguments must be JSON serializable: {}", msg)
            }
            Error::Unreachable(msg) => write!(f, "motif not running or reachable: {}", msg),
            Error::Api { message, code } => write!(f, "{} (status {})", message, code),
            Error::Protocol(e) => write!(f, "{}", e),
            Error::Stream(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<StreamError> for Error {
    fn from(e: StreamError) -> Self {
        Error::Stream(e)
    }
}

impl From<zeromq::ZmqError> for Error {
    fn from(e: zeromq::ZmqError) -> Self {
        Error::Stream(StreamError::Socket(e.to_string()))
    }
}

/// Configuration errors raised while constructing a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No API key from arguments, providers, or helper
    MissingApiKey,
    /// CA certificate file does not exist
    CertificateNotFound(PathBuf),
    /// Certificate or key file could not be read or parsed
    InvalidCertificate(String),
    /// A route pattern failed to compile
    InvalidRoute(String),
    /// HTTPS client could not be built
    Transport(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingApiKey => write!(f, "API key must be specified"),
            ConfigError::CertificateNotFound(path) => {
                write!(f, "could not find certificate: {}", path.display())
            }
            ConfigError::InvalidCertificate(msg) => write!(f, "invalid certificate: {}", msg),
            ConfigError::InvalidRoute(msg) => write!(f, "invalid route pattern: {}", msg),
            ConfigError::Transport(msg) => write!(f, "could not build HTTPS client: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors interpreting a recorder response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Non-2xx response without a structured error body
    UnknownApiError { status: u16 },
    /// 2xx response whose body is not valid JSON
    InvalidResponse(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnknownApiError { status } => {
                write!(f, "unknown API error (HTTP {})", status)
            }
            ProtocolError::InvalidResponse(msg) => write!(f, "Invalid JSON response: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Stream discovery and decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Camera status carries no stream info for the requested kind
    NotEnabled,
    /// Camera with this serial not found or not running
    CameraNotFound(String),
    /// Recorder has no cameras connected
    NoCameras,
    /// Frame metadata or payload is malformed
    CorruptFrame(String),
    /// Socket-level failure on the pub/sub connection
    Socket(String),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::NotEnabled => write!(f, "realtime stream not enabled on camera"),
            StreamError::CameraNotFound(serial) => {
                write!(f, "camera with serial {} not found or running", serial)
            }
            StreamError::NoCameras => write!(f, "no cameras connected or running"),
            StreamError::CorruptFrame(msg) => write!(f, "corrupt frame: {}", msg),
            StreamError::Socket(msg) => write!(f, "stream socket error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}
