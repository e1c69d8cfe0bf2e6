//! Control-plane client
//!
//! Provides the HTTPS side of the recorder API:
//! - Configuration resolution from explicit values, providers and defaults
//! - Ordered endpoint routing to HTTP methods
//! - Authenticated JSON request/response exchange
//! - Camera status interpretation and stream discovery

pub mod api;
pub mod config;
pub mod credentials;
pub mod router;
pub mod status;
pub mod transport;

pub use api::MotifClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use credentials::{CredentialKey, CredentialProvider, EnvProvider, HelperProvider};
pub use router::{EndpointRouter, HttpMethod, RouteMatch};
pub use status::{CameraStatus, StreamEndpoint, StreamKind};
pub use transport::{ApiRequest, ApiResponse, ClientIdentity, HttpsTransport, TlsVersion, Transport};
