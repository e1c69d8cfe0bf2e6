//! Camera status interpretation
//!
//! Pure, read-only views over the JSON returned by `camera/<serial>`.
//! Missing fields read as "not recording / not copying / not exporting".

use serde_json::Value;

use crate::error::{Result, StreamError};

/// The wildcard address a recorder advertises when bound to all interfaces
pub const ANY_ADDRESS: &str = "0.0.0.0";

/// Kind of realtime stream a camera can publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Raw image frames
    Image = 1,
    /// JSON state updates
    State = 2,
}

impl StreamKind {
    /// Key of this stream in the status `stream` object
    pub fn key(&self) -> &'static str {
        match self {
            StreamKind::Image => "image",
            StreamKind::State => "state",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Where to connect for a realtime stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    /// Host to connect to, after substitution
    pub host: String,
    /// Port advertised by the recorder
    pub port: u16,
}

impl StreamEndpoint {
    /// ZeroMQ TCP address (`tcp://host:port`)
    pub fn address(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Choose the host to use for a stream.
///
/// An explicit override always wins. Otherwise a wildcard advertisement is
/// replaced by the host the client is configured with, unless that is the
/// wildcard too.
pub fn resolve_stream_host(advertised: &str, configured: &str, force_host: Option<&str>) -> String {
    if let Some(host) = force_host {
        return host.to_string();
    }
    if advertised == ANY_ADDRESS && configured != ANY_ADDRESS {
        return configured.to_string();
    }
    advertised.to_string()
}

/// Status of a single camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraStatus {
    raw: Value,
}

impl CameraStatus {
    /// Wrap a `camera/<serial>` response
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// The underlying response
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Consume and return the underlying response
    pub fn into_raw(self) -> Value {
        self.raw
    }

    fn camera_info(&self, field: &str) -> Option<&Value> {
        self.raw.get("camera_info").and_then(|info| info.get(field))
    }

    fn playback_status(&self) -> Option<&str> {
        self.raw
            .get("playback_info")
            .and_then(|info| info.get("status"))
            .and_then(Value::as_str)
    }

    /// Camera status string (`camera_info.status`)
    pub fn status(&self) -> Option<&str> {
        self.camera_info("status").and_then(Value::as_str)
    }

    /// File currently being recorded to, if any
    pub fn filename(&self) -> Option<&str> {
        self.camera_info("filename")
            .and_then(Value::as_str)
            .filter(|f| !f.is_empty())
    }

    /// Recording, or about to start recording
    pub fn is_recording(&self) -> bool {
        self.filename().is_some() || self.status() == Some("pending")
    }

    /// Recordings are being copied off the camera
    pub fn is_copying(&self) -> bool {
        self.playback_status() == Some("copying")
    }

    /// An export is in progress
    pub fn is_exporting(&self) -> bool {
        self.playback_status()
            .map(|s| s.starts_with("export") && !s.contains("finished"))
            .unwrap_or(false)
    }

    /// Advertised host and port of a stream, before host substitution.
    ///
    /// Fails with [`StreamError::NotEnabled`] if the camera does not publish
    /// this kind of stream.
    pub fn advertised_stream(&self, kind: StreamKind) -> Result<(String, u16)> {
        let info = self
            .camera_info("stream")
            .and_then(|s| s.get(kind.key()))
            .ok_or(StreamError::NotEnabled)?;

        let host = info
            .get("host")
            .and_then(Value::as_str)
            .ok_or(StreamError::NotEnabled)?
            .to_string();

        // port may be advertised as a number or a string
        let port = match info.get("port") {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .ok_or(StreamError::NotEnabled)?;

        Ok((host, port))
    }

    /// Where to connect for a stream, with host substitution applied
    pub fn stream_endpoint(
        &self,
        kind: StreamKind,
        configured_host: &str,
        force_host: Option<&str>,
    ) -> Result<StreamEndpoint> {
        let (advertised, port) = self.advertised_stream(kind)?;
        Ok(StreamEndpoint {
            host: resolve_stream_host(&advertised, configured_host, force_host),
            port,
        })
    }
}
