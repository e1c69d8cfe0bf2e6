//! State stream reader
//!
//! State updates arrive as `[topic][JSON object]` on a subscribe socket
//! filtered to a single channel.

use std::future::Future;

use bytes::Bytes;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use zeromq::{Socket, SocketRecv, SubSocket};

use crate::client::StreamEndpoint;
use crate::error::{Error, Result, StreamError};

/// Channel the recorder publishes state updates on
pub const DEFAULT_CHANNEL: &str = "j";

/// A source of state update messages
pub trait StateSource: Send + 'static {
    /// Wait for the next update
    fn next_state(&mut self) -> impl Future<Output = Result<Map<String, Value>>> + Send;
}

/// Subscribes to a camera's state updates
pub struct StateStreamer {
    socket: SubSocket,
    channel: String,
}

impl StateStreamer {
    /// Subscribe on the default channel
    pub async fn open(endpoint: &StreamEndpoint) -> Result<Self> {
        Self::with_channel(endpoint, DEFAULT_CHANNEL).await
    }

    /// Subscribe on a specific channel
    pub async fn with_channel(endpoint: &StreamEndpoint, channel: &str) -> Result<Self> {
        let address = endpoint.address();
        let mut socket = SubSocket::new();
        socket.connect(&address).await?;
        socket.subscribe(channel).await?;

        tracing::info!(address = %address, channel = %channel, "State stream opened");

        Ok(Self {
            socket,
            channel: channel.to_string(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next state update
    pub async fn next_state(&mut self) -> Result<Map<String, Value>> {
        let message = self.socket.recv().await?;
        decode_state(message.into_vec())
    }

    /// Take an update if one is already waiting, without blocking
    pub async fn try_next_state(&mut self) -> Result<Option<Map<String, Value>>> {
        match self.socket.recv().now_or_never() {
            Some(message) => decode_state(message?.into_vec()).map(Some),
            None => Ok(None),
        }
    }
}

impl StateSource for StateStreamer {
    async fn next_state(&mut self) -> Result<Map<String, Value>> {
        StateStreamer::next_state(self).await
    }
}

impl std::fmt::Debug for StateStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStreamer")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Decode a `[topic][payload]` message into a state object
pub fn decode_state(parts: Vec<Bytes>) -> Result<Map<String, Value>> {
    let payload = parts.get(1).ok_or_else(|| bad_state("missing payload part"))?;
    let text = std::str::from_utf8(payload).map_err(|e| bad_state(format!("not UTF-8: {}", e)))?;

    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(bad_state(format!("expected a JSON object, got {}", other))),
        Err(e) => Err(bad_state(format!("invalid JSON: {}", e))),
    }
}

fn bad_state(msg: impl Into<String>) -> Error {
    StreamError::CorruptFrame(format!("state message {}", msg.into())).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_state() {
        let state = decode_state(vec![
            Bytes::from_static(b"j"),
            Bytes::from_static(br#"{"frame_number": 7, "is_recording": true}"#),
        ])
        .unwrap();

        assert_eq!(state.get("frame_number"), Some(&Value::from(7)));
        assert_eq!(state.get("is_recording"), Some(&Value::from(true)));
    }

    #[test]
    fn test_decode_state_single_part() {
        let err = decode_state(vec![Bytes::from_static(b"j")]).unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::CorruptFrame(_))));
    }

    #[test]
    fn test_decode_state_not_object() {
        let err = decode_state(vec![Bytes::from_static(b"j"), Bytes::from_static(b"[1]")]).unwrap_err();
        assert!(matches!(err, Error::Stream(StreamError::CorruptFrame(_))));

        let err = decode_state(vec![Bytes::from_static(b"j"), Bytes::from_static(&[0xff, 0xfe])]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }
}
