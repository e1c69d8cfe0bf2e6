//! Request/response engine
//!
//! [`MotifClient`] turns an endpoint string plus optional arguments into one
//! authenticated round trip:
//!
//! ```text
//! endpoint ──► EndpointRouter ──► method
//!          ──► ApiRequest { url, X-Api-Key, JSON body }
//!          ──► Transport::execute
//!          ──► classify ──► Value | Error
//! ```

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, ProtocolError, Result, StreamError};
use crate::stream::{ImageStreamer, SocketMode, StateStreamer};

use super::config::ClientConfig;
use super::router::EndpointRouter;
use super::status::{CameraStatus, StreamEndpoint, StreamKind};
use super::transport::{ApiRequest, ApiResponse, HttpsTransport, Transport};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Client for the recorder control API
///
/// # Example
/// ```no_run
/// use motif_rs::client::{ClientConfig, MotifClient};
///
/// # async fn example() -> motif_rs::error::Result<()> {
/// let config = ClientConfig::builder().host("10.0.0.5").build()?;
/// let client = MotifClient::new(config)?;
///
/// let version = client.call("version").await?;
/// println!("recorder version: {}", version);
///
/// client.call("camera/ABC123/recording/start").await?;
/// # Ok(())
/// # }
/// ```
pub struct MotifClient<T: Transport = HttpsTransport> {
    config: ClientConfig,
    router: EndpointRouter,
    transport: T,
}

impl MotifClient<HttpsTransport> {
    /// Create a client talking HTTPS to the configured recorder
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpsTransport::new(&config.transport_config())?;
        Self::with_transport(config, transport)
    }

    /// Resolve configuration from the environment and connect
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::builder().build()?)
    }
}

impl<T: Transport> MotifClient<T> {
    /// Create a client over a custom transport
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self> {
        Ok(Self {
            config,
            router: EndpointRouter::motif()?,
            transport,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the endpoint router
    pub fn router(&self) -> &EndpointRouter {
        &self.router
    }

    /// Call an endpoint without arguments
    pub async fn call(&self, endpoint: &str) -> Result<Value> {
        self.execute(endpoint, None).await
    }

    /// Call an endpoint with arguments.
    ///
    /// `args` must serialize to a JSON object; its fields become the request
    /// body. An empty object sends no body.
    pub async fn call_with<A: Serialize + ?Sized>(&self, endpoint: &str, args: &A) -> Result<Value> {
        let args = encode_args(args)?;
        self.execute(endpoint, args).await
    }

    async fn execute(&self, endpoint: &str, args: Option<Map<String, Value>>) -> Result<Value> {
        let request = self.build_request(endpoint, args)?;
        let response = self.transport.execute(request).await?;
        classify_response(response)
    }

    /// Build the request for an endpoint without sending it
    pub fn build_request(&self, endpoint: &str, args: Option<Map<String, Value>>) -> Result<ApiRequest> {
        let method = self.router.method_for(endpoint)?;

        let body = match args {
            Some(args) if !args.is_empty() => Some(Bytes::from(
                serde_json::to_vec(&args).map_err(|e| Error::Serialization(e.to_string()))?,
            )),
            _ => None,
        };

        let url = self.config.url_for(endpoint);

        tracing::debug!(
            method = %method,
            url = %url,
            bytes = body.as_ref().map_or(0, Bytes::len),
            "Sending request"
        );

        Ok(ApiRequest {
            method,
            url,
            headers: vec![
                (API_KEY_HEADER.to_string(), self.config.api_key.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
        })
    }

    /// Serial numbers of all connected cameras
    pub async fn cameras(&self) -> Result<Vec<String>> {
        let resp = self.call("cameras").await?;
        Ok(resp
            .get("cameras")
            .and_then(Value::as_array)
            .map(|cams| {
                cams.iter()
                    .filter_map(|c| c.get("serial").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Fetch the status of one camera
    pub async fn camera_status(&self, serial: &str) -> Result<CameraStatus> {
        let resp = self.call(&format!("camera/{}", serial)).await?;
        Ok(CameraStatus::new(resp))
    }

    /// Whether a camera is recording (or about to)
    pub async fn is_recording(&self, serial: &str) -> Result<bool> {
        Ok(self.camera_status(serial).await?.is_recording())
    }

    /// Whether a camera is copying recordings
    pub async fn is_copying(&self, serial: &str) -> Result<bool> {
        Ok(self.camera_status(serial).await?.is_copying())
    }

    /// Whether a camera is exporting recordings
    pub async fn is_exporting(&self, serial: &str) -> Result<bool> {
        Ok(self.camera_status(serial).await?.is_exporting())
    }

    /// Find where a camera publishes a realtime stream.
    ///
    /// With no serial the first listed camera is used. `force_host`
    /// replaces whatever host the recorder advertises.
    pub async fn stream_endpoint(
        &self,
        serial: Option<&str>,
        kind: StreamKind,
        force_host: Option<&str>,
    ) -> Result<StreamEndpoint> {
        let serial = match serial {
            Some(serial) => serial.to_string(),
            None => self
                .cameras()
                .await?
                .into_iter()
                .next()
                .ok_or(StreamError::NoCameras)?,
        };

        let status = match self.camera_status(&serial).await {
            Ok(status) => status,
            Err(Error::Api { message, code }) => {
                tracing::debug!(serial = %serial, code, message = %message, "Camera status rejected");
                return Err(StreamError::CameraNotFound(serial).into());
            }
            Err(e) => return Err(e),
        };

        let endpoint = status.stream_endpoint(kind, &self.config.host, force_host)?;
        tracing::debug!(
            serial = %serial,
            kind = %kind,
            address = %endpoint.address(),
            "Resolved stream endpoint"
        );
        Ok(endpoint)
    }

    /// Open a camera's image stream
    pub async fn image_stream(
        &self,
        serial: Option<&str>,
        force_host: Option<&str>,
        mode: SocketMode,
    ) -> Result<ImageStreamer> {
        let endpoint = self
            .stream_endpoint(serial, StreamKind::Image, force_host)
            .await?;
        ImageStreamer::open(&endpoint, mode).await
    }

    /// Open a camera's state stream
    pub async fn state_stream(
        &self,
        serial: Option<&str>,
        force_host: Option<&str>,
    ) -> Result<StateStreamer> {
        let endpoint = self
            .stream_endpoint(serial, StreamKind::State, force_host)
            .await?;
        StateStreamer::open(&endpoint).await
    }
}

/// Encode call arguments as a JSON object. `None` means "no arguments".
pub fn encode_args<A: Serialize + ?Sized>(args: &A) -> Result<Option<Map<String, Value>>> {
    match serde_json::to_value(args) {
        Ok(Value::Object(map)) if map.is_empty() => Ok(None),
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(Value::Null) => Ok(None),
        Ok(other) => Err(Error::Serialization(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(Error::Serialization(e.to_string())),
    }
}

/// Turn a raw response into a value or a classified error
pub fn classify_response(response: ApiResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(classify_error(&response));
    }

    if response.body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(&response.body)
        .map_err(|e| ProtocolError::InvalidResponse(e.to_string()).into())
}

fn classify_error(response: &ApiResponse) -> Error {
    let parsed: Option<Value> = serde_json::from_slice(&response.body).ok();

    let structured = parsed.as_ref().and_then(|body| {
        let message = body.get("error")?.as_str()?.to_string();
        let code = body.get("status_code")?.as_i64()?;
        Some((message, code))
    });

    match structured {
        Some((message, code)) => Error::Api { message, code },
        None => ProtocolError::UnknownApiError {
            status: response.status,
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::Mutex;

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::client::router::HttpMethod;
    use crate::test_util::capture_logs;

    /// Replays canned responses and records every request
    struct CannedTransport {
        responses: Mutex<VecDeque<Result<ApiResponse>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl CannedTransport {
        fn new(responses: Vec<Result<ApiResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for CannedTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Unreachable("no canned response".into())))
        }
    }

    fn client(responses: Vec<Result<ApiResponse>>) -> MotifClient<CannedTransport> {
        let config = ClientConfig::builder()
            .host("10.0.0.5")
            .port(6083)
            .api_key("secret")
            .resolve(&[])
            .unwrap();
        MotifClient::with_transport(config, CannedTransport::new(responses)).unwrap()
    }

    fn ok(body: &'static str) -> Result<ApiResponse> {
        Ok(ApiResponse::new(200, body))
    }

    #[tokio::test]
    async fn test_request_shape() {
        let client = client(vec![ok("")]);
        let args = json!({"duration": 10});

        assert_ok!(client.call_with("/camera/ABC/recording/start", &args).await);

        let requests = client.transport.requests();
        assert_eq!(requests.len(), 1);

        let req = &requests[0];
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://10.0.0.5:6083/api/1/camera/ABC/recording/start");
        assert_eq!(req.header("x-api-key"), Some("secret"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(&br#"{"duration":10}"#[..]));
    }

    #[tokio::test]
    async fn test_version_has_no_prefix() {
        let client = client(vec![ok(r#"{"software":"1.2.3"}"#)]);
        client.call("version").await.unwrap();

        let req = &client.transport.requests()[0];
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "https://10.0.0.5:6083/version");
        assert!(req.body.is_none());
    }

    #[tokio::test]
    async fn test_unknown_endpoint_sends_nothing() {
        let client = client(vec![]);
        let err = assert_err!(client.call("no/such/thing").await);

        assert!(matches!(err, Error::UnknownEndpoint(ref e) if e == "no/such/thing"));
        assert!(client.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_serialization_error_sends_nothing() {
        let client = client(vec![]);
        let err = assert_err!(client.call_with("recordings", &[1, 2]).await);

        assert!(matches!(err, Error::Serialization(_)));
        assert!(client.transport.requests().is_empty());
    }

    #[test]
    fn test_arguments_round_trip() {
        let args = json!({"name": "exp-1", "cameras": ["A", "B"], "meta": {"n": 3}});
        let client = client(vec![]);

        let request = client
            .build_request("recordings/export_all", encode_args(&args).unwrap())
            .unwrap();
        let echoed = request.body.unwrap();

        let value = assert_ok!(classify_response(ApiResponse::new(200, echoed)));
        assert_eq!(value, args);
    }

    #[tokio::test]
    async fn test_cameras_and_status() {
        let client = client(vec![
            ok(r#"{"cameras":[{"serial":"A1"},{"serial":"B2"}]}"#),
            ok(r#"{"camera_info":{"status":"pending"}}"#),
        ]);

        assert_eq!(client.cameras().await.unwrap(), vec!["A1", "B2"]);
        assert!(client.is_recording("A1").await.unwrap());
        assert_eq!(client.transport.requests()[1].url, "https://10.0.0.5:6083/api/1/camera/A1");
    }

    #[tokio::test]
    async fn test_stream_endpoint_first_camera() {
        let client = client(vec![
            ok(r#"{"cameras":[{"serial":"A1"}]}"#),
            ok(r#"{"camera_info":{"stream":{"image":{"host":"0.0.0.0","port":5555}}}}"#),
        ]);

        let endpoint = client
            .stream_endpoint(None, StreamKind::Image, None)
            .await
            .unwrap();
        assert_eq!(endpoint.address(), "tcp://10.0.0.5:5555");
    }

    #[tokio::test]
    async fn test_stream_endpoint_no_cameras() {
        let client = client(vec![ok(r#"{"cameras":[]}"#)]);
        let err = assert_err!(client.stream_endpoint(None, StreamKind::State, None).await);
        assert!(matches!(err, Error::Stream(StreamError::NoCameras)));
    }

    #[tokio::test]
    async fn test_stream_endpoint_camera_not_found() {
        let client = client(vec![Ok(ApiResponse::new(
            404,
            r#"{"error":"no camera","status_code":404}"#,
        ))]);

        let err = assert_err!(
            client
                .stream_endpoint(Some("ZZZ"), StreamKind::Image, None)
                .await
        );
        assert!(matches!(err, Error::Stream(StreamError::CameraNotFound(ref s)) if s == "ZZZ"));
    }

    #[tokio::test]
    async fn test_unreachable_propagates() {
        let client = client(vec![Err(Error::Unreachable("refused".into()))]);
        let err = assert_err!(
            client
                .stream_endpoint(Some("A1"), StreamKind::Image, None)
                .await
        );
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_request_logged() {
        let client = client(vec![]);
        let (request, logs) = capture_logs(|| client.build_request("cameras", None));

        assert!(request.is_ok());
        assert!(logs.contains("Sending request"), "{}", logs);
        assert!(logs.contains("url=https://10.0.0.5:6083/api/1/cameras"), "{}", logs);
    }

    #[test]
    fn test_empty_body_is_empty_mapping() {
        let value = assert_ok!(classify_response(ApiResponse::new(200, "")));
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_json_body_returned_as_is() {
        let value = assert_ok!(classify_response(ApiResponse::new(200, r#"[1, 2, 3]"#)));
        assert_eq!(value, json!([1, 2, 3]));

        let value = assert_ok!(classify_response(ApiResponse::new(200, "\"1.2.3\"")));
        assert_eq!(value, json!("1.2.3"));
    }

    #[test]
    fn test_invalid_json_body() {
        let err = assert_err!(classify_response(ApiResponse::new(200, "not json")));
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_structured_error() {
        let err = assert_err!(classify_response(ApiResponse::new(
            409,
            r#"{"error":"boom","status_code":409}"#
        )));

        match err {
            Error::Api { message, code } => {
                assert_eq!(message, "boom");
                assert_eq!(code, 409);
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_unstructured_error() {
        let err = assert_err!(classify_response(ApiResponse::new(500, "<html>oops</html>")));
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnknownApiError { status: 500 })
        ));

        // JSON, but missing status_code
        let err = assert_err!(classify_response(ApiResponse::new(400, r#"{"error":"x"}"#)));
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnknownApiError { status: 400 })
        ));

        let err = assert_err!(classify_response(ApiResponse::new(404, "")));
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnknownApiError { status: 404 })
        ));
    }

    #[test]
    fn test_encode_args() {
        let mut args = BTreeMap::new();
        args.insert("duration", json!(10));
        args.insert("codec", json!("h264"));

        let encoded = assert_ok!(encode_args(&args)).unwrap();
        assert_eq!(encoded.get("duration"), Some(&json!(10)));
        assert_eq!(encoded.get("codec"), Some(&json!("h264")));
    }

    #[test]
    fn test_encode_empty_args_is_none() {
        assert_eq!(assert_ok!(encode_args(&json!({}))), None);
        assert_eq!(assert_ok!(encode_args(&())), None);
    }

    #[test]
    fn test_encode_non_object_rejected() {
        let err = assert_err!(encode_args(&vec![1, 2, 3]));
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_encode_unserializable_rejected() {
        // maps with non-string keys have no JSON form
        let mut args = BTreeMap::new();
        args.insert(vec![1u8], 1);

        let err = assert_err!(encode_args(&args));
        assert!(matches!(err, Error::Serialization(_)));
    }
}
