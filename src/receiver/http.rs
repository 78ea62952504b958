//! HTTP OTLP receiver implementation.
//!
//! Implements the OTLP/HTTP endpoints for traces, logs and metrics. Bodies
//! may be protobuf (`application/x-protobuf`) or JSON (`application/json`),
//! optionally gzip-compressed, and the response mirrors the request's
//! content type.

use crate::core::{Result, ScopeError};
use crate::storage::{RequestMeta, Store, Transport};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{
        header::{CONTENT_ENCODING, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use flate2::read::GzDecoder;
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use prost::Message;
use serde::{de::DeserializeOwned, Serialize};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create HTTP router for OTLP endpoints.
///
/// Export bodies are not size-limited.
pub fn create_http_router(store: Arc<Store>) -> Router {
    Router::new()
        .route("/v1/traces", post(handle_export::<ExportTraceServiceRequest>))
        .route("/v1/logs", post(handle_export::<ExportLogsServiceRequest>))
        .route("/v1/metrics", post(handle_export::<ExportMetricsServiceRequest>))
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// An OTLP export request type accepted over HTTP.
pub trait ExportRequest: Message + Default + DeserializeOwned + Send + 'static {
    type Response: Message + Default + Serialize;

    const SIGNAL: &'static str;

    fn ingest(&self, store: &Store, req: RequestMeta) -> Result<()>;
}

impl ExportRequest for ExportTraceServiceRequest {
    type Response = ExportTraceServiceResponse;

    const SIGNAL: &'static str = "trace";

    fn ingest(&self, store: &Store, req: RequestMeta) -> Result<()> {
        store.ingest_traces(self, req)
    }
}

impl ExportRequest for ExportLogsServiceRequest {
    type Response = ExportLogsServiceResponse;

    const SIGNAL: &'static str = "logs";

    fn ingest(&self, store: &Store, req: RequestMeta) -> Result<()> {
        store.ingest_logs(self, req)
    }
}

impl ExportRequest for ExportMetricsServiceRequest {
    type Response = ExportMetricsServiceResponse;

    const SIGNAL: &'static str = "metrics";

    fn ingest(&self, store: &Store, req: RequestMeta) -> Result<()> {
        store.ingest_metrics(self, req)
    }
}

/// Body encoding of an OTLP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Protobuf,
    Json,
}

impl ContentType {
    /// Parse a `Content-Type` header value, ignoring parameters.
    pub fn parse(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("application/x-protobuf") {
            Some(Self::Protobuf)
        } else if essence.eq_ignore_ascii_case("application/json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let value = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Self::parse(value).ok_or_else(|| ScopeError::UnsupportedContentType(value.to_string()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protobuf => "application/x-protobuf",
            Self::Json => "application/json",
        }
    }

    pub fn decode<T: Message + Default + DeserializeOwned>(self, body: &[u8]) -> Result<T> {
        match self {
            Self::Protobuf => Ok(T::decode(body)?),
            Self::Json => Ok(serde_json::from_slice(body)?),
        }
    }

    pub fn encode<T: Message + Serialize>(self, message: &T) -> Result<Vec<u8>> {
        match self {
            Self::Protobuf => Ok(message.encode_to_vec()),
            Self::Json => Ok(serde_json::to_vec(message)?),
        }
    }
}

/// Undo the request's `Content-Encoding`; only gzip is accepted.
fn decode_body(headers: &HeaderMap, body: Bytes) -> Result<Bytes> {
    let encoding = headers
        .get(CONTENT_ENCODING)
        .map(|v| v.to_str().unwrap_or("<binary>").trim())
        .unwrap_or_default();
    if encoding.is_empty() {
        return Ok(body);
    }
    if !encoding.eq_ignore_ascii_case("gzip") {
        return Err(ScopeError::UnsupportedEncoding(encoding.to_string()));
    }
    let mut decoded = Vec::new();
    GzDecoder::new(body.as_ref())
        .read_to_end(&mut decoded)
        .map_err(|e| ScopeError::Gzip(e.to_string()))?;
    Ok(decoded.into())
}

fn request_meta(peer: Option<SocketAddr>, headers: &HeaderMap) -> RequestMeta {
    let peer = peer.map(|p| p.to_string()).unwrap_or_default();
    let headers = headers.iter().filter_map(|(name, value)| {
        value
            .to_str()
            .ok()
            .map(|value| (name.as_str(), value.to_string()))
    });
    RequestMeta::new(Transport::Http, peer, headers)
}

async fn handle_export<T: ExportRequest>(
    State(store): State<Arc<Store>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, HttpError> {
    let peer = peer.map(|ConnectInfo(addr)| addr);
    let result = export::<T>(&store, peer, &headers, body);
    result.map_err(|e| {
        tracing::warn!(
            "Rejected {} export from {}: {}",
            T::SIGNAL,
            peer.map(|p| p.to_string()).unwrap_or_default(),
            e
        );
        HttpError::from(e)
    })
}

fn export<T: ExportRequest>(
    store: &Store,
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let content_type = ContentType::from_headers(headers)?;
    let body = decode_body(headers, body)?;
    let request: T = content_type.decode(&body)?;
    request.ingest(store, request_meta(peer, headers))?;

    let encoded = content_type.encode(&T::Response::default())?;
    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()))],
        encoded,
    )
        .into_response())
}

/// HTTP-specific error type.
///
/// Rendered as a `text/plain` body holding the status reason and message.
#[derive(Debug)]
pub enum HttpError {
    BadRequest(String),
    NotFound(String),
    UnsupportedMediaType(String),
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            HttpError::BadRequest(msg)
            | HttpError::NotFound(msg)
            | HttpError::UnsupportedMediaType(msg)
            | HttpError::Internal(msg) => msg,
        }
    }
}

impl From<ScopeError> for HttpError {
    fn from(err: ScopeError) -> Self {
        let msg = err.to_string();
        match err {
            ScopeError::UnsupportedContentType(_) => HttpError::UnsupportedMediaType(msg),
            ScopeError::NotFound(_) => HttpError::NotFound(msg),
            e if e.is_client_error() => HttpError::BadRequest(msg),
            _ => HttpError::Internal(msg),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = format!(
            "{}: {}",
            status.canonical_reason().unwrap_or_default(),
            self.message()
        );
        (
            status,
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
            body,
        )
            .into_response()
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for HttpError {}
