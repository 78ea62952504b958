//! OTLP/gRPC collector services.

use super::{shutdown_requested, Shutdown};
use crate::core::ScopeError;
use crate::storage::{RequestMeta, Store, Transport};
use opentelemetry_proto::tonic::collector::logs::v1::{
    logs_service_server::{LogsService, LogsServiceServer},
    ExportLogsServiceRequest, ExportLogsServiceResponse,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::codec::CompressionEncoding;
use tonic::metadata::KeyAndValueRef;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// Trace, logs and metrics services sharing one store.
#[derive(Clone)]
pub struct OtlpGrpcService {
    store: Arc<Store>,
}

impl OtlpGrpcService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

/// Request metadata as the store records it: the peer address and the
/// ASCII metadata entries.
fn request_meta<T>(request: &Request<T>) -> RequestMeta {
    let peer = request
        .remote_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    let headers = request.metadata().iter().filter_map(|entry| match entry {
        KeyAndValueRef::Ascii(key, value) => value
            .to_str()
            .ok()
            .map(|value| (key.as_str(), value.to_string())),
        KeyAndValueRef::Binary(..) => None,
    });
    RequestMeta::new(Transport::Grpc, peer, headers)
}

fn reject(signal: &str, peer: &str, err: ScopeError) -> Status {
    tracing::warn!("Rejected {} export from {}: {}", signal, peer, err);
    Status::invalid_argument(err.to_string())
}

#[tonic::async_trait]
impl TraceService for OtlpGrpcService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> std::result::Result<Response<ExportTraceServiceResponse>, Status> {
        let meta = request_meta(&request);
        let peer = meta.peer.clone();
        self.store
            .ingest_traces(request.get_ref(), meta)
            .map_err(|e| reject("trace", &peer, e))?;
        Ok(Response::new(ExportTraceServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl LogsService for OtlpGrpcService {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> std::result::Result<Response<ExportLogsServiceResponse>, Status> {
        let meta = request_meta(&request);
        let peer = meta.peer.clone();
        self.store
            .ingest_logs(request.get_ref(), meta)
            .map_err(|e| reject("logs", &peer, e))?;
        Ok(Response::new(ExportLogsServiceResponse::default()))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpGrpcService {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> std::result::Result<Response<ExportMetricsServiceResponse>, Status> {
        let meta = request_meta(&request);
        let peer = meta.peer.clone();
        self.store
            .ingest_metrics(request.get_ref(), meta)
            .map_err(|e| reject("metrics", &peer, e))?;
        Ok(Response::new(ExportMetricsServiceResponse::default()))
    }
}

/// Accepted connections of `listener` as a stream.
fn incoming(
    listener: TcpListener,
) -> impl futures::Stream<Item = std::io::Result<tokio::net::TcpStream>> {
    futures::stream::unfold(listener, |listener| async move {
        let conn = listener.accept().await.map(|(stream, _)| stream);
        Some((conn, listener))
    })
}

/// Serve the three collector services on every listener until shutdown.
pub fn spawn(
    store: Arc<Store>,
    listeners: Vec<TcpListener>,
    shutdown: &Shutdown,
) -> Vec<JoinHandle<()>> {
    let service = OtlpGrpcService::new(store);
    listeners
        .into_iter()
        .map(|listener| {
            let addr = listener
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_default();
            tracing::info!("OTLP/gRPC server listening on {}", addr);
            let server = Server::builder()
                .add_service(
                    TraceServiceServer::new(service.clone())
                        .accept_compressed(CompressionEncoding::Gzip),
                )
                .add_service(
                    LogsServiceServer::new(service.clone())
                        .accept_compressed(CompressionEncoding::Gzip),
                )
                .add_service(
                    MetricsServiceServer::new(service.clone())
                        .accept_compressed(CompressionEncoding::Gzip),
                )
                .serve_with_incoming_shutdown(
                    Box::pin(incoming(listener)),
                    shutdown_requested(shutdown.clone()),
                );
            tokio::spawn(async move {
                match server.await {
                    Ok(()) => tracing::debug!("OTLP/gRPC server on {} stopped", addr),
                    Err(e) => tracing::error!("OTLP/gRPC server on {} failed: {}", addr, e),
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::trace::v1::{ResourceSpans, ScopeSpans, Span};

    fn trace_request(span_id: Vec<u8>) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans: vec![Span {
                        trace_id: vec![1; 16],
                        span_id,
                        name: "grpc".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn export_records_metadata() {
        let store = Arc::new(Store::new(false));
        let service = OtlpGrpcService::new(Arc::clone(&store));
        let mut request = Request::new(trace_request(vec![0xa; 8]));
        request
            .metadata_mut()
            .insert("x-tenant", "blue".parse().unwrap());

        TraceService::export(&service, request).await.unwrap();

        let tables = store.lock();
        assert_eq!(tables.traces.len(), 1);
        let req = tables.requests.values().next().unwrap();
        assert_eq!(req.transport, Transport::Grpc);
        let headers = req.headers.as_ref().unwrap();
        assert_eq!(headers["x-tenant"], vec!["blue".to_string()]);
    }

    #[tokio::test]
    async fn malformed_ids_are_invalid_argument() {
        let store = Arc::new(Store::new(false));
        let service = OtlpGrpcService::new(Arc::clone(&store));
        let status = TraceService::export(&service, Request::new(trace_request(vec![1; 3])))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert!(store.lock().traces.is_empty());
    }

    #[tokio::test]
    async fn empty_exports_succeed() {
        let service = OtlpGrpcService::new(Arc::new(Store::new(false)));
        LogsService::export(&service, Request::new(ExportLogsServiceRequest::default()))
            .await
            .unwrap();
        MetricsService::export(&service, Request::new(ExportMetricsServiceRequest::default()))
            .await
            .unwrap();
    }
}
