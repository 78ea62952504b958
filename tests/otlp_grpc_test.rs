//! OTLP/gRPC receiver integration tests.
//!
//! Runs the collector services on a loopback socket and talks to them with
//! the generated tonic clients.

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_client::LogsServiceClient;
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_client::TraceServiceClient;
use otelscope_lib::receiver::grpc;
use otelscope_lib::storage::{Store, Transport};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::codec::CompressionEncoding;

mod common;
use common::*;

struct Running {
    store: Arc<Store>,
    addr: SocketAddr,
    stop: watch::Sender<bool>,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

async fn start() -> Running {
    let store = Arc::new(Store::new(false));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, shutdown) = watch::channel(false);
    let handles = grpc::spawn(Arc::clone(&store), vec![listener], &shutdown);
    Running {
        store,
        addr,
        stop,
        handles,
    }
}

#[tokio::test]
async fn export_over_grpc() {
    let server = start().await;
    let mut client = TraceServiceClient::connect(format!("http://{}", server.addr))
        .await
        .unwrap()
        .send_compressed(CompressionEncoding::Gzip);

    let mut request =
        tonic::Request::new(trace_request(resource("svc"), vec![span(1, 0xa, "rpc")]));
    request
        .metadata_mut()
        .insert("x-tenant", "green".parse().unwrap());
    client.export(request).await.unwrap();

    {
        let tables = server.store.lock();
        assert_eq!(tables.traces.len(), 1);
        let req = tables.requests.values().next().unwrap();
        assert_eq!(req.transport, Transport::Grpc);
        assert!(req.peer.starts_with("127.0.0.1:"));
        let headers = req.headers.as_ref().unwrap();
        assert_eq!(headers["x-tenant"], vec!["green".to_string()]);
    }

    let mut logs = LogsServiceClient::connect(format!("http://{}", server.addr))
        .await
        .unwrap();
    logs.export(log_request(vec![log_record("over grpc")]))
        .await
        .unwrap();
    assert_eq!(server.store.lock().logs.len(), 1);

    drop(client);
    drop(logs);
    server.stop.send(true).unwrap();
    for handle in server.handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

#[tokio::test]
async fn malformed_export_is_invalid_argument() {
    let server = start().await;
    let mut client = TraceServiceClient::connect(format!("http://{}", server.addr))
        .await
        .unwrap();

    let mut bad = span(1, 0xa, "rpc");
    bad.trace_id = vec![7; 5];
    let status = client
        .export(trace_request(resource("svc"), vec![bad]))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    assert!(server.store.lock().requests.is_empty());
}
