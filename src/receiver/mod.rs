//! OTLP receivers.
//!
//! This module binds the gRPC and HTTP ingest endpoints on the loopback
//! interfaces and runs them until the shared shutdown signal fires.

pub mod grpc;
pub mod http;

use crate::core::{Config, Result, ScopeError};
use crate::storage::Store;
use axum::Router;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Receiving end of the process-wide shutdown channel.
pub type Shutdown = watch::Receiver<bool>;

/// Resolves once `true` has been sent on the channel or the sender is gone.
pub async fn shutdown_requested(mut shutdown: Shutdown) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Bind `port` on `127.0.0.1` and `[::1]`.
///
/// The IPv6 listener is skipped with a warning when the host has no IPv6
/// loopback. Any other bind failure is returned.
pub async fn bind_localhost(port: u16) -> Result<Vec<TcpListener>> {
    let mut listeners = Vec::with_capacity(2);
    for ip in [IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V6(Ipv6Addr::LOCALHOST)] {
        let addr = SocketAddr::new(ip, port);
        match TcpListener::bind(addr).await {
            Ok(listener) => listeners.push(listener),
            Err(e)
                if ip.is_ipv6()
                    && matches!(e.kind(), ErrorKind::AddrNotAvailable | ErrorKind::Unsupported) =>
            {
                tracing::warn!("Skipping {}: {}", addr, e);
            },
            Err(e) => {
                return Err(ScopeError::network(format!("Failed to bind {}: {}", addr, e)));
            },
        }
    }
    Ok(listeners)
}

/// Serve `app` on every listener until shutdown, one task per listener.
///
/// Handlers can extract the peer address through `ConnectInfo<SocketAddr>`.
pub fn serve_router(
    name: &'static str,
    app: Router,
    listeners: Vec<TcpListener>,
    shutdown: &Shutdown,
) -> Vec<JoinHandle<()>> {
    listeners
        .into_iter()
        .map(|listener| {
            let app = app.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let addr = listener
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                tracing::info!("{} server listening on {}", name, addr);
                let result = axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(shutdown_requested(shutdown))
                .await;
                match result {
                    Ok(()) => tracing::debug!("{} server on {} stopped", name, addr),
                    Err(e) => tracing::error!("{} server on {} failed: {}", name, addr, e),
                }
            })
        })
        .collect()
}

/// The gRPC and HTTP ingest endpoints of one store.
pub struct OtlpReceiver {
    store: Arc<Store>,
    grpc_port: u16,
    http_port: u16,
}

impl OtlpReceiver {
    /// Create a receiver. A port of 0 disables that endpoint.
    pub fn new(store: Arc<Store>, grpc_port: u16, http_port: u16) -> Self {
        Self {
            store,
            grpc_port,
            http_port,
        }
    }

    pub fn from_config(store: Arc<Store>, config: &Config) -> Self {
        Self::new(store, config.server.grpc_port, config.server.http_port)
    }

    /// Bind every enabled endpoint and spawn its server tasks.
    ///
    /// Binding happens before anything is spawned, so a bind failure leaves
    /// nothing running.
    pub async fn start(&self, shutdown: &Shutdown) -> Result<Vec<JoinHandle<()>>> {
        let grpc_listeners = match self.grpc_port {
            0 => Vec::new(),
            port => bind_localhost(port).await?,
        };
        let http_listeners = match self.http_port {
            0 => Vec::new(),
            port => bind_localhost(port).await?,
        };

        let mut handles = grpc::spawn(Arc::clone(&self.store), grpc_listeners, shutdown);
        handles.extend(serve_router(
            "OTLP/HTTP",
            http::create_http_router(Arc::clone(&self.store)),
            http_listeners,
            shutdown,
        ));
        Ok(handles)
    }
}
