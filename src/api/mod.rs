//! Read API and static UI server.
//!
//! Every `/api` response is canonical JSON compressed with gzip. The JSON
//! is rendered while the store is locked; compression happens after the
//! lock is released.

use crate::core::{Config, MetricId, Result, ScopeError, SpanId, TraceId};
use crate::receiver::http::HttpError;
use crate::receiver::{bind_localhost, serve_router, Shutdown};
use crate::storage::{Origin, Store, Tables};
use crate::value::json::{self, MapWriter};
use axum::{
    extract::{Path, State},
    http::{
        header::{CONTENT_ENCODING, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path as FsPath;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

type ApiResult = std::result::Result<GzipJson, HttpError>;

/// Create the router for `/api` plus the static file fallback.
pub fn create_api_router(store: Arc<Store>, static_dir: impl AsRef<FsPath>) -> Router {
    Router::new()
        .route("/api/traces", get(list_traces))
        .route("/api/span/:trace_id/:span_id", get(get_span))
        .route("/api/logs", get(list_logs))
        .route("/api/log/:log_id", get(get_log))
        .route("/api/metrics", get(list_metrics))
        .route("/api/metric/:metric_id", get(get_metric))
        .route("/api/reset", post(reset))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Bind the UI port and spawn the API server tasks.
pub async fn start(
    store: Arc<Store>,
    config: &Config,
    shutdown: &Shutdown,
) -> Result<Vec<JoinHandle<()>>> {
    let listeners = bind_localhost(config.server.ui_port).await?;
    tracing::info!(
        "Starting UI endpoint at http://127.0.0.1:{}",
        config.server.ui_port
    );
    let app = create_api_router(store, &config.ui.static_dir);
    Ok(serve_router("UI", app, listeners, shutdown))
}

/// A JSON document sent gzip-compressed.
#[derive(Debug, Clone)]
pub struct GzipJson(pub String);

impl GzipJson {
    fn render(f: impl FnOnce(&mut String)) -> Self {
        let mut out = String::new();
        f(&mut out);
        Self(out)
    }

    fn compress(&self) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(self.0.as_bytes())?;
        encoder.finish()
    }
}

impl IntoResponse for GzipJson {
    fn into_response(self) -> Response {
        match self.compress() {
            Ok(body) => (
                StatusCode::OK,
                [
                    (CONTENT_TYPE, HeaderValue::from_static("application/json")),
                    (CONTENT_ENCODING, HeaderValue::from_static("gzip")),
                ],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Failed to compress API response: {}", e);
                HttpError::from(ScopeError::from(e)).into_response()
            },
        }
    }
}

fn parse<T>(s: &str) -> std::result::Result<T, HttpError>
where
    T: std::str::FromStr<Err = ScopeError>,
{
    s.parse().map_err(HttpError::from)
}

/// Writes the records a span or log refers to.
fn write_origin(m: &mut MapWriter<'_>, tables: &Tables, origin: &Origin) {
    if let Some(scope) = tables.scopes.get(&origin.scope) {
        m.pair("scope", scope);
    }
    if let Some(res) = tables.resources.get(&origin.res) {
        m.pair("resource", res);
    }
    if let Some(req) = tables.requests.get(&origin.req) {
        m.pair("request", req);
    }
}

async fn list_traces(State(store): State<Arc<Store>>) -> ApiResult {
    let tables = store.lock();
    Ok(GzipJson::render(|out| {
        json::map(out, |m| {
            for (id, trace) in &tables.traces {
                m.pair(&id.to_hex(), trace);
            }
        })
    }))
}

async fn get_span(
    State(store): State<Arc<Store>>,
    Path((trace_id, span_id)): Path<(String, String)>,
) -> ApiResult {
    let trace_id: TraceId = parse(&trace_id)?;
    let span_id: SpanId = parse(&span_id)?;
    let tables = store.lock();
    let span = tables
        .traces
        .get(&trace_id)
        .and_then(|t| t.spans.get(&span_id))
        .ok_or_else(|| HttpError::NotFound(format!("span {trace_id}/{span_id}")))?;
    Ok(GzipJson::render(|out| {
        json::map(out, |m| {
            m.pair("span", span);
            write_origin(m, &tables, &span.origin());
        })
    }))
}

async fn list_logs(State(store): State<Arc<Store>>) -> ApiResult {
    let tables = store.lock();
    Ok(GzipJson::render(|out| {
        json::array(out, |a| {
            for log in &tables.logs {
                a.item(&log.summary);
            }
        })
    }))
}

async fn get_log(State(store): State<Arc<Store>>, Path(log_id): Path<String>) -> ApiResult {
    let index: usize = log_id
        .parse()
        .map_err(|_| HttpError::BadRequest(format!("invalid log id '{log_id}'")))?;
    let tables = store.lock();
    let log = tables
        .logs
        .get(index)
        .ok_or_else(|| HttpError::NotFound(format!("log {index}")))?;
    Ok(GzipJson::render(|out| {
        json::map(out, |m| {
            m.pair("log", log);
            write_origin(m, &tables, &log.origin());
        })
    }))
}

async fn list_metrics(State(store): State<Arc<Store>>) -> ApiResult {
    let tables = store.lock();
    Ok(GzipJson::render(|out| {
        json::map(out, |m| {
            m.submap("metrics", |mm| {
                for (id, metric) in &tables.metrics {
                    mm.submap(&id.to_hex(), |entry| metric.write_listing(entry));
                }
            });
            m.submap("resources", |mm| {
                for (id, res) in &tables.resources {
                    mm.pair(&id.to_hex(), res);
                }
            });
            m.submap("scopes", |mm| {
                for (id, scope) in &tables.scopes {
                    mm.pair(&id.to_hex(), scope);
                }
            });
        })
    }))
}

async fn get_metric(
    State(store): State<Arc<Store>>,
    Path(metric_id): Path<String>,
) -> ApiResult {
    let id: MetricId = parse(&metric_id)?;
    let tables = store.lock();
    let metric = tables
        .metrics
        .get(&id)
        .ok_or_else(|| HttpError::NotFound(format!("metric {id}")))?;
    let mut requests: Vec<_> = metric.contributing_requests().collect();
    requests.sort_unstable();
    requests.dedup();
    Ok(GzipJson::render(|out| {
        json::map(out, |m| {
            m.pair("metric", metric);
            m.submap("requests", |mm| {
                for id in &requests {
                    if let Some(req) = tables.requests.get(id) {
                        mm.pair(&id.to_hex(), req);
                    }
                }
            });
        })
    }))
}

async fn reset(State(store): State<Arc<Store>>) -> ApiResult {
    store.reset();
    Ok(GzipJson("{}".to_string()))
}
