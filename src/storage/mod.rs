//! In-memory signal store.
//!
//! One [`Store`] owns every table behind a single mutex. Writers take the
//! lock once per interning probe or record commit, so concurrent ingestion
//! and API reads interleave between records rather than between batches.

pub mod interned;
pub mod logs;
pub mod metrics;
pub mod traces;

pub use interned::{RequestMeta, Resource, Scope, Transport};
pub use logs::{LogRecord, LogSummary};
pub use metrics::{
    BasePoint, ExpBuckets, ExpHistogramPoint, Exemplar, HistoLike, HistogramPoint, Metric,
    MetricIdentity, MetricStream, NumberPoint, Point, Quantile, SummaryPoint,
};
pub use traces::{Event, Link, Span, SpanSummary, Trace};

use crate::core::{MetricId, ReqId, ResId, ScopeId, SpanId, TraceId};
use crate::value::{AttrMap, Hashable, ToJson};
use parking_lot::{Mutex, MutexGuard};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Interned ids a record was received with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Origin {
    pub req: ReqId,
    pub res: ResId,
    pub scope: ScopeId,
}

/// Every table the store keeps.
///
/// Maps are ordered so that API responses list ids in ascending order.
#[derive(Debug, Default)]
pub struct Tables {
    pub requests: BTreeMap<ReqId, RequestMeta>,
    pub resources: BTreeMap<ResId, Resource>,
    pub scopes: BTreeMap<ScopeId, Scope>,
    pub traces: BTreeMap<TraceId, Trace>,
    /// Append-only; a log's index is its id.
    pub logs: Vec<LogRecord>,
    pub metrics: BTreeMap<MetricId, Metric>,
}

/// Process-wide signal storage.
#[derive(Debug, Default)]
pub struct Store {
    verbose: bool,
    tables: Mutex<Tables>,
}

impl Store {
    /// Create an empty store.
    ///
    /// With `verbose` set, every interned or committed record is printed
    /// to stdout as one line of canonical JSON.
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Lock the tables for reading.
    pub fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock()
    }

    /// Drop all stored state.
    pub fn reset(&self) {
        *self.tables.lock() = Tables::default();
        tracing::info!("Store reset");
    }

    fn dump(&self, prefix: &str, record: &impl ToJson) {
        if self.verbose {
            println!("{}{}", prefix, record.to_json());
        }
    }

    pub fn intern_request(&self, req: RequestMeta) -> ReqId {
        let id = ReqId(req.digest());
        self.dump("req: ", &req);
        self.tables.lock().requests.entry(id).or_insert(req);
        id
    }

    pub fn intern_resource(&self, res: Resource) -> ResId {
        let id = ResId(res.digest());
        self.dump("res: ", &res);
        self.tables.lock().resources.entry(id).or_insert(res);
        id
    }

    pub fn intern_scope(&self, scope: Scope) -> ScopeId {
        let id = ScopeId(scope.digest());
        self.dump("  scope: ", &scope);
        self.tables.lock().scopes.entry(id).or_insert(scope);
        id
    }

    /// Store a span unless the (trace, span) pair is already present.
    ///
    /// Returns false when the span was a duplicate and got dropped.
    pub fn commit_span(&self, trace_id: TraceId, span_id: SpanId, span: Span) -> bool {
        self.dump("    span: ", &span);
        let inserted = {
            let mut tables = self.tables.lock();
            let trace = tables.traces.entry(trace_id).or_default();
            match trace.spans.entry(span_id) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(span);
                    true
                },
            }
        };
        if !inserted {
            tracing::warn!("span {} received twice", span_id);
        }
        inserted
    }

    /// Append a log record, returning its id.
    pub fn commit_log(&self, log: LogRecord) -> usize {
        self.dump("    log: ", &log);
        let mut tables = self.tables.lock();
        tables.logs.push(log);
        tables.logs.len() - 1
    }

    /// Create the metric named by `identity` or reconcile its header.
    pub fn commit_metric(
        &self,
        identity: &MetricIdentity,
        desc: &str,
        meta: &AttrMap,
    ) -> MetricId {
        let id = identity.id();
        let mut tables = self.tables.lock();
        let conflicted = match tables.metrics.get_mut(&id) {
            Some(metric) => metric.merge_header(desc, meta),
            None => {
                tables.metrics.insert(
                    id,
                    Metric::new(identity.clone(), desc.to_string(), meta.clone()),
                );
                false
            },
        };
        drop(tables);
        if conflicted {
            tracing::warn!(
                metric = %identity.name,
                kind = %identity.kind,
                unit = %identity.unit,
                "conflicting metadata for metric identity {}",
                id
            );
        }
        id
    }

    /// Append one point to its stream.
    ///
    /// The metric is recreated from `identity` when a reset removed it
    /// while its batch was being committed.
    pub fn commit_point(
        &self,
        identity: &MetricIdentity,
        desc: &str,
        meta: &AttrMap,
        attr: AttrMap,
        point: Point,
    ) {
        let id = identity.id();
        let mut tables = self.tables.lock();
        tables
            .metrics
            .entry(id)
            .or_insert_with(|| Metric::new(identity.clone(), desc.to_string(), meta.clone()))
            .push_point(attr, point);
    }

    /// Print a committed metric when verbose.
    pub fn dump_metric(&self, id: MetricId) {
        if !self.verbose {
            return;
        }
        let rendered = self.tables.lock().metrics.get(&id).map(|m| m.to_json());
        if let Some(json) = rendered {
            println!("    metric: {}", json);
        }
    }
}
