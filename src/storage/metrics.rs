//! Metric records, streams and data points.

use crate::core::{MetricId, ReqId, ResId, ScopeId, SpanId, StreamId, TraceId, TraceSpanId};
use crate::value::{json, AttrMap, Digest, Hashable, MapWriter, ToJson, Value};
use std::collections::BTreeMap;

/// The tuple that names a metric series' schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricIdentity {
    pub res: ResId,
    pub scope: ScopeId,
    pub name: String,
    /// Data type name, e.g. `Sum` or `ExponentialHistogram`.
    pub kind: String,
    pub unit: String,
    /// Aggregation temporality, empty for gauges and summaries.
    pub tempo: String,
    /// Only meaningful for `Sum`.
    pub mono: bool,
}

impl MetricIdentity {
    pub fn id(&self) -> MetricId {
        MetricId(self.digest())
    }

    pub(crate) fn write_fields(&self, m: &mut MapWriter<'_>) {
        m.pair("res", &self.res);
        m.pair("scope", &self.scope);
        m.pair("name", &self.name);
        m.pair("type", &self.kind);
        if !self.unit.is_empty() {
            m.pair("unit", &self.unit);
        }
        if !self.tempo.is_empty() {
            m.pair("tempo", &self.tempo);
        }
        if self.kind == "Sum" {
            m.pair("mono", &self.mono);
        }
    }
}

impl Hashable for MetricIdentity {
    fn hash_into(&self, d: &mut Digest) {
        self.res.hash_into(d);
        self.scope.hash_into(d);
        d.write_str(&self.name);
        d.write_str(&self.kind);
        d.write_str(&self.unit);
        d.write_str(&self.tempo);
        d.write_bool(self.mono);
    }
}

/// A metric and every point received for it, grouped by attribute set.
#[derive(Debug, Clone, Default)]
pub struct Metric {
    pub identity: MetricIdentity,
    pub desc: String,
    pub meta: AttrMap,
    /// Set once two senders disagreed on description or metadata.
    pub conflict: bool,
    pub streams: BTreeMap<StreamId, MetricStream>,
}

impl Metric {
    pub fn new(identity: MetricIdentity, desc: String, meta: AttrMap) -> Self {
        Self {
            identity,
            desc,
            meta,
            conflict: false,
            streams: BTreeMap::new(),
        }
    }

    /// Reconciles a repeated description and metadata.
    ///
    /// Keeps the longer description and the first metadata seen. Returns
    /// true only the first time a mismatch is found.
    pub fn merge_header(&mut self, desc: &str, meta: &AttrMap) -> bool {
        if self.desc == desc && self.meta.digest() == meta.digest() {
            return false;
        }
        if desc.len() > self.desc.len() {
            self.desc = desc.to_string();
        }
        let first = !self.conflict;
        self.conflict = true;
        first
    }

    /// Appends `point` to the stream for `attr`, creating it if needed.
    pub fn push_point(&mut self, attr: AttrMap, point: Point) {
        let id = StreamId(attr.digest());
        self.streams
            .entry(id)
            .or_insert_with(|| MetricStream {
                attr,
                points: Vec::new(),
            })
            .points
            .push(point);
    }

    /// Every request that contributed at least one point.
    pub fn contributing_requests(&self) -> impl Iterator<Item = ReqId> + '_ {
        self.streams
            .values()
            .flat_map(|s| s.points.iter().map(|p| p.base_point().req))
    }

    /// Writes the identity followed by the description, always present.
    pub(crate) fn write_listing(&self, m: &mut MapWriter<'_>) {
        self.identity.write_fields(m);
        m.pair("desc", &self.desc);
    }
}

impl ToJson for Metric {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            self.identity.write_fields(m);
            if !self.desc.is_empty() {
                m.pair("desc", &self.desc);
            }
            if !self.meta.is_empty() {
                m.pair("meta", &self.meta);
            }
            if self.conflict {
                m.pair("conflict", &true);
            }
            m.submap("streams", |s| {
                for (id, stream) in &self.streams {
                    s.pair(&id.to_hex(), stream);
                }
            });
        });
    }
}

/// Points of one metric sharing an attribute set, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MetricStream {
    pub attr: AttrMap,
    pub points: Vec<Point>,
}

impl ToJson for MetricStream {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("attr", &self.attr);
            if !self.points.is_empty() {
                m.array("pts", |a| {
                    for p in &self.points {
                        a.item(p);
                    }
                });
            }
        });
    }
}

/// Fields every data point carries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasePoint {
    pub time: u64,
    pub start: u64,
    pub flags: u32,
    /// Request that delivered the point.
    pub req: ReqId,
}

impl BasePoint {
    fn write_fields(&self, m: &mut MapWriter<'_>) {
        m.pair("time", &Value::Timestamp(self.time));
        if self.start != 0 {
            m.pair("time.start", &Value::Timestamp(self.start));
        }
        if self.flags != 0 {
            m.pair("flags", &Value::Flags(self.flags));
        }
        m.pair("req", &self.req);
    }
}

/// A sampled measurement attached to a point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exemplar {
    pub time: u64,
    /// Int or Double; `None` when the sender set neither.
    pub value: Option<Value>,
    pub attr: AttrMap,
    pub trace: TraceId,
    pub span: SpanId,
}

impl ToJson for Exemplar {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("time", &Value::Timestamp(self.time));
            if let Some(value) = &self.value {
                m.pair("value", value);
            }
            if !self.attr.is_empty() {
                m.pair("attr", &self.attr);
            }
            if self.trace.is_present() || self.span.is_present() {
                m.pair(
                    "span",
                    &TraceSpanId {
                        trace: self.trace,
                        span: self.span,
                    },
                );
            }
        });
    }
}

fn write_exemplars(m: &mut MapWriter<'_>, exemplars: &[Exemplar]) {
    if !exemplars.is_empty() {
        m.array("exemplars", |a| {
            for e in exemplars {
                a.item(e);
            }
        });
    }
}

fn write_counts(m: &mut MapWriter<'_>, key: &str, counts: &[u64]) {
    m.array(key, |a| {
        for &c in counts {
            a.item(&Value::Uint(c));
        }
    });
}

/// Gauge or sum data point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberPoint {
    pub base: BasePoint,
    /// Int or Double; `None` when the point carries no value.
    pub value: Option<Value>,
    pub exemplars: Vec<Exemplar>,
}

/// Fields shared by classical and exponential histogram points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoLike {
    pub base: BasePoint,
    pub count: u64,
    pub sum: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub exemplars: Vec<Exemplar>,
}

impl HistoLike {
    fn write_fields(&self, m: &mut MapWriter<'_>) {
        self.base.write_fields(m);
        m.pair("cnt", &Value::Uint(self.count));
        for (key, v) in [("sum", self.sum), ("min", self.min), ("max", self.max)] {
            if let Some(v) = v {
                m.pair(key, &v);
            }
        }
        write_exemplars(m, &self.exemplars);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramPoint {
    pub histo: HistoLike,
    pub buckets: Vec<u64>,
    pub bounds: Vec<f64>,
}

/// One side of an exponential histogram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpBuckets {
    pub offset: i32,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpHistogramPoint {
    pub histo: HistoLike,
    pub scale: i32,
    pub zero_count: u64,
    pub zero_threshold: f64,
    pub positive: ExpBuckets,
    pub negative: ExpBuckets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quantile {
    pub q: f64,
    pub v: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryPoint {
    pub base: BasePoint,
    pub count: u64,
    pub sum: f64,
    pub quantiles: Vec<Quantile>,
}

/// Any stored data point.
#[derive(Debug, Clone, PartialEq)]
pub enum Point {
    Number(NumberPoint),
    Histogram(HistogramPoint),
    ExponentialHistogram(ExpHistogramPoint),
    Summary(SummaryPoint),
}

impl Point {
    pub fn base_point(&self) -> &BasePoint {
        match self {
            Point::Number(p) => &p.base,
            Point::Histogram(p) => &p.histo.base,
            Point::ExponentialHistogram(p) => &p.histo.base,
            Point::Summary(p) => &p.base,
        }
    }

    pub fn base_point_mut(&mut self) -> &mut BasePoint {
        match self {
            Point::Number(p) => &mut p.base,
            Point::Histogram(p) => &mut p.histo.base,
            Point::ExponentialHistogram(p) => &mut p.histo.base,
            Point::Summary(p) => &mut p.base,
        }
    }
}

impl ToJson for Point {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| match self {
            Point::Number(p) => {
                p.base.write_fields(m);
                if let Some(v) = &p.value {
                    m.pair("val", v);
                }
                write_exemplars(m, &p.exemplars);
            },
            Point::Histogram(p) => {
                p.histo.write_fields(m);
                if !p.buckets.is_empty() {
                    write_counts(m, "buckets", &p.buckets);
                }
                if !p.bounds.is_empty() {
                    m.array("bounds", |a| {
                        for b in &p.bounds {
                            a.item(b);
                        }
                    });
                }
            },
            Point::ExponentialHistogram(p) => {
                p.histo.write_fields(m);
                m.pair("scale", &Value::Int(i64::from(p.scale)));
                m.pair("zeros", &Value::Uint(p.zero_count));
                if p.zero_threshold != 0.0 {
                    m.pair("zeros.thre", &p.zero_threshold);
                }
                m.pair("pos.off", &Value::Int(i64::from(p.positive.offset)));
                write_counts(m, "pos", &p.positive.counts);
                m.pair("neg.off", &Value::Int(i64::from(p.negative.offset)));
                write_counts(m, "neg", &p.negative.counts);
            },
            Point::Summary(p) => {
                p.base.write_fields(m);
                m.pair("cnt", &Value::Uint(p.count));
                m.pair("sum", &p.sum);
                m.array("quantiles", |a| {
                    for qv in &p.quantiles {
                        a.submap(|q| {
                            q.pair("q", &qv.q);
                            q.pair("v", &qv.v);
                        });
                    }
                });
            },
        });
    }
}
