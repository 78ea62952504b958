//! Metric ingestion.

use super::{convert_resource, convert_scope, names, Batch, ResourceGroup, ScopeGroup};
use crate::core::{Result, SpanId, TraceId};
use crate::storage::{
    BasePoint, ExpBuckets, ExpHistogramPoint, Exemplar, HistoLike, HistogramPoint, MetricIdentity,
    NumberPoint, Point, Quantile, RequestMeta, Store, SummaryPoint,
};
use crate::value::{convert_attributes, AttrMap, Value};
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::KeyValue;
use opentelemetry_proto::tonic::metrics::v1::{
    exemplar, exponential_histogram_data_point::Buckets, metric::Data, number_data_point,
    Exemplar as ProtoExemplar, ExponentialHistogramDataPoint, HistogramDataPoint,
    Metric as ProtoMetric, NumberDataPoint, SummaryDataPoint,
};

/// A metric header and its points, ready to commit.
///
/// The identity's resource and scope ids and every point's request id are
/// filled in at commit time.
#[derive(Debug, Clone)]
pub struct PreparedMetric {
    pub identity: MetricIdentity,
    pub desc: String,
    pub meta: AttrMap,
    /// Point attributes and point, in payload order.
    pub points: Vec<(AttrMap, Point)>,
}

/// Converts every metric of `request`, failing on any malformed id.
pub fn prepare_metrics(request: &ExportMetricsServiceRequest) -> Result<Batch<PreparedMetric>> {
    let mut resources = Vec::with_capacity(request.resource_metrics.len());
    for rm in &request.resource_metrics {
        let mut scopes = Vec::with_capacity(rm.scope_metrics.len());
        for sm in &rm.scope_metrics {
            let items = sm.metrics.iter().map(convert_metric).collect::<Result<Vec<_>>>()?;
            scopes.push(ScopeGroup {
                scope: convert_scope(sm.scope.as_ref(), &sm.schema_url),
                items,
            });
        }
        resources.push(ResourceGroup {
            resource: convert_resource(rm.resource.as_ref(), &rm.schema_url),
            scopes,
        });
    }
    Ok(Batch { resources })
}

fn convert_metric(m: &ProtoMetric) -> Result<PreparedMetric> {
    let mut identity = MetricIdentity {
        name: m.name.clone(),
        unit: m.unit.clone(),
        ..Default::default()
    };

    let points = match &m.data {
        Some(Data::Gauge(g)) => {
            identity.kind = "Gauge".into();
            convert_points(&g.data_points, number_point)?
        },
        Some(Data::Sum(s)) => {
            identity.kind = "Sum".into();
            identity.tempo = names::temporality(s.aggregation_temporality);
            identity.mono = s.is_monotonic;
            convert_points(&s.data_points, number_point)?
        },
        Some(Data::Histogram(h)) => {
            identity.kind = "Histogram".into();
            identity.tempo = names::temporality(h.aggregation_temporality);
            convert_points(&h.data_points, histogram_point)?
        },
        Some(Data::ExponentialHistogram(eh)) => {
            identity.kind = "ExponentialHistogram".into();
            identity.tempo = names::temporality(eh.aggregation_temporality);
            convert_points(&eh.data_points, exp_histogram_point)?
        },
        Some(Data::Summary(s)) => {
            identity.kind = "Summary".into();
            convert_points(&s.data_points, summary_point)?
        },
        None => {
            tracing::warn!("metric '{}' carries no data", m.name);
            identity.kind = "Empty".into();
            Vec::new()
        },
    };

    Ok(PreparedMetric {
        identity,
        desc: m.description.clone(),
        meta: convert_attributes(&m.metadata),
        points,
    })
}

/// Fields every OTLP data point type shares.
trait DataPoint {
    fn attributes(&self) -> &[KeyValue];
    fn base(&self) -> BasePoint;
}

macro_rules! impl_data_point {
    ($($ty:ty),*) => {$(
        impl DataPoint for $ty {
            fn attributes(&self) -> &[KeyValue] {
                &self.attributes
            }

            fn base(&self) -> BasePoint {
                BasePoint {
                    time: self.time_unix_nano,
                    start: self.start_time_unix_nano,
                    flags: self.flags,
                    ..Default::default()
                }
            }
        }
    )*};
}

impl_data_point!(
    NumberDataPoint,
    HistogramDataPoint,
    ExponentialHistogramDataPoint,
    SummaryDataPoint
);

fn convert_points<P: DataPoint>(
    points: &[P],
    convert: impl Fn(&P, BasePoint) -> Result<Point>,
) -> Result<Vec<(AttrMap, Point)>> {
    points
        .iter()
        .map(|p| Ok((convert_attributes(p.attributes()), convert(p, p.base())?)))
        .collect()
}

fn convert_exemplars(exemplars: &[ProtoExemplar]) -> Result<Vec<Exemplar>> {
    exemplars
        .iter()
        .map(|e| {
            Ok(Exemplar {
                time: e.time_unix_nano,
                value: e.value.as_ref().map(|v| match v {
                    exemplar::Value::AsInt(i) => Value::Int(*i),
                    exemplar::Value::AsDouble(d) => Value::Double(*d),
                }),
                attr: convert_attributes(&e.filtered_attributes),
                trace: TraceId::from_bytes(&e.trace_id)?,
                span: SpanId::from_bytes(&e.span_id)?,
            })
        })
        .collect()
}

fn number_point(p: &NumberDataPoint, base: BasePoint) -> Result<Point> {
    Ok(Point::Number(NumberPoint {
        base,
        value: p.value.as_ref().map(|v| match v {
            number_data_point::Value::AsInt(i) => Value::Int(*i),
            number_data_point::Value::AsDouble(d) => Value::Double(*d),
        }),
        exemplars: convert_exemplars(&p.exemplars)?,
    }))
}

fn histogram_point(p: &HistogramDataPoint, base: BasePoint) -> Result<Point> {
    Ok(Point::Histogram(HistogramPoint {
        histo: HistoLike {
            base,
            count: p.count,
            sum: p.sum,
            min: p.min,
            max: p.max,
            exemplars: convert_exemplars(&p.exemplars)?,
        },
        buckets: p.bucket_counts.clone(),
        bounds: p.explicit_bounds.clone(),
    }))
}

fn exp_buckets(buckets: Option<&Buckets>) -> ExpBuckets {
    buckets
        .map(|b| ExpBuckets {
            offset: b.offset,
            counts: b.bucket_counts.clone(),
        })
        .unwrap_or_default()
}

fn exp_histogram_point(p: &ExponentialHistogramDataPoint, base: BasePoint) -> Result<Point> {
    Ok(Point::ExponentialHistogram(ExpHistogramPoint {
        histo: HistoLike {
            base,
            count: p.count,
            sum: p.sum,
            min: p.min,
            max: p.max,
            exemplars: convert_exemplars(&p.exemplars)?,
        },
        scale: p.scale,
        zero_count: p.zero_count,
        zero_threshold: p.zero_threshold,
        positive: exp_buckets(p.positive.as_ref()),
        negative: exp_buckets(p.negative.as_ref()),
    }))
}

fn summary_point(p: &SummaryDataPoint, base: BasePoint) -> Result<Point> {
    Ok(Point::Summary(SummaryPoint {
        base,
        count: p.count,
        sum: p.sum,
        quantiles: p
            .quantile_values
            .iter()
            .map(|qv| Quantile {
                q: qv.quantile,
                v: qv.value,
            })
            .collect(),
    }))
}

impl Store {
    /// Ingest a metric export request received with `req`.
    ///
    /// Points are appended to their streams in payload order. Nothing is
    /// stored when the request holds a malformed exemplar id.
    pub fn ingest_metrics(
        &self,
        request: &ExportMetricsServiceRequest,
        req: RequestMeta,
    ) -> Result<()> {
        let batch = prepare_metrics(request)?;
        tracing::debug!("Committing {} metrics", batch.len());
        self.commit_batch(batch, req, |store, origin, prepared| {
            let PreparedMetric {
                mut identity,
                desc,
                meta,
                points,
            } = prepared;
            identity.res = origin.res;
            identity.scope = origin.scope;
            let id = store.commit_metric(&identity, &desc, &meta);
            for (attr, mut point) in points {
                point.base_point_mut().req = origin.req;
                store.commit_point(&identity, &desc, &meta, attr, point);
            }
            store.dump_metric(id);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StreamId;
    use crate::storage::Transport;
    use crate::value::Hashable;
    use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue};
    use opentelemetry_proto::tonic::metrics::v1::{
        summary_data_point::ValueAtQuantile, ExponentialHistogram, Gauge, ResourceMetrics,
        ScopeMetrics, Sum, Summary,
    };

    fn request(metrics: Vec<ProtoMetric>) -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                scope_metrics: vec![ScopeMetrics {
                    metrics,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn host(name: &str) -> Vec<KeyValue> {
        vec![KeyValue {
            key: "host".into(),
            value: Some(AnyValue {
                value: Some(any_value::Value::StringValue(name.into())),
            }),
        }]
    }

    fn gauge(name: &str, desc: &str, values: &[(&str, i64)]) -> ProtoMetric {
        ProtoMetric {
            name: name.into(),
            description: desc.into(),
            data: Some(Data::Gauge(Gauge {
                data_points: values
                    .iter()
                    .map(|(h, v)| NumberDataPoint {
                        attributes: host(h),
                        time_unix_nano: 1,
                        value: Some(number_data_point::Value::AsInt(*v)),
                        ..Default::default()
                    })
                    .collect(),
            })),
            ..Default::default()
        }
    }

    #[test]
    fn sum_identity() {
        let metric = ProtoMetric {
            name: "requests".into(),
            unit: "1".into(),
            data: Some(Data::Sum(Sum {
                aggregation_temporality: 1,
                is_monotonic: true,
                ..Default::default()
            })),
            ..Default::default()
        };
        let prepared = convert_metric(&metric).unwrap();
        assert_eq!(prepared.identity.kind, "Sum");
        assert_eq!(prepared.identity.tempo, "Delta");
        assert!(prepared.identity.mono);
    }

    #[test]
    fn metric_without_data_is_empty() {
        let prepared = convert_metric(&ProtoMetric {
            name: "nothing".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(prepared.identity.kind, "Empty");
        assert!(prepared.points.is_empty());
    }

    #[test]
    fn streams_keep_payload_order() {
        let store = Store::new(false);
        let m = gauge("temp", "", &[("a", 1), ("b", 2), ("a", 3)]);
        store.ingest_metrics(&request(vec![m]), RequestMeta::bare(Transport::Grpc, "")).unwrap();

        let tables = store.lock();
        assert_eq!(tables.metrics.len(), 1);
        let metric = tables.metrics.values().next().unwrap();
        let stream_id = StreamId(convert_attributes(&host("a")).digest());
        let values: Vec<Option<Value>> = metric.streams[&stream_id]
            .points
            .iter()
            .map(|p| match p {
                Point::Number(n) => n.value.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(values, [Some(Value::Int(1)), Some(Value::Int(3))]);
        let req = *tables.requests.keys().next().unwrap();
        assert!(metric.contributing_requests().all(|r| r == req));
    }

    #[test]
    fn conflicting_descriptions_merge() {
        let store = Store::new(false);
        let req = || RequestMeta::bare(Transport::Grpc, "");
        store
            .ingest_metrics(&request(vec![gauge("cpu", "short", &[("a", 1)])]), req())
            .unwrap();
        store
            .ingest_metrics(&request(vec![gauge("cpu", "longer description", &[("a", 2)])]), req())
            .unwrap();
        let tables = store.lock();
        assert_eq!(tables.metrics.len(), 1);
        let metric = tables.metrics.values().next().unwrap();
        assert_eq!(metric.desc, "longer description");
        assert!(metric.conflict);
        assert_eq!(metric.streams.values().next().unwrap().points.len(), 2);
    }

    #[test]
    fn exponential_histogram_fields() {
        let metric = ProtoMetric {
            name: "latency".into(),
            data: Some(Data::ExponentialHistogram(ExponentialHistogram {
                aggregation_temporality: 2,
                data_points: vec![ExponentialHistogramDataPoint {
                    count: 6,
                    scale: -2,
                    zero_count: 3,
                    zero_threshold: 1e-9,
                    positive: Some(Buckets {
                        offset: 5,
                        bucket_counts: vec![1, 2, 3],
                    }),
                    negative: Some(Buckets {
                        offset: -4,
                        bucket_counts: vec![],
                    }),
                    ..Default::default()
                }],
            })),
            ..Default::default()
        };
        let prepared = convert_metric(&metric).unwrap();
        let Point::ExponentialHistogram(p) = &prepared.points[0].1 else {
            panic!("expected an exponential histogram point");
        };
        assert_eq!(p.scale, -2);
        assert_eq!(p.zero_count, 3);
        assert_eq!(p.positive.counts, vec![1, 2, 3]);
        assert_eq!(p.negative.offset, -4);
    }

    #[test]
    fn summary_quantiles() {
        let metric = ProtoMetric {
            name: "rpc".into(),
            data: Some(Data::Summary(Summary {
                data_points: vec![SummaryDataPoint {
                    count: 4,
                    sum: 10.0,
                    quantile_values: vec![ValueAtQuantile {
                        quantile: 0.99,
                        value: 9.5,
                    }],
                    ..Default::default()
                }],
            })),
            ..Default::default()
        };
        let prepared = convert_metric(&metric).unwrap();
        let Point::Summary(p) = &prepared.points[0].1 else {
            panic!("expected a summary point");
        };
        assert_eq!(p.quantiles, vec![Quantile { q: 0.99, v: 9.5 }]);
    }

    #[test]
    fn malformed_exemplar_rejects_request() {
        let mut m = gauge("g", "", &[("a", 1)]);
        if let Some(Data::Gauge(g)) = &mut m.data {
            g.data_points[0].exemplars.push(ProtoExemplar {
                trace_id: vec![1; 15],
                ..Default::default()
            });
        }
        let store = Store::new(false);
        assert!(store
            .ingest_metrics(&request(vec![m]), RequestMeta::bare(Transport::Grpc, ""))
            .is_err());
        assert!(store.lock().metrics.is_empty());
    }
}
