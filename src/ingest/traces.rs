//! Trace ingestion.

use super::{convert_resource, convert_scope, names, Batch, ResourceGroup, ScopeGroup};
use crate::core::{Result, SpanId, TraceId};
use crate::storage::{Event, Link, RequestMeta, Span, SpanSummary, Store};
use crate::value::convert_attributes;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::trace::v1::Span as ProtoSpan;

/// A span ready to commit, keyed by its ids.
#[derive(Debug, Clone)]
pub struct PreparedSpan {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub span: Span,
}

/// Converts every span of `request`, failing on any malformed id.
pub fn prepare_traces(request: &ExportTraceServiceRequest) -> Result<Batch<PreparedSpan>> {
    let mut resources = Vec::with_capacity(request.resource_spans.len());
    for rs in &request.resource_spans {
        let mut scopes = Vec::with_capacity(rs.scope_spans.len());
        for ss in &rs.scope_spans {
            let items = ss.spans.iter().map(convert_span).collect::<Result<Vec<_>>>()?;
            scopes.push(ScopeGroup {
                scope: convert_scope(ss.scope.as_ref(), &ss.schema_url),
                items,
            });
        }
        resources.push(ResourceGroup {
            resource: convert_resource(rs.resource.as_ref(), &rs.schema_url),
            scopes,
        });
    }
    Ok(Batch { resources })
}

fn convert_span(sp: &ProtoSpan) -> Result<PreparedSpan> {
    let (status, status_msg) = sp
        .status
        .as_ref()
        .map(|s| (names::status_code(s.code), s.message.clone()))
        .unwrap_or_default();

    let events = sp
        .events
        .iter()
        .map(|e| Event {
            name: e.name.clone(),
            time: e.time_unix_nano,
            attr: convert_attributes(&e.attributes),
            dropped: e.dropped_attributes_count,
        })
        .collect();

    let links = sp
        .links
        .iter()
        .map(|l| {
            Ok(Link {
                trace: TraceId::from_bytes(&l.trace_id)?,
                span: SpanId::from_bytes(&l.span_id)?,
                attr: convert_attributes(&l.attributes),
                dropped: l.dropped_attributes_count,
                state: l.trace_state.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PreparedSpan {
        trace_id: TraceId::from_bytes(&sp.trace_id)?,
        span_id: SpanId::from_bytes(&sp.span_id)?,
        span: Span {
            summary: SpanSummary {
                parent: SpanId::from_bytes(&sp.parent_span_id)?,
                name: sp.name.clone(),
                status,
                start: sp.start_time_unix_nano,
                end: sp.end_time_unix_nano,
            },
            kind: names::span_kind(sp.kind),
            status_msg,
            attr: convert_attributes(&sp.attributes),
            dropped: sp.dropped_attributes_count,
            state: sp.trace_state.clone(),
            flags: sp.flags,
            events,
            events_dropped: sp.dropped_events_count,
            links,
            links_dropped: sp.dropped_links_count,
            ..Default::default()
        },
    })
}

impl Store {
    /// Ingest a trace export request received with `req`.
    ///
    /// Nothing is stored when the request holds a malformed id. Duplicate
    /// spans are dropped with a warning and do not fail the request.
    pub fn ingest_traces(
        &self,
        request: &ExportTraceServiceRequest,
        req: RequestMeta,
    ) -> Result<()> {
        let batch = prepare_traces(request)?;
        tracing::debug!("Committing {} spans", batch.len());
        self.commit_batch(batch, req, |store, origin, prepared| {
            let mut span = prepared.span;
            span.req = origin.req;
            span.res = origin.res;
            span.scope = origin.scope;
            store.commit_span(prepared.trace_id, prepared.span_id, span);
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Transport;
    use opentelemetry_proto::tonic::trace::v1::{span, ResourceSpans, ScopeSpans, Status};

    fn request(spans: Vec<ProtoSpan>) -> ExportTraceServiceRequest {
        ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }

    fn proto_span(span_id: u8) -> ProtoSpan {
        ProtoSpan {
            trace_id: vec![1; 16],
            span_id: vec![span_id; 8],
            name: "op".into(),
            kind: 3,
            start_time_unix_nano: 10,
            end_time_unix_nano: 20,
            flags: 0x100,
            ..Default::default()
        }
    }

    #[test]
    fn converts_span_fields() {
        let mut sp = proto_span(0xa);
        sp.status = Some(Status {
            message: "failed".into(),
            code: 2,
        });
        sp.events.push(span::Event {
            name: "retry".into(),
            time_unix_nano: 15,
            ..Default::default()
        });
        sp.links.push(span::Link {
            trace_id: vec![2; 16],
            span_id: vec![3; 8],
            ..Default::default()
        });

        let batch = prepare_traces(&request(vec![sp])).unwrap();
        let prepared = &batch.resources[0].scopes[0].items[0];
        assert_eq!(prepared.trace_id, TraceId([1; 16]));
        assert_eq!(prepared.span.summary.status, "Error");
        assert_eq!(prepared.span.status_msg, "failed");
        assert_eq!(prepared.span.kind, "Client");
        assert_eq!(prepared.span.events[0].time, 15);
        assert_eq!(prepared.span.links[0].span, SpanId([3; 8]));
        assert!(!prepared.span.summary.parent.is_present());
    }

    #[test]
    fn bad_id_rejects_whole_request() {
        let mut bad = proto_span(0xb);
        bad.trace_id = vec![1; 3];
        let store = Store::new(false);
        let result = store.ingest_traces(
            &request(vec![proto_span(0xa), bad]),
            RequestMeta::bare(Transport::Grpc, ""),
        );
        assert!(result.is_err());
        let tables = store.lock();
        assert!(tables.traces.is_empty());
        assert!(tables.requests.is_empty());
    }

    #[test]
    fn bad_link_id_rejects_request() {
        let mut sp = proto_span(0xa);
        sp.links.push(span::Link {
            span_id: vec![1; 4],
            ..Default::default()
        });
        assert!(prepare_traces(&request(vec![sp])).is_err());
    }

    #[test]
    fn ingested_span_carries_origin() {
        let store = Store::new(false);
        store
            .ingest_traces(&request(vec![proto_span(0xa)]), RequestMeta::bare(Transport::Grpc, "a"))
            .unwrap();
        let tables = store.lock();
        let span = &tables.traces[&TraceId([1; 16])].spans[&SpanId([0xa; 8])];
        assert!(tables.requests.contains_key(&span.req));
        assert!(tables.resources.contains_key(&span.res));
        assert!(tables.scopes.contains_key(&span.scope));
    }
}
