//! Trace and span records.

use super::interned::write_attr;
use crate::core::{ReqId, ResId, ScopeId, SpanId, TraceId, TraceSpanId};
use crate::value::{json, AttrMap, MapWriter, ToJson, Value};
use std::collections::BTreeMap;

/// Span flags value meaning "no W3C trace flags, parent not remote".
const DEFAULT_SPAN_FLAGS: u32 = 0x100;

/// All spans received for one trace id.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub spans: BTreeMap<SpanId, Span>,
}

impl ToJson for Trace {
    /// Renders every span as its summary, keyed by span id.
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            for (id, span) in &self.spans {
                m.submap(&id.to_hex(), |s| span.summary.write_fields(s));
            }
        });
    }
}

/// The fields of a span shown in trace listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanSummary {
    pub parent: SpanId,
    pub name: String,
    /// Status code name, empty when unset.
    pub status: String,
    pub start: u64,
    pub end: u64,
}

impl SpanSummary {
    fn write_fields(&self, m: &mut MapWriter<'_>) {
        if self.parent.is_present() {
            m.pair("parent", &self.parent);
        }
        m.pair("name", &self.name);
        if !self.status.is_empty() {
            m.pair("status", &self.status);
        }
        m.pair("start", &Value::Timestamp(self.start));
        m.pair("end", &Value::Timestamp(self.end));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Span {
    pub req: ReqId,
    pub res: ResId,
    pub scope: ScopeId,
    pub summary: SpanSummary,
    pub kind: String,
    pub status_msg: String,
    pub attr: AttrMap,
    pub dropped: u32,
    pub state: String,
    pub flags: u32,
    pub events: Vec<Event>,
    pub events_dropped: u32,
    pub links: Vec<Link>,
    pub links_dropped: u32,
}

impl Span {
    pub fn origin(&self) -> super::Origin {
        super::Origin {
            req: self.req,
            res: self.res,
            scope: self.scope,
        }
    }
}

impl ToJson for Span {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("req", &self.req);
            m.pair("res", &self.res);
            m.pair("scope", &self.scope);
            self.summary.write_fields(m);
            m.pair("kind", &self.kind);
            if !self.status_msg.is_empty() {
                m.pair("status.msg", &self.status_msg);
            }
            write_attr(m, &self.attr, self.dropped);
            if !self.state.is_empty() {
                m.pair("state", &self.state);
            }
            if self.flags != DEFAULT_SPAN_FLAGS {
                m.pair("flags", &Value::Flags(self.flags));
            }
            if !self.events.is_empty() {
                m.array("events", |a| {
                    for e in &self.events {
                        a.item(e);
                    }
                });
            }
            if self.events_dropped != 0 {
                m.pair("events.dropped", &Value::Int(i64::from(self.events_dropped)));
            }
            if !self.links.is_empty() {
                m.array("links", |a| {
                    for l in &self.links {
                        a.item(l);
                    }
                });
            }
            if self.links_dropped != 0 {
                m.pair("links.dropped", &Value::Int(i64::from(self.links_dropped)));
            }
        });
    }
}

/// A timestamped annotation on a span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub name: String,
    pub time: u64,
    pub attr: AttrMap,
    pub dropped: u32,
}

impl ToJson for Event {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("name", &self.name);
            if self.time != 0 {
                m.pair("time", &Value::Timestamp(self.time));
            }
            write_attr(m, &self.attr, self.dropped);
        });
    }
}

/// A reference from a span to another span.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    pub trace: TraceId,
    pub span: SpanId,
    pub attr: AttrMap,
    pub dropped: u32,
    pub state: String,
}

impl ToJson for Link {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair(
                "span",
                &TraceSpanId {
                    trace: self.trace,
                    span: self.span,
                },
            );
            write_attr(m, &self.attr, self.dropped);
            if !self.state.is_empty() {
                m.pair("state", &self.state);
            }
        });
    }
}
