//! Records shared by many signals and stored once per digest.

use crate::value::{json, AttrMap, Digest, Hashable, MapWriter, ToJson, Value};
use std::collections::BTreeMap;

/// Transport an ingestion request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Grpc,
    Http,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Grpc => "grpc",
            Transport::Http => "http",
        }
    }
}

/// Metadata of one ingestion request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    pub transport: Transport,
    /// Peer socket address, empty when unknown.
    pub peer: String,
    /// Lower-cased header names to their values in arrival order.
    pub headers: Option<BTreeMap<String, Vec<String>>>,
}

impl RequestMeta {
    /// Builds request metadata from raw header pairs.
    ///
    /// Header names are lower-cased and `content-length` is dropped, since
    /// it differs between otherwise identical requests.
    pub fn new<I, K, V>(transport: Transport, peer: impl Into<String>, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in headers {
            let key = k.as_ref().to_ascii_lowercase();
            if key == "content-length" {
                continue;
            }
            map.entry(key).or_default().push(v.into());
        }
        Self {
            transport,
            peer: peer.into(),
            headers: Some(map),
        }
    }

    /// Request metadata with no header information at all.
    pub fn bare(transport: Transport, peer: impl Into<String>) -> Self {
        Self {
            transport,
            peer: peer.into(),
            headers: None,
        }
    }
}

impl Hashable for RequestMeta {
    fn hash_into(&self, d: &mut Digest) {
        d.write_str(self.transport.as_str());
        d.write_str(&self.peer);
        for (k, vs) in self.headers.iter().flatten() {
            d.write_str(k);
            for v in vs {
                d.write_str(v);
            }
        }
    }
}

impl ToJson for RequestMeta {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("transport", self.transport.as_str());
            if !self.peer.is_empty() {
                m.pair("peer", &self.peer);
            }
            if let Some(headers) = &self.headers {
                m.submap("headers", |h| {
                    for (k, vs) in headers {
                        match vs.as_slice() {
                            [single] => h.pair(k, single),
                            many => h.array(k, |a| {
                                for v in many {
                                    a.item(v);
                                }
                            }),
                        }
                    }
                });
            }
        });
    }
}

/// Writes `attr` and `attr.dropped`, each only when non-empty.
pub(crate) fn write_attr(m: &mut MapWriter<'_>, attr: &AttrMap, dropped: u32) {
    if !attr.is_empty() {
        m.pair("attr", attr);
    }
    if dropped != 0 {
        m.pair("attr.dropped", &Value::Int(i64::from(dropped)));
    }
}

/// The entity that produced telemetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub attr: AttrMap,
    pub dropped: u32,
    pub schema: String,
}

impl Hashable for Resource {
    fn hash_into(&self, d: &mut Digest) {
        self.attr.hash_into(d);
        d.write_u32(self.dropped);
        d.write_str(&self.schema);
    }
}

impl ToJson for Resource {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            write_attr(m, &self.attr, self.dropped);
            if !self.schema.is_empty() {
                m.pair("schema", &self.schema);
            }
        });
    }
}

/// Instrumentation scope (library) that emitted telemetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub name: String,
    pub version: String,
    pub attr: AttrMap,
    pub dropped: u32,
    pub schema: String,
}

impl Hashable for Scope {
    fn hash_into(&self, d: &mut Digest) {
        d.write_str(&self.name);
        d.write_str(&self.version);
        self.attr.hash_into(d);
        d.write_u32(self.dropped);
        d.write_str(&self.schema);
    }
}

impl ToJson for Scope {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            if !self.name.is_empty() {
                m.pair("name", &self.name);
            }
            if !self.version.is_empty() {
                m.pair("version", &self.version);
            }
            write_attr(m, &self.attr, self.dropped);
            if !self.schema.is_empty() {
                m.pair("schema", &self.schema);
            }
        });
    }
}
