//! Canonical value model.
//!
//! [`Value`] is the closed set of attribute values the store keeps. Every
//! variant knows how to feed itself into a [`Digest`] and how to render
//! itself as canonical JSON. [`AttrMap`] keeps its pairs sorted by key so
//! that two maps built in different insertion orders hash and render
//! identically.

pub mod convert;
pub mod digest;
pub mod json;

pub use convert::{convert_attributes, convert_value};
pub use digest::{Digest, Hashable};
pub use json::{ArrayWriter, MapWriter, ToJson};

/// A canonical attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    /// Nanoseconds since the Unix epoch.
    Timestamp(u64),
    Flags(u32),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(AttrMap),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<AttrMap> for Value {
    fn from(m: AttrMap) -> Self {
        Value::Map(m)
    }
}

impl Hashable for Value {
    fn hash_into(&self, d: &mut Digest) {
        match self {
            Value::Bool(v) => d.write_bool(*v),
            Value::Int(v) => d.write_i64(*v),
            Value::Uint(v) | Value::Timestamp(v) => d.write_u64(*v),
            Value::Flags(v) => d.write_u32(*v),
            Value::Double(v) => d.write_f64(*v),
            Value::Str(s) => d.write_str(s),
            Value::Bytes(b) => d.write(b),
            Value::Array(items) => {
                for item in items {
                    item.hash_into(d);
                }
            },
            Value::Map(m) => m.hash_into(d),
        }
    }
}

impl ToJson for Value {
    fn write_json(&self, out: &mut String) {
        match self {
            Value::Bool(v) => v.write_json(out),
            Value::Int(v) => json::write_envelope(out, "_int", format_args!("{v}")),
            Value::Uint(v) => json::write_envelope(out, "_int", format_args!("{v}")),
            Value::Timestamp(v) => json::write_envelope(out, "_ts", format_args!("{v}")),
            Value::Flags(v) => json::write_envelope(out, "_flg", format_args!("{v:x}")),
            Value::Double(v) => json::write_f64(out, *v),
            Value::Str(s) => json::write_str(out, s),
            Value::Bytes(b) => json::write_envelope(out, "_byt", format_args!("{}", hex::encode(b))),
            Value::Array(items) => json::array(out, |a| {
                for item in items {
                    a.item(item);
                }
            }),
            Value::Map(m) => m.write_json(out),
        }
    }
}

/// A map with unique string keys kept in byte-wise key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrMap {
    pairs: Vec<(String, Value)>,
}

impl AttrMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a canonical map from pairs in any order.
    ///
    /// When a key repeats, its first occurrence wins.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut pairs: Vec<(String, Value)> =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        // stable, so the first duplicate stays in front
        pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
        pairs.dedup_by(|later, earlier| later.0 == earlier.0);
        Self { pairs }
    }

    /// Inserts or replaces `key`, keeping the pairs sorted.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self
            .pairs
            .binary_search_by(|(k, _)| k.as_bytes().cmp(key.as_bytes()))
        {
            Ok(i) => self.pairs[i].1 = value,
            Err(i) => self.pairs.insert(i, (key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pairs
            .binary_search_by(|(k, _)| k.as_bytes().cmp(key.as_bytes()))
            .ok()
            .map(|i| &self.pairs[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for AttrMap {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

impl Hashable for AttrMap {
    fn hash_into(&self, d: &mut Digest) {
        for (k, v) in &self.pairs {
            d.write_str(k);
            v.hash_into(d);
        }
    }
}

impl ToJson for AttrMap {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            for (k, v) in &self.pairs {
                m.pair(k, v);
            }
        });
    }
}
