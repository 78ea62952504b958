use crate::core::error::{Result, ScopeError};
use crate::value::{json, Digest, Hashable, ToJson};
use std::fmt;
use std::str::FromStr;

/// 16-byte trace identifier; all zeroes means "absent".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(pub [u8; 16]);

/// 8-byte span identifier; all zeroes means "absent".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(pub [u8; 8]);

/// Copies a decoded id field into a fixed array.
///
/// An empty field is the zero id; any other length than `N` means the
/// payload is malformed.
fn id_bytes<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    if bytes.is_empty() {
        return Ok([0; N]);
    }
    bytes.try_into().map_err(|_| {
        ScopeError::payload(format!("{} must be {} bytes, got {}", what, N, bytes.len()))
    })
}

fn parse_hex_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() != N * 2 {
        return None;
    }
    let mut out = [0; N];
    hex::decode_to_slice(s, &mut out).ok()?;
    Some(out)
}

impl TraceId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        id_bytes(bytes, "trace id").map(TraceId)
    }

    /// Returns true when the id is set.
    pub fn is_present(&self) -> bool {
        self.0 != [0; 16]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl SpanId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        id_bytes(bytes, "span id").map(SpanId)
    }

    /// Returns true when the id is set.
    pub fn is_present(&self) -> bool {
        self.0 != [0; 8]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for TraceId {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_array(s)
            .map(TraceId)
            .ok_or_else(|| ScopeError::bad_request(format!("invalid trace id '{s}'")))
    }
}

impl FromStr for SpanId {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex_array(s)
            .map(SpanId)
            .ok_or_else(|| ScopeError::bad_request(format!("invalid span id '{s}'")))
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl ToJson for SpanId {
    fn write_json(&self, out: &mut String) {
        json::write_envelope(out, "_span", format_args!("{self}"));
    }
}

/// A (trace, span) reference, rendered as `{"_span":…,"_trace":…}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TraceSpanId {
    pub trace: TraceId,
    pub span: SpanId,
}

impl ToJson for TraceSpanId {
    fn write_json(&self, out: &mut String) {
        use std::fmt::Write as _;
        let _ = write!(out, "{{\"_span\":\"{}\",\"_trace\":\"{}\"}}", self.span, self.trace);
    }
}

macro_rules! digest_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            /// 16 lowercase hex digits, big-endian.
            pub fn to_hex(&self) -> String {
                format!("{:016x}", self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:016x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ScopeError;

            fn from_str(s: &str) -> Result<Self> {
                parse_hex_array::<8>(s)
                    .map(|b| $name(u64::from_be_bytes(b)))
                    .ok_or_else(|| ScopeError::bad_request(format!(concat!("invalid ", $what, " '{}'"), s)))
            }
        }

        impl Hashable for $name {
            fn hash_into(&self, d: &mut Digest) {
                d.write_u64(self.0);
            }
        }
    };
}

digest_id!(
    /// Digest of an interned request metadata record.
    ReqId,
    "request id"
);
digest_id!(
    /// Digest of an interned resource record.
    ResId,
    "resource id"
);
digest_id!(
    /// Digest of an interned instrumentation scope record.
    ScopeId,
    "scope id"
);
digest_id!(
    /// Digest of a metric identity tuple.
    MetricId,
    "metric id"
);
digest_id!(
    /// Digest of a point attribute map within one metric.
    StreamId,
    "stream id"
);

impl ToJson for ReqId {
    fn write_json(&self, out: &mut String) {
        json::write_envelope(out, "_req", format_args!("{self}"));
    }
}

impl ToJson for ResId {
    fn write_json(&self, out: &mut String) {
        json::write_envelope(out, "_res", format_args!("{self}"));
    }
}

impl ToJson for ScopeId {
    fn write_json(&self, out: &mut String) {
        json::write_envelope(out, "_scope", format_args!("{self}"));
    }
}
