//! Conversion from decoded OTLP values into the canonical model.

use super::{AttrMap, Value};
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};

/// Converts a decoded OTLP value.
///
/// Returns `None` for an empty value (no variant set). Empty values have
/// no canonical form; callers decide whether that means "absent" (a log
/// body) or "skip" (a map or array member).
pub fn convert_value(v: &AnyValue) -> Option<Value> {
    let value = v.value.as_ref()?;
    Some(match value {
        any_value::Value::BoolValue(b) => Value::Bool(*b),
        any_value::Value::IntValue(i) => Value::Int(*i),
        any_value::Value::DoubleValue(d) => Value::Double(*d),
        any_value::Value::StringValue(s) => Value::Str(s.clone()),
        any_value::Value::BytesValue(b) => Value::Bytes(b.clone()),
        any_value::Value::ArrayValue(arr) => {
            Value::Array(arr.values.iter().filter_map(convert_value).collect())
        },
        any_value::Value::KvlistValue(kvs) => Value::Map(convert_attributes(&kvs.values)),
    })
}

/// Converts an OTLP attribute list into a canonical map.
pub fn convert_attributes(attrs: &[KeyValue]) -> AttrMap {
    attrs
        .iter()
        .filter_map(|kv| {
            let value = kv.value.as_ref().and_then(convert_value);
            if value.is_none() {
                tracing::debug!("Skipping attribute '{}' with empty value", kv.key);
            }
            value.map(|v| (kv.key.clone(), v))
        })
        .collect()
}
