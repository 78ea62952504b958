//! Display names for OTLP enum values.
//!
//! Numbers outside the known range render as their decimal value.

use opentelemetry_proto::tonic::metrics::v1::AggregationTemporality;
use opentelemetry_proto::tonic::trace::v1::{span::SpanKind, status::StatusCode};

const SEVERITY_NAMES: [&str; 25] = [
    "", "Trace", "Trace2", "Trace3", "Trace4", "Debug", "Debug2", "Debug3", "Debug4", "Info",
    "Info2", "Info3", "Info4", "Warn", "Warn2", "Warn3", "Warn4", "Error", "Error2", "Error3",
    "Error4", "Fatal", "Fatal2", "Fatal3", "Fatal4",
];

/// Span status code name; empty for `Unset`.
pub fn status_code(code: i32) -> String {
    match StatusCode::try_from(code) {
        Ok(StatusCode::Unset) => String::new(),
        Ok(StatusCode::Ok) => "Ok".into(),
        Ok(StatusCode::Error) => "Error".into(),
        Err(_) => code.to_string(),
    }
}

pub fn span_kind(kind: i32) -> String {
    match SpanKind::try_from(kind) {
        Ok(SpanKind::Unspecified) => "Unspecified".into(),
        Ok(SpanKind::Internal) => "Internal".into(),
        Ok(SpanKind::Server) => "Server".into(),
        Ok(SpanKind::Client) => "Client".into(),
        Ok(SpanKind::Producer) => "Producer".into(),
        Ok(SpanKind::Consumer) => "Consumer".into(),
        Err(_) => kind.to_string(),
    }
}

/// Log severity name; empty for `Unspecified`.
pub fn severity(number: i32) -> String {
    usize::try_from(number)
        .ok()
        .and_then(|i| SEVERITY_NAMES.get(i))
        .map_or_else(|| number.to_string(), |name| (*name).to_string())
}

pub fn temporality(value: i32) -> String {
    match AggregationTemporality::try_from(value) {
        Ok(AggregationTemporality::Unspecified) => "Unspecified".into(),
        Ok(AggregationTemporality::Delta) => "Delta".into(),
        Ok(AggregationTemporality::Cumulative) => "Cumulative".into(),
        Err(_) => value.to_string(),
    }
}
