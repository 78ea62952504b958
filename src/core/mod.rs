//! Core configuration, errors and identifier types.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{Result, ScopeError};
pub use types::{MetricId, ReqId, ResId, ScopeId, SpanId, StreamId, TraceId, TraceSpanId};
