//! otelscope - an in-memory OTLP receiver for inspecting telemetry.
//!
//! otelscope accepts traces, logs and metrics over OTLP/gRPC and
//! OTLP/HTTP, keeps everything it receives in memory, and serves it back
//! as canonical JSON to a small web front-end.
//!
//! # Architecture
//!
//! - `value`: canonical attribute values, FNV-1a digests and JSON emission
//! - `storage`: the [`storage::Store`] and every record it keeps
//! - `ingest`: conversion of decoded export requests into store records
//! - `receiver`: gRPC and HTTP ingest endpoints
//! - `api`: gzip JSON read API and static file server
//! - `core`: configuration, errors and identifiers
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use otelscope_lib::core::Config;
//! use otelscope_lib::storage::Store;
//! use otelscope_lib::receiver::OtlpReceiver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Arc::new(Store::new(false));
//!     let (_stop, shutdown) = tokio::sync::watch::channel(false);
//!     let handles = OtlpReceiver::from_config(store, &config).start(&shutdown).await?;
//!     for handle in handles {
//!         handle.await?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod cli;
pub mod core;
pub mod ingest;
pub mod receiver;
pub mod storage;
pub mod value;

// Re-export core types for convenience
pub use crate::core::{Config, Result, ScopeError};
pub use crate::storage::Store;
