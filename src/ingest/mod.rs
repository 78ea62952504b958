//! Ingestion of decoded OTLP export requests.
//!
//! Each signal is ingested in two steps. `prepare` walks the decoded
//! request without touching the store, converting every record to its
//! canonical form and rejecting the whole request if any id has the wrong
//! length. `commit` then interns the request, resources and scopes and
//! hands each record to the [`Store`], taking the lock per record.

pub mod logs;
pub mod metrics;
pub mod names;
pub mod traces;

pub use logs::prepare_logs;
pub use metrics::prepare_metrics;
pub use traces::prepare_traces;

use crate::storage::{Origin, RequestMeta, Resource, Scope, Store};
use crate::value::convert_attributes;
use opentelemetry_proto::tonic::common::v1::InstrumentationScope;
use opentelemetry_proto::tonic::resource::v1::Resource as ProtoResource;

/// A request's records grouped by resource and scope.
#[derive(Debug, Clone)]
pub struct Batch<T> {
    pub resources: Vec<ResourceGroup<T>>,
}

#[derive(Debug, Clone)]
pub struct ResourceGroup<T> {
    pub resource: Resource,
    pub scopes: Vec<ScopeGroup<T>>,
}

#[derive(Debug, Clone)]
pub struct ScopeGroup<T> {
    pub scope: Scope,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.resources
            .iter()
            .flat_map(|r| &r.scopes)
            .map(|s| s.items.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store {
    /// Interns the request, then every resource and scope of `batch` in
    /// payload order, calling `commit` for each record.
    pub(crate) fn commit_batch<T>(
        &self,
        batch: Batch<T>,
        req: RequestMeta,
        mut commit: impl FnMut(&Store, Origin, T),
    ) {
        let req = self.intern_request(req);
        for group in batch.resources {
            let res = self.intern_resource(group.resource);
            for scoped in group.scopes {
                let scope = self.intern_scope(scoped.scope);
                let origin = Origin { req, res, scope };
                for item in scoped.items {
                    commit(self, origin, item);
                }
            }
        }
    }
}

pub(crate) fn convert_resource(resource: Option<&ProtoResource>, schema_url: &str) -> Resource {
    let (attr, dropped) = resource
        .map(|r| (convert_attributes(&r.attributes), r.dropped_attributes_count))
        .unwrap_or_default();
    Resource {
        attr,
        dropped,
        schema: schema_url.to_string(),
    }
}

pub(crate) fn convert_scope(scope: Option<&InstrumentationScope>, schema_url: &str) -> Scope {
    match scope {
        Some(s) => Scope {
            name: s.name.clone(),
            version: s.version.clone(),
            attr: convert_attributes(&s.attributes),
            dropped: s.dropped_attributes_count,
            schema: schema_url.to_string(),
        },
        None => Scope {
            schema: schema_url.to_string(),
            ..Default::default()
        },
    }
}
