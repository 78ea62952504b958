//! Log ingestion.

use super::{convert_resource, convert_scope, names, Batch, ResourceGroup, ScopeGroup};
use crate::core::{Result, SpanId, TraceId};
use crate::storage::{LogRecord, LogSummary, RequestMeta, Store};
use crate::value::{convert_attributes, convert_value};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::logs::v1::LogRecord as ProtoLogRecord;

/// Converts every log record of `request`, failing on any malformed id.
pub fn prepare_logs(request: &ExportLogsServiceRequest) -> Result<Batch<LogRecord>> {
    let mut resources = Vec::with_capacity(request.resource_logs.len());
    for rl in &request.resource_logs {
        let mut scopes = Vec::with_capacity(rl.scope_logs.len());
        for sl in &rl.scope_logs {
            let items = sl.log_records.iter().map(convert_log).collect::<Result<Vec<_>>>()?;
            scopes.push(ScopeGroup {
                scope: convert_scope(sl.scope.as_ref(), &sl.schema_url),
                items,
            });
        }
        resources.push(ResourceGroup {
            resource: convert_resource(rl.resource.as_ref(), &rl.schema_url),
            scopes,
        });
    }
    Ok(Batch { resources })
}

fn convert_log(lr: &ProtoLogRecord) -> Result<LogRecord> {
    let mut log = LogRecord {
        summary: LogSummary {
            sev: names::severity(lr.severity_number),
            ..Default::default()
        },
        time: lr.time_unix_nano,
        time_obs: lr.observed_time_unix_nano,
        sev_text: lr.severity_text.clone(),
        event: lr.event_name.clone(),
        body: lr.body.as_ref().and_then(convert_value),
        attr: convert_attributes(&lr.attributes),
        dropped: lr.dropped_attributes_count,
        flags: lr.flags,
        trace: TraceId::from_bytes(&lr.trace_id)?,
        span: SpanId::from_bytes(&lr.span_id)?,
        ..Default::default()
    };
    log.summarize();
    Ok(log)
}

impl Store {
    /// Ingest a log export request received with `req`.
    ///
    /// Records are appended in payload order. Nothing is stored when the
    /// request holds a malformed id.
    pub fn ingest_logs(
        &self,
        request: &ExportLogsServiceRequest,
        req: RequestMeta,
    ) -> Result<()> {
        let batch = prepare_logs(request)?;
        tracing::debug!("Committing {} log records", batch.len());
        self.commit_batch(batch, req, |store, origin, mut log| {
            log.req = origin.req;
            log.res = origin.res;
            log.scope = origin.scope;
            store.commit_log(log);
        });
        Ok(())
    }
}
