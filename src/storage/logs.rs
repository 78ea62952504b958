//! Log records and their display summaries.

use super::interned::write_attr;
use crate::core::{ReqId, ResId, ScopeId, SpanId, TraceId, TraceSpanId};
use crate::value::{json, AttrMap, ToJson, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Longest summary body kept, in bytes, before the ellipsis.
pub const MAX_SUMMARY_LEN: usize = 130;

const ELLIPSIS: &str = " [...]";

/// Short display form of a log record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSummary {
    /// Severity name, empty when unspecified.
    pub sev: String,
    pub time: u64,
    pub body: String,
}

impl ToJson for LogSummary {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("time", &Value::Timestamp(self.time));
            m.pair("sev", &self.sev);
            m.pair("body", &self.body);
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    pub summary: LogSummary,
    pub req: ReqId,
    pub res: ResId,
    pub scope: ScopeId,
    pub time: u64,
    pub time_obs: u64,
    pub sev_text: String,
    pub event: String,
    pub body: Option<Value>,
    pub attr: AttrMap,
    pub dropped: u32,
    pub flags: u32,
    pub trace: TraceId,
    pub span: SpanId,
}

impl LogRecord {
    /// Fills in the summary from the record's own fields.
    pub fn summarize(&mut self) {
        self.summary.body = summary_body(&self.event, self.body.as_ref());
        self.summary.time = summary_time(self.time, self.time_obs);
    }

    pub fn origin(&self) -> super::Origin {
        super::Origin {
            req: self.req,
            res: self.res,
            scope: self.scope,
        }
    }
}

impl ToJson for LogRecord {
    fn write_json(&self, out: &mut String) {
        json::map(out, |m| {
            m.pair("req", &self.req);
            m.pair("res", &self.res);
            m.pair("scope", &self.scope);
            if self.time != 0 {
                m.pair("time", &Value::Timestamp(self.time));
            }
            if self.time_obs != 0 {
                m.pair("time.obs", &Value::Timestamp(self.time_obs));
            }
            if !self.summary.sev.is_empty() {
                m.pair("sev", &self.summary.sev);
            }
            if !self.sev_text.is_empty() {
                m.pair("sev.text", &self.sev_text);
            }
            if !self.event.is_empty() {
                m.pair("event", &self.event);
            }
            if let Some(body) = &self.body {
                m.pair("body", body);
            }
            write_attr(m, &self.attr, self.dropped);
            if self.flags != 0 {
                m.pair("flags", &Value::Flags(self.flags));
            }
            if self.trace.is_present() {
                if self.span.is_present() {
                    m.pair(
                        "span",
                        &TraceSpanId {
                            trace: self.trace,
                            span: self.span,
                        },
                    );
                } else {
                    m.pair("trace", &self.trace.to_hex());
                }
            }
        });
    }
}

/// Picks the text shown for a log in listings.
///
/// The event name wins over the body; string bodies are shown raw and any
/// other body as canonical JSON.
pub fn summary_body(event: &str, body: Option<&Value>) -> String {
    let full = if !event.is_empty() {
        event.to_string()
    } else {
        match body {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => other.to_json(),
            None => "<no body>".to_string(),
        }
    };
    truncate_summary(full)
}

/// Cuts `s` at the first newline or at [`MAX_SUMMARY_LEN`] bytes,
/// whichever comes first, and marks the cut with `" [...]"`.
pub fn truncate_summary(mut s: String) -> String {
    let window = &s.as_bytes()[..s.len().min(MAX_SUMMARY_LEN)];
    let newline = window.iter().position(|&b| b == b'\n');
    if s.len() <= MAX_SUMMARY_LEN && newline.is_none() {
        return s;
    }
    let mut cut = newline.unwrap_or(MAX_SUMMARY_LEN);
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s.push_str(ELLIPSIS);
    s
}

/// Time shown for a log: event time, else observed time, else now.
pub fn summary_time(time: u64, time_obs: u64) -> u64 {
    if time != 0 {
        time
    } else if time_obs != 0 {
        time_obs
    } else {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_body_is_kept() {
        let body = "x".repeat(50);
        assert_eq!(summary_body("", Some(&Value::from(body.as_str()))), body);
    }

    #[test]
    fn long_body_is_cut() {
        let body = "a".repeat(200);
        let summary = summary_body("", Some(&Value::from(body)));
        assert_eq!(summary, format!("{} [...]", "a".repeat(MAX_SUMMARY_LEN)));
    }

    #[test]
    fn newline_cuts_early() {
        let summary = truncate_summary("first line\nsecond line".to_string());
        assert_eq!(summary, "first line [...]");
    }

    #[test]
    fn newline_past_the_limit_is_ignored() {
        let mut body = "b".repeat(MAX_SUMMARY_LEN);
        body.push('\n');
        body.push_str(&"c".repeat(69));
        assert_eq!(body.len(), 200);
        let summary = truncate_summary(body);
        assert_eq!(summary, format!("{} [...]", "b".repeat(MAX_SUMMARY_LEN)));
    }

    #[test]
    fn cut_backs_up_to_char_boundary() {
        // 129 ASCII bytes then a 3-byte character straddling the limit
        let body = format!("{}€tail", "a".repeat(129));
        let summary = truncate_summary(body);
        assert_eq!(summary, format!("{} [...]", "a".repeat(129)));
    }

    #[test]
    fn event_name_wins() {
        assert_eq!(summary_body("user.login", Some(&Value::from("ignored"))), "user.login");
    }

    #[test]
    fn non_string_body_uses_json() {
        assert_eq!(summary_body("", Some(&Value::Int(7))), r#"{"_int":"7"}"#);
        assert_eq!(summary_body("", None), "<no body>");
    }

    #[test]
    fn summary_time_fallbacks() {
        assert_eq!(summary_time(5, 9), 5);
        assert_eq!(summary_time(0, 9), 9);
        assert!(summary_time(0, 0) > 0);
    }

    #[test]
    fn log_links_to_span_or_trace() {
        let mut log = LogRecord {
            trace: TraceId([1; 16]),
            ..Default::default()
        };
        let parsed: serde_json::Value = serde_json::from_str(&log.to_json()).unwrap();
        assert_eq!(parsed["trace"], "01010101010101010101010101010101");
        assert!(parsed.get("span").is_none());

        log.span = SpanId([2; 8]);
        let parsed: serde_json::Value = serde_json::from_str(&log.to_json()).unwrap();
        assert_eq!(parsed["span"]["_span"], "0202020202020202");
        assert!(parsed.get("trace").is_none());
    }
}
