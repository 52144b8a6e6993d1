use std::sync::Arc;

use chrono::{DateTime, Utc};
use rill_events::{
    diagnostic_line, Context, DiagnosticSink, Event, Payload, PipelineError, PipelineResult,
    Status,
};
use rill_store::{Outcome, Table};
use serde_json::{Map, Value};

/// Result of one ingress submission.
#[derive(Debug)]
pub struct IngressReceipt {
    pub context: Context,
    pub outcome: PipelineResult<Outcome>,
    /// The diagnostic line written for this submission.
    pub line: String,
}

/// Named entry point that turns an external request into an event on a
/// raw table.
///
/// The event's source is the endpoint name and its timestamp is the time the
/// request was received. Every submission writes exactly one diagnostic
/// line, whether or not the table accepted it.
#[derive(Clone)]
pub struct Ingress {
    name: String,
    table: Arc<Table>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Ingress {
    pub fn new(name: impl Into<String>, table: Arc<Table>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            name: name.into(),
            table,
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    /// Submit a request received now.
    pub fn submit(&self, id: &str, status: &str, body: &[u8]) -> IngressReceipt {
        self.submit_at(id, status, body, Utc::now())
    }

    /// Submit a request received at `timestamp`.
    ///
    /// `status` is the wire token (`active`, `deleted`, or empty for
    /// active). An empty body is an empty JSON object, so deletes need no
    /// payload. A missing ID, an unknown status or a body that is not JSON is
    /// rejected before it reaches the table, and still gets its line.
    pub fn submit_at(
        &self,
        id: &str,
        status: &str,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> IngressReceipt {
        let parsed = status.parse::<Status>();
        let context = Context::new(
            id,
            parsed.as_ref().copied().unwrap_or_default(),
            self.name.as_str(),
            timestamp,
        );
        let outcome = parsed
            .and_then(|_| require_id(id))
            .and_then(|()| decode_body(body))
            .and_then(|data| {
                self.table
                    .apply(Event::new(context.clone(), Payload::Json(data)))
            });

        let line = diagnostic_line(&context, outcome.as_ref().err());
        self.sink.record(&context, outcome.as_ref().err());
        IngressReceipt {
            context,
            outcome,
            line,
        }
    }
}

impl std::fmt::Debug for Ingress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingress")
            .field("name", &self.name)
            .field("table", &self.table.name())
            .finish()
    }
}

fn require_id(id: &str) -> PipelineResult<()> {
    if id.trim().is_empty() {
        return Err(PipelineError::Rejected("missing id".into()));
    }
    Ok(())
}

fn decode_body(body: &[u8]) -> PipelineResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(PipelineError::Decode)
}
