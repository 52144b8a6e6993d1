use std::sync::Mutex;

use tracing::{info, warn};

use crate::context::Context;
use crate::error::PipelineError;

/// Destination for the one-line outcome of every detached or ingress
/// handler invocation.
///
/// Errors raised after a fire-and-forget boundary are observable here and
/// nowhere else.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, context: &Context, error: Option<&PipelineError>);
}

/// Format the diagnostic line for one invocation.
///
/// `HH:MM:SS.mmm <source> | <id> <error>`, with source and id padded so
/// consecutive lines align.
pub fn diagnostic_line(context: &Context, error: Option<&PipelineError>) -> String {
    let timestamp = context.timestamp.format("%H:%M:%S%.3f");
    let source = context.source.as_str();
    let id = context.id.as_str();
    match error {
        Some(err) => format!("{timestamp} {source:<25} | {id:<15} {err}"),
        None => format!("{timestamp} {source:<25} | {id:<15}"),
    }
}

/// Sink that writes diagnostic lines through `tracing`.
#[derive(Clone, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, context: &Context, error: Option<&PipelineError>) {
        let line = diagnostic_line(context, error);
        match error {
            Some(_) => warn!(target: "rill::diagnostic", "{line}"),
            None => info!(target: "rill::diagnostic", "{line}"),
        }
    }
}

/// Sink that keeps every line in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded lines, in recording order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lock poisoned").clone()
    }

    /// Error messages of failed invocations, in recording order.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, context: &Context, error: Option<&PipelineError>) {
        let line = diagnostic_line(context, error);
        if let Some(err) = error {
            self.errors
                .lock()
                .expect("lock poisoned")
                .push(err.to_string());
        }
        self.lines.lock().expect("lock poisoned").push(line);
    }
}
