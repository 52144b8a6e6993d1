use std::collections::HashMap;
use std::sync::Arc;

use rill_events::{Event, Handler, Payload, PipelineError, PipelineResult, Record, SharedHandler};
use tracing::debug;

/// Routes payloads by their [`Record`] kind.
///
/// Kinds are registered explicitly per type before use. Payloads that are not
/// tagged records (bytes, text, JSON, streams) never match.
#[derive(Default)]
pub struct TypeRouter {
    routes: HashMap<&'static str, SharedHandler<Payload>>,
}

impl TypeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for records of type `R`.
    pub fn register<R: Record>(&mut self, handler: impl Handler<Payload> + 'static) {
        self.routes.insert(R::KIND, Arc::new(handler));
    }

    /// Builder form of [`Self::register`].
    pub fn route<R: Record>(mut self, handler: impl Handler<Payload> + 'static) -> Self {
        self.register::<R>(handler);
        self
    }

    /// Returns `true` if records of type `R` have a handler.
    pub fn handles<R: Record>(&self) -> bool {
        self.routes.contains_key(R::KIND)
    }

    /// Dispatch a batch in order, stopping at the first error.
    ///
    /// Events handled before the failure are not rolled back.
    pub fn handle_all(&self, events: impl IntoIterator<Item = Event<Payload>>) -> PipelineResult<()> {
        for event in events {
            self.handle(event)?;
        }
        Ok(())
    }
}

impl Handler<Payload> for TypeRouter {
    fn handle(&self, event: Event<Payload>) -> PipelineResult<()> {
        let handler = event
            .data
            .kind()
            .and_then(|kind| self.routes.get(kind))
            .map(Arc::clone);

        match handler {
            Some(handler) => {
                debug!(id = %event.context.id, kind = ?event.data.kind(), "type route matched");
                handler.handle(event)
            }
            None => Err(PipelineError::NoHandlerForType {
                kind: event.data.shape(),
            }),
        }
    }
}
