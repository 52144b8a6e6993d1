use std::collections::HashMap;
use std::sync::Arc;

use rill_events::{Event, Handler, PipelineError, PipelineResult, SharedHandler};
use tracing::debug;

/// Routes events by provenance.
///
/// Segments of the source chain are tried in chain order; the first one with
/// a registered handler wins.
pub struct SourceRouter<T> {
    routes: HashMap<String, SharedHandler<T>>,
}

impl<T> SourceRouter<T> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register `handler` for `stage`, replacing any previous registration.
    pub fn register(&mut self, stage: impl Into<String>, handler: impl Handler<T> + 'static) {
        self.routes.insert(stage.into(), Arc::new(handler));
    }

    /// Builder form of [`Self::register`].
    pub fn route(mut self, stage: impl Into<String>, handler: impl Handler<T> + 'static) -> Self {
        self.register(stage, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<T> Default for SourceRouter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Handler<T> for SourceRouter<T> {
    fn handle(&self, event: Event<T>) -> PipelineResult<()> {
        let matched = event.context.source.segments().find_map(|segment| {
            self.routes
                .get(segment)
                .map(|h| (segment.to_string(), Arc::clone(h)))
        });

        match matched {
            Some((segment, handler)) => {
                debug!(id = %event.context.id, route = %segment, "source route matched");
                handler.handle(event)
            }
            None => Err(PipelineError::RouteNotFound {
                chain: event.context.source.to_string(),
            }),
        }
    }
}
