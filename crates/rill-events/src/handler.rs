use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::PipelineResult;
use crate::event::Event;

/// Synchronous event handler.
///
/// `Ok(())` means the event was fully processed, including any fan-out the
/// handler triggered synchronously. Implementations must be `Send + Sync` so
/// one instance can be shared across concurrent notification tasks.
pub trait Handler<T>: Send + Sync {
    fn handle(&self, event: Event<T>) -> PipelineResult<()>;
}

/// A handler shared by reference between wiring points.
pub type SharedHandler<T> = Arc<dyn Handler<T>>;

impl<T, H: Handler<T> + ?Sized> Handler<T> for Arc<H> {
    fn handle(&self, event: Event<T>) -> PipelineResult<()> {
        (**self).handle(event)
    }
}

/// Adapter turning a closure into a [`Handler`].
pub struct FnHandler<F>(F);

impl<T, F> Handler<T> for FnHandler<F>
where
    F: Fn(Event<T>) -> PipelineResult<()> + Send + Sync,
{
    fn handle(&self, event: Event<T>) -> PipelineResult<()> {
        (self.0)(event)
    }
}

/// Wrap a closure as a [`Handler`].
pub fn handler_fn<T, F>(f: F) -> FnHandler<F>
where
    F: Fn(Event<T>) -> PipelineResult<()> + Send + Sync,
{
    FnHandler(f)
}

/// Fixed-delay wrapper: sleeps for `delay`, then invokes the inner handler.
///
/// The sleep blocks the calling thread, so this is meant to run behind a
/// [`Dispatcher`](crate::Dispatcher), which executes handlers on the blocking
/// pool and never on the producer's thread.
pub struct Delayed<H> {
    delay: Duration,
    inner: H,
}

impl<H> Delayed<H> {
    pub fn new(delay: Duration, inner: H) -> Self {
        Self { delay, inner }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<T, H: Handler<T>> Handler<T> for Delayed<H> {
    fn handle(&self, event: Event<T>) -> PipelineResult<()> {
        debug!(id = %event.context.id, delay_ms = self.delay.as_millis() as u64, "delaying handler");
        std::thread::sleep(self.delay);
        self.inner.handle(event)
    }
}
