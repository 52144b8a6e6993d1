use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tracing::debug;

use crate::diagnostic::DiagnosticSink;
use crate::error::{PipelineError, PipelineResult};
use crate::event::Event;
use crate::handler::Handler;

/// Configuration for the [`Dispatcher`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of notification handlers executing at once.
    ///
    /// Producers never wait on this bound; excess tasks queue for a permit.
    pub max_inflight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { max_inflight: 256 }
    }
}

/// Count of spawned-but-unfinished notification tasks.
#[derive(Default)]
struct Inflight {
    count: AtomicUsize,
    idle: Notify,
}

impl Inflight {
    fn inc(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn dec(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    async fn wait_zero(&self) {
        loop {
            // Registered before the check so a concurrent `dec` cannot be missed.
            let idle = self.idle.notified();
            if self.current() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Fire-and-forget executor for notification handlers.
///
/// Each dispatched event becomes an independent task that outlives the call
/// that produced it. Handlers run on tokio's blocking pool (they do file I/O
/// and may sleep), at most `max_inflight` at a time. The outcome of every
/// task, success or error, goes to the configured [`DiagnosticSink`] and is
/// never returned to the producer.
#[derive(Clone)]
pub struct Dispatcher {
    runtime: Handle,
    permits: Arc<Semaphore>,
    inflight: Arc<Inflight>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Dispatcher {
    /// Create a dispatcher bound to the current tokio runtime.
    pub fn new(config: DispatchConfig, sink: Arc<dyn DiagnosticSink>) -> PipelineResult<Self> {
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;
        Ok(Self::with_runtime(runtime, config, sink))
    }

    /// Create a dispatcher bound to an explicit runtime handle.
    pub fn with_runtime(
        runtime: Handle,
        config: DispatchConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(config.max_inflight.max(1))),
            inflight: Arc::new(Inflight::default()),
            sink,
        }
    }

    /// Wrap `handler` so that every call is detached onto this dispatcher.
    pub fn detach<T, H>(&self, handler: H) -> Detached<T, H>
    where
        T: Send + 'static,
        H: Handler<T> + 'static,
    {
        Detached {
            inner: Arc::new(handler),
            dispatcher: self.clone(),
            _payload: PhantomData,
        }
    }

    /// The sink that receives task outcomes.
    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.sink)
    }

    /// Number of notification tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.inflight.current()
    }

    /// Wait until no notification task is in flight.
    ///
    /// Tasks spawned by running tasks are counted before their parent
    /// finishes, so this waits for whole cascades to settle.
    pub async fn drain(&self) {
        self.inflight.wait_zero().await;
    }

    fn spawn<T, H>(&self, handler: Arc<H>, event: Event<T>)
    where
        T: Send + 'static,
        H: Handler<T> + 'static,
    {
        self.inflight.inc();
        let permits = Arc::clone(&self.permits);
        let inflight = Arc::clone(&self.inflight);
        let sink = Arc::clone(&self.sink);
        let context = event.context.clone();

        self.runtime.spawn(async move {
            // The semaphore is never closed, so a failed acquire cannot happen;
            // without a permit the task still runs rather than being dropped.
            let permit = permits.acquire_owned().await.ok();
            let outcome = tokio::task::spawn_blocking(move || handler.handle(event)).await;
            drop(permit);

            match outcome {
                Ok(Ok(())) => sink.record(&context, None),
                Ok(Err(err)) => sink.record(&context, Some(&err)),
                Err(join) => {
                    let err = PipelineError::TaskFailed(join.to_string());
                    sink.record(&context, Some(&err));
                }
            }
            debug!(id = %context.id, source = %context.source, "notification task finished");
            inflight.dec();
        });
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("in_flight", &self.in_flight())
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

/// A handler whose every invocation is spawned onto a [`Dispatcher`].
///
/// `handle` returns `Ok(())` as soon as the task is spawned.
pub struct Detached<T, H> {
    inner: Arc<H>,
    dispatcher: Dispatcher,
    _payload: PhantomData<fn(T)>,
}

impl<T, H> Handler<T> for Detached<T, H>
where
    T: Send + 'static,
    H: Handler<T> + 'static,
{
    fn handle(&self, event: Event<T>) -> PipelineResult<()> {
        self.dispatcher.spawn(Arc::clone(&self.inner), event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Status};
    use crate::diagnostic::MemorySink;
    use crate::handler::{handler_fn, Delayed};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn event(id: &str) -> Event<u32> {
        Event::new(Context::now(id, Status::Active, "test"), 1)
    }

    #[test]
    fn new_outside_runtime_fails() {
        let result = Dispatcher::new(DispatchConfig::default(), Arc::new(MemorySink::new()));
        assert!(matches!(result, Err(PipelineError::NoRuntime)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn detached_handler_returns_before_work_completes() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::new(DispatchConfig::default(), sink.clone()).unwrap();
        let slow = dispatcher.detach(Delayed::new(
            Duration::from_millis(100),
            handler_fn(|_e: Event<u32>| Ok(())),
        ));

        let start = Instant::now();
        slow.handle(event("a")).unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(dispatcher.in_flight(), 1);

        dispatcher.drain().await;
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn errors_only_reach_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::new(DispatchConfig::default(), sink.clone()).unwrap();
        let failing = dispatcher.detach(handler_fn(|_e: Event<u32>| {
            Err(PipelineError::Rejected("downstream down".into()))
        }));

        assert!(failing.handle(event("a")).is_ok());
        dispatcher.drain().await;

        assert_eq!(sink.errors(), vec!["rejected: downstream down".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panics_are_reported_as_task_failures() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::new(DispatchConfig::default(), sink.clone()).unwrap();
        let panicking = dispatcher.detach(handler_fn(|_e: Event<u32>| -> PipelineResult<()> {
            panic!("boom")
        }));

        panicking.handle(event("a")).unwrap();
        dispatcher.drain().await;

        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("notification task failed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrency_is_bounded() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher =
            Dispatcher::new(DispatchConfig { max_inflight: 2 }, sink.clone()).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let handler = dispatcher.detach(handler_fn(move |_e: Event<u32>| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }));

        for i in 0..8 {
            handler.handle(event(&format!("e{i}"))).unwrap();
        }
        dispatcher.drain().await;

        assert_eq!(sink.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_waits_for_cascades() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = Dispatcher::new(DispatchConfig::default(), sink.clone()).unwrap();

        let leaf = Arc::new(dispatcher.detach(Delayed::new(
            Duration::from_millis(30),
            handler_fn(|_e: Event<u32>| Ok(())),
        )));
        let root = dispatcher.detach(handler_fn(move |e: Event<u32>| leaf.handle(e)));

        root.handle(event("a")).unwrap();
        dispatcher.drain().await;
        assert_eq!(sink.len(), 2);
    }
}
