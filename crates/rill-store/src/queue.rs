use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use rill_events::{Event, Handler, Payload, PipelineError, PipelineResult, SharedHandler};
use serde_json::Value;
use tracing::{debug, warn};

use crate::fs::open_or_create;

/// Flush strategy for queue appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Rely on the OS page cache.
    #[default]
    OsDefault,
}

/// File-backed append-only event log.
///
/// Every event handed to the queue is appended verbatim as one JSON line and
/// then forwarded downstream with the queue's name appended to its source
/// chain. The forwarded payload is always raw bytes, so every consumer of a
/// queue goes through the same coercion path. The log is never rewritten.
pub struct Queue {
    name: String,
    path: PathBuf,
    sync_mode: SyncMode,
    lock: Mutex<()>,
    handler: OnceLock<SharedHandler<Payload>>,
}

impl Queue {
    /// Bind a queue to `path`. The file is created on first append.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            sync_mode: SyncMode::default(),
            lock: Mutex::new(()),
            handler: OnceLock::new(),
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configure the downstream handler. May only be called once.
    pub fn set_handler(&self, handler: impl Handler<Payload> + 'static) -> PipelineResult<()> {
        self.handler
            .set(Arc::new(handler))
            .map_err(|_| PipelineError::HandlerAlreadyConfigured(self.name.clone()))
    }

    /// Append one event and forward it downstream.
    ///
    /// Encoding or write failures are returned and nothing is forwarded; the
    /// queue stays usable for later calls.
    pub fn append(&self, event: Event<Payload>) -> PipelineResult<()> {
        let Event { context, data } = event;
        let data = match data {
            stream @ Payload::Stream(_) => Payload::Bytes(stream.into_bytes()?),
            other => other,
        };
        let forwarded = data.to_bytes()?;
        let entry = Event::new(context, data);

        let mut line = serde_json::to_vec(&entry).map_err(PipelineError::Encode)?;
        line.push(b'\n');

        {
            let _guard = self.lock.lock().expect("queue lock poisoned");
            let mut file = open_or_create(&self.path)?;
            file.write_all(&line)
                .map_err(|e| PipelineError::persistence(&self.path, e))?;
            if self.sync_mode == SyncMode::EveryWrite {
                file.sync_data()
                    .map_err(|e| PipelineError::persistence(&self.path, e))?;
            }
        }
        debug!(queue = %self.name, id = %entry.context.id, len = line.len(), "queue append");

        if let Some(handler) = self.handler.get() {
            let forwarded = Event::new(entry.context.append(&self.name), Payload::Bytes(forwarded));
            if let Err(e) = handler.handle(forwarded) {
                warn!(queue = %self.name, error = %e, "downstream handler failed");
            }
        }
        Ok(())
    }

    /// Read the whole log back, oldest first.
    ///
    /// Lines that do not parse are logged and skipped.
    pub fn entries(&self) -> PipelineResult<Vec<Event<Value>>> {
        let _guard = self.lock.lock().expect("queue lock poisoned");
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::persistence(&self.path, e)),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| PipelineError::persistence(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event<Value>>(&line) {
                Ok(event) => entries.push(event),
                Err(e) => {
                    warn!(queue = %self.name, line = index + 1, error = %e, "skipping malformed queue entry");
                }
            }
        }
        Ok(entries)
    }
}

impl Handler<Payload> for Queue {
    fn handle(&self, event: Event<Payload>) -> PipelineResult<()> {
        self.append(event)
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .field("has_handler", &self.handler.get().is_some())
            .finish()
    }
}
