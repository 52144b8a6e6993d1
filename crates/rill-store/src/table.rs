use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rill_events::{
    Context, Event, Handler, Payload, PipelineError, PipelineResult, SharedHandler, Status,
};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::fs::{open_or_create, parent_dir};
use crate::record::{FilterReason, Outcome, TableFile, TableRecord};

/// File-backed keyed record store with last-write-wins conflict resolution.
///
/// Every accepted change rewrites the whole file and then emits a
/// change-of-record notification whose source is the table's own name and
/// whose timestamp is the time of the change.
pub struct Table {
    name: String,
    path: PathBuf,
    lock: Mutex<()>,
    handler: OnceLock<SharedHandler<Payload>>,
}

impl Table {
    /// Bind a table to `path`. The file is created on first access.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            lock: Mutex::new(()),
            handler: OnceLock::new(),
        }
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

    /// Upsert one event and report what happened to stored state.
    pub fn apply(&self, event: Event<Payload>) -> PipelineResult<Outcome> {
        let Event { context, data } = event;
        let data = data.into_value()?;

        let outcome = {
            let _guard = self.lock.lock().expect("table lock poisoned");
            let mut records = self.load()?;
            let outcome = merge(&mut records, &context, &data)?;
            if !outcome.is_accepted() {
                debug!(table = %self.name, id = %context.id, %outcome, "write filtered");
                return Ok(outcome);
            }
            self.store(records)?;
            outcome
        };

        debug!(table = %self.name, id = %context.id, %outcome, "record written");
        self.notify(&context.id, context.status, &data);
        Ok(outcome)
    }

    /// Expire every live record whose ID starts with `prefix` and whose
    /// timestamp is strictly before `cutoff`.
    ///
    /// Expired records become tombstones stamped at `cutoff`. The file is
    /// rewritten once for the whole batch, then one deleted notification is
    /// emitted per expired record. Returns the expired records, sorted by ID.
    pub fn sync(&self, prefix: &str, cutoff: DateTime<Utc>) -> PipelineResult<Vec<TableRecord>> {
        let removed = {
            let _guard = self.lock.lock().expect("table lock poisoned");
            let mut records = self.load()?;
            let mut removed = Vec::new();
            for record in records.values_mut() {
                if record.id.starts_with(prefix) && !record.deleted && record.timestamp < cutoff {
                    record.deleted = true;
                    record.timestamp = cutoff;
                    removed.push(record.clone());
                }
            }
            if removed.is_empty() {
                return Ok(removed);
            }
            self.store(records)?;
            removed
        };

        let mut removed = removed;
        removed.sort_by(|a, b| a.id.cmp(&b.id));
        debug!(table = %self.name, prefix, expired = removed.len(), "prefix sync");
        for record in &removed {
            self.notify(&record.id, Status::Deleted, &record.data);
        }
        Ok(removed)
    }

    /// Look up one record, tombstones included.
    pub fn get(&self, id: &str) -> PipelineResult<Option<TableRecord>> {
        let _guard = self.lock.lock().expect("table lock poisoned");
        Ok(self.load()?.remove(id))
    }

    /// All records, tombstones included, sorted by ID.
    pub fn records(&self) -> PipelineResult<Vec<TableRecord>> {
        let _guard = self.lock.lock().expect("table lock poisoned");
        Ok(TableFile::from_map(self.load()?).records)
    }

    /// Read the table into an ID index. Caller must hold the lock.
    ///
    /// A missing or empty file is an empty table. So is a file that does not
    /// parse: that loses whatever it held, so it is logged loudly.
    fn load(&self) -> PipelineResult<HashMap<String, TableRecord>> {
        let mut file = open_or_create(&self.path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| PipelineError::persistence(&self.path, e))?;

        if contents.trim().is_empty() {
            return Ok(HashMap::new());
        }
        match serde_json::from_str::<TableFile>(&contents) {
            Ok(table) => Ok(table.into_map()),
            Err(e) => {
                warn!(
                    table = %self.name,
                    path = %self.path.display(),
                    error = %e,
                    "table file is corrupt; treating it as empty"
                );
                Ok(HashMap::new())
            }
        }
    }

    /// Replace the file with the sorted records. Caller must hold the lock.
    fn store(&self, records: HashMap<String, TableRecord>) -> PipelineResult<()> {
        let document = TableFile::from_map(records);
        let mut tmp = NamedTempFile::new_in(parent_dir(&self.path))
            .map_err(|e| PipelineError::persistence(&self.path, e))?;
        serde_json::to_writer_pretty(&mut tmp, &document).map_err(PipelineError::Encode)?;
        tmp.write_all(b"\n")
            .map_err(|e| PipelineError::persistence(&self.path, e))?;
        // Temp files are created owner-only; keep the mode of the file being replaced.
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| PipelineError::persistence(&self.path, e))?;
        }
        tmp.persist(&self.path)
            .map_err(|e| PipelineError::persistence(&self.path, e.error))?;
        Ok(())
    }

    fn notify(&self, id: &str, status: Status, data: &Value) {
        let Some(handler) = self.handler.get() else {
            return;
        };
        let bytes = match serde_json::to_vec(data) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(table = %self.name, id, error = %e, "failed to encode notification");
                return;
            }
        };
        let context = Context::now(id, status, self.name.as_str());
        if let Err(e) = handler.handle(Event::new(context, Payload::Bytes(bytes))) {
            warn!(table = %self.name, id, error = %e, "downstream handler failed");
        }
    }
}

/// Apply one event to the index, returning the outcome.
fn merge(
    records: &mut HashMap<String, TableRecord>,
    context: &Context,
    data: &Value,
) -> PipelineResult<Outcome> {
    let existing = records.get(&context.id);

    if context.is_deleted() {
        if existing.is_some_and(|r| r.timestamp > context.timestamp) {
            return Ok(Outcome::Filtered(FilterReason::StaleDelete));
        }
        let previous = existing.map(|r| r.data.clone()).unwrap_or(Value::Null);
        let tombstone = TableRecord::tombstone(context.id.clone(), context.timestamp, previous);
        records.insert(context.id.clone(), tombstone);
        return Ok(Outcome::Deleted);
    }

    let candidate = TableRecord::active(context.id.clone(), context.timestamp, data.clone());
    if let Some(existing) = existing {
        if existing.timestamp > candidate.timestamp {
            return Ok(Outcome::Filtered(FilterReason::StaleWrite));
        }
        if !existing.deleted && existing.content_hash()? == candidate.content_hash()? {
            return Ok(Outcome::Filtered(FilterReason::DuplicateValue));
        }
    }
    records.insert(context.id.clone(), candidate);
    Ok(Outcome::Updated)
}

impl Handler<Payload> for Table {
    fn handle(&self, event: Event<Payload>) -> PipelineResult<()> {
        self.apply(event).map(|_| ())
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("has_handler", &self.handler.get().is_some())
            .finish()
    }
}
