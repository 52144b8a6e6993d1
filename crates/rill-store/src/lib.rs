//! Durable local stores for the Rill notification pipeline.
//!
//! Both stores own one file each and serialize every read-modify-write cycle
//! behind a per-instance mutex. After a change is persisted, the store hands
//! a notification to its downstream handler (usually a detached queue or
//! router), outside the lock.
//!
//! - [`Table`] -- one pretty-printed JSON document of [`TableRecord`]s, sorted
//!   by ID. Last-write-wins on the authored timestamp, tombstone deletes,
//!   content-hash deduplication, and prefix-scoped expiry via [`Table::sync`].
//! - [`Queue`] -- an append-only log with one JSON event per line that
//!   forwards every appended event downstream as raw bytes.
//!
//! # Design Rules
//!
//! 1. The file is the state; there is no separate index.
//! 2. Tombstones are never physically removed.
//! 3. Stale writes, stale deletes, and duplicates are filtered outcomes, not errors.
//! 4. A table file that cannot be parsed is read as empty (logged at `warn`).

mod fs;
pub mod queue;
pub mod record;
pub mod table;

pub use queue::{Queue, SyncMode};
pub use record::{FilterReason, Outcome, TableFile, TableRecord};
pub use table::Table;
