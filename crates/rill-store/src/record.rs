use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rill_events::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One persisted entry of a [`Table`](crate::Table).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: String,
    /// Authored timestamp of the last accepted write; never decreases.
    pub timestamp: DateTime<Utc>,
    pub data: Value,
    /// Tombstone marker. Tombstones keep the data they replaced.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TableRecord {
    pub fn active(id: impl Into<String>, timestamp: DateTime<Utc>, data: Value) -> Self {
        Self {
            id: id.into(),
            timestamp,
            data,
            deleted: false,
        }
    }

    pub fn tombstone(id: impl Into<String>, timestamp: DateTime<Utc>, data: Value) -> Self {
        Self {
            id: id.into(),
            timestamp,
            data,
            deleted: true,
        }
    }

    /// BLAKE3 hash of the canonical JSON encoding of `data`.
    ///
    /// Object keys serialize in sorted order, so equal values hash equally
    /// regardless of the key order they arrived with. Used for deduplication
    /// only; never persisted.
    pub fn content_hash(&self) -> PipelineResult<[u8; 32]> {
        let canonical = serde_json::to_vec(&self.data).map_err(PipelineError::Encode)?;
        Ok(*blake3::hash(&canonical).as_bytes())
    }
}

/// On-disk document of a table: `{"records": [...]}` sorted by ID.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableFile {
    #[serde(default)]
    pub records: Vec<TableRecord>,
}

impl TableFile {
    /// Index records by ID. Later duplicates of an ID win.
    pub fn into_map(self) -> HashMap<String, TableRecord> {
        self.records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect()
    }

    /// Flatten an index back into an ID-sorted document.
    pub fn from_map(map: HashMap<String, TableRecord>) -> Self {
        let mut records: Vec<TableRecord> = map.into_values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Self { records }
    }
}

/// Why a table write produced no change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterReason {
    /// The stored record is newer than the incoming write.
    StaleWrite,
    /// The stored record is newer than the incoming delete.
    StaleDelete,
    /// The stored live record already holds an identical value.
    DuplicateValue,
}

/// Result of applying one event to a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Updated,
    Deleted,
    Filtered(FilterReason),
}

impl Outcome {
    /// Returns `true` if the event changed stored state.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Filtered(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Updated => f.write_str("update"),
            Self::Deleted => f.write_str("delete"),
            Self::Filtered(FilterReason::StaleWrite) => f.write_str("filter (stale write)"),
            Self::Filtered(FilterReason::StaleDelete) => f.write_str("filter (stale delete)"),
            Self::Filtered(FilterReason::DuplicateValue) => f.write_str("filter (duplicate)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, sec).unwrap()
    }

    #[test]
    fn hash_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"title":"Foo","year":1999}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"year":1999,"title":"Foo"}"#).unwrap();
        let ra = TableRecord::active("m1", ts(0), a);
        let rb = TableRecord::active("m1", ts(5), b);
        assert_eq!(ra.content_hash().unwrap(), rb.content_hash().unwrap());
    }

    #[test]
    fn hash_differs_for_different_values() {
        let ra = TableRecord::active("m1", ts(0), json!({"title": "Foo"}));
        let rb = TableRecord::active("m1", ts(0), json!({"title": "Bar"}));
        assert_ne!(ra.content_hash().unwrap(), rb.content_hash().unwrap());
    }

    #[test]
    fn deleted_flag_is_omitted_when_false() {
        let live = serde_json::to_value(TableRecord::active("a", ts(0), json!(1))).unwrap();
        assert!(live.get("deleted").is_none());

        let dead = serde_json::to_value(TableRecord::tombstone("a", ts(0), json!(1))).unwrap();
        assert_eq!(dead["deleted"], true);
    }

    #[test]
    fn timestamp_keeps_nanoseconds() {
        let precise = Utc.timestamp_opt(1_714_564_800, 123_456_789).unwrap();
        let record = TableRecord::active("a", precise, Value::Null);
        let encoded = serde_json::to_string(&record).unwrap();
        assert!(encoded.contains("2024-05-01T12:00:00.123456789Z"));
        let decoded: TableRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.timestamp, precise);
    }

    #[test]
    fn from_map_sorts_by_id() {
        let mut map = HashMap::new();
        for id in ["c", "a", "b"] {
            map.insert(id.to_string(), TableRecord::active(id, ts(0), Value::Null));
        }
        let ids: Vec<String> = TableFile::from_map(map)
            .records
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn outcome_display_and_acceptance() {
        assert_eq!(Outcome::Updated.to_string(), "update");
        assert!(Outcome::Deleted.is_accepted());
        assert!(!Outcome::Filtered(FilterReason::DuplicateValue).is_accepted());
    }
}
