use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Separator between stage names in a [`SourceChain`].
pub const SOURCE_SEPARATOR: char = ':';

/// Lifecycle status carried by an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The record exists (create or update).
    #[default]
    Active,
    /// Removal intent; stores keep a tombstone.
    Deleted,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = PipelineError;

    /// An empty token means `active`, matching ingress requests without a status.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "active" => Ok(Self::Active),
            "deleted" => Ok(Self::Deleted),
            other => Err(PipelineError::Rejected(format!("unknown status {other:?}"))),
        }
    }
}

/// Ordered trail of stage names an event has passed through.
///
/// Encoded as a single colon-joined string (`"rawSeries:raw_q"`). Stages only
/// ever append; routers may match on any single segment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceChain(String);

impl SourceChain {
    /// A chain that starts at the given stage.
    pub fn new(stage: impl Into<String>) -> Self {
        Self(stage.into())
    }

    /// Return a new chain with `stage` appended.
    pub fn append(&self, stage: &str) -> Self {
        if self.0.is_empty() {
            return Self(stage.to_string());
        }
        Self(format!("{}{SOURCE_SEPARATOR}{stage}", self.0))
    }

    /// Segments in chain order, oldest first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SOURCE_SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Returns `true` if any segment equals `stage`.
    pub fn contains(&self, stage: &str) -> bool {
        self.segments().any(|s| s == stage)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for SourceChain {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SourceChain {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity and provenance of one logical event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Identity of the record the event concerns; unique per table only.
    pub id: String,
    pub status: Status,
    pub source: SourceChain,
    /// When the event was authored, not when a stage observed it.
    pub timestamp: DateTime<Utc>,
}

impl Context {
    pub fn new(
        id: impl Into<String>,
        status: Status,
        source: impl Into<SourceChain>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            status,
            source: source.into(),
            timestamp,
        }
    }

    /// A context authored right now.
    pub fn now(id: impl Into<String>, status: Status, source: impl Into<SourceChain>) -> Self {
        Self::new(id, status, source, Utc::now())
    }

    /// Derive the context of a logically different sub-entity.
    ///
    /// Status, source, and timestamp carry over; only the ID changes.
    pub fn split(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    /// Derive a context that has passed through `stage`.
    pub fn append(&self, stage: &str) -> Self {
        Self {
            source: self.source.append(stage),
            ..self.clone()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }
}
