//! Record shapes of the media catalog.

use chrono::{DateTime, Utc};
use rill_events::Record;
use serde::{Deserialize, Serialize};

/// Actor as submitted to the `rawActors` endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawActor {
    pub name: String,
}

/// Movie as submitted to the `rawMovies` endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMovie {
    pub title: String,
}

/// Series as submitted to the `rawSeries` endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSeries {
    pub title: String,
    pub episodes: Vec<SeriesEpisode>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesEpisode {
    pub title: String,
}

/// One episode split out of a [`RawSeries`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEpisode {
    pub series_title: String,
    pub episode_title: String,
    /// 1-based position within the series.
    pub episode_number: u32,
    /// Timestamp of the series write this episode was split from.
    ///
    /// Every split therefore refreshes the stored episode, even when its
    /// other fields are unchanged, so the follow-up prefix sync only retires
    /// episodes the series no longer lists.
    pub series_version: DateTime<Utc>,
}

impl Record for RawEpisode {
    const KIND: &'static str = "raw_episode";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
}

impl Record for Person {
    const KIND: &'static str = "person";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub title: String,
}

impl Record for Video {
    const KIND: &'static str = "video";
}

/// Request to transcode the file at `location`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncodeJob {
    pub title: String,
    pub location: String,
}

impl Record for EncodeJob {
    const KIND: &'static str = "encode_job";
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncodeResult {
    pub title: String,
    /// Hex BLAKE3 digest of the source location.
    pub hash: String,
    pub location: String,
}

impl Record for EncodeResult {
    const KIND: &'static str = "encode_result";
}
