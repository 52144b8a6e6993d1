use std::path::PathBuf;
use std::time::Duration;

use rill_events::DispatchConfig;
use serde::{Deserialize, Serialize};

/// Settings for building a [`Pipeline`](crate::Pipeline).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory for table documents and queue logs.
    pub data_dir: PathBuf,
    /// How long the encode stage takes per job.
    pub encode_delay_ms: u64,
    /// Maximum concurrently executing notification handlers.
    pub max_inflight: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            encode_delay_ms: 1000,
            max_inflight: DispatchConfig::default().max_inflight,
        }
    }
}

impl PipelineConfig {
    pub fn encode_delay(&self) -> Duration {
        Duration::from_millis(self.encode_delay_ms)
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            max_inflight: self.max_inflight,
        }
    }
}
