//! Business transforms between catalog stages.

use std::sync::Arc;

use rill_events::{Context, Event, Handler, Payload, PipelineResult};
use rill_router::TypeRouter;
use rill_store::Table;
use tracing::debug;

use crate::records::{
    EncodeJob, EncodeResult, Person, RawActor, RawEpisode, RawMovie, RawSeries, Video,
};

/// File name stem for a video title: lowercase, spaces as underscores.
pub fn file_stem(title: &str) -> String {
    title.to_lowercase().replace(' ', "_")
}

/// The encode job for a video.
pub fn encode_job(video: &Video) -> EncodeJob {
    EncodeJob {
        title: video.title.clone(),
        location: format!("file://{}.mkv", file_stem(&video.title)),
    }
}

/// The result of encoding `job`.
pub fn encode_result(job: &EncodeJob) -> EncodeResult {
    EncodeResult {
        title: job.title.clone(),
        hash: hex::encode(blake3::hash(job.location.as_bytes()).as_bytes()),
        location: job.location.replace(".mkv", "_encoded.mkv"),
    }
}

/// Child ID of the `number`th (1-based) episode of series `series_id`.
pub fn episode_id(series_id: &str, number: usize) -> String {
    format!("{series_id}_ep{number}")
}

/// ID prefix shared by every episode of series `series_id`.
pub fn episode_prefix(series_id: &str) -> String {
    format!("{series_id}_")
}

/// Consumer of the raw queue.
///
/// Emits typed records into a [`TypeRouter`] that fans out to the standard
/// tables, the encode queue, and the raw episode table.
pub struct RawDestination {
    router: Arc<TypeRouter>,
    episodes: Arc<Table>,
}

impl RawDestination {
    pub fn new(router: Arc<TypeRouter>, episodes: Arc<Table>) -> Self {
        Self { router, episodes }
    }

    pub fn actor(&self, event: Event<RawActor>) -> PipelineResult<()> {
        let person = Person {
            name: event.data.name,
        };
        self.router
            .handle(Event::new(event.context, Payload::record(person)))
    }

    pub fn movie(&self, event: Event<RawMovie>) -> PipelineResult<()> {
        let video = Video {
            title: event.data.title,
        };
        self.encode(event.context, video)
    }

    pub fn episode(&self, event: Event<RawEpisode>) -> PipelineResult<()> {
        let video = Video {
            title: format!("{} {}", event.data.series_title, event.data.episode_number),
        };
        self.encode(event.context, video)
    }

    /// Emit one raw episode per series entry, then retire every earlier
    /// episode of this series that this version no longer produces.
    pub fn split_series(&self, event: Event<RawSeries>) -> PipelineResult<()> {
        let Event { context, data } = event;
        for (i, episode) in data.episodes.into_iter().enumerate() {
            let number = i + 1;
            let raw = RawEpisode {
                series_title: data.title.clone(),
                episode_title: episode.title,
                episode_number: number as u32,
                series_version: context.timestamp,
            };
            let child = context.split(episode_id(&context.id, number));
            self.router.handle(Event::new(child, Payload::record(raw)))?;
        }

        let expired = self
            .episodes
            .sync(&episode_prefix(&context.id), context.timestamp)?;
        debug!(series = %context.id, expired = expired.len(), "series episodes synced");
        Ok(())
    }

    fn encode(&self, context: Context, video: Video) -> PipelineResult<()> {
        let job = encode_job(&video);
        self.router.handle_all([
            Event::new(context.clone(), Payload::record(video)),
            Event::new(context, Payload::record(job)),
        ])
    }
}

/// Consumer of the encode queue.
pub struct EncodeDestination {
    router: Arc<TypeRouter>,
}

impl EncodeDestination {
    pub fn new(router: Arc<TypeRouter>) -> Self {
        Self { router }
    }

    pub fn encode(&self, event: Event<EncodeJob>) -> PipelineResult<()> {
        let result = encode_result(&event.data);
        self.router
            .handle(Event::new(event.context, Payload::record(result)))
    }
}
