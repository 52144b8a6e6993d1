//! Construction of the catalog notification graph.

use std::sync::Arc;

use rill_events::{handler_fn, Delayed, Dispatcher, Event, PipelineResult};
use rill_router::{typed, SourceRouter, TypeRouter};
use rill_store::{Queue, Table};
use tracing::info;

use crate::config::PipelineConfig;
use crate::ingress::Ingress;
use crate::records::{
    EncodeJob, EncodeResult, Person, RawActor, RawEpisode, RawMovie, RawSeries, Video,
};
use crate::transforms::{EncodeDestination, RawDestination};

/// Ingress endpoint names, paired with the raw table each one feeds.
pub const ENDPOINTS: [(&str, &str); 3] = [
    ("rawActors", "rawActor"),
    ("rawMovies", "rawMovie"),
    ("rawSeries", "rawSeries"),
];

/// Every table in the graph.
#[derive(Clone, Debug)]
pub struct Tables {
    pub raw_actor: Arc<Table>,
    pub raw_episode: Arc<Table>,
    pub raw_movie: Arc<Table>,
    pub raw_series: Arc<Table>,
    pub standard_person: Arc<Table>,
    pub standard_video: Arc<Table>,
    pub encoded_data: Arc<Table>,
}

impl Tables {
    pub fn all(&self) -> [&Arc<Table>; 7] {
        [
            &self.raw_actor,
            &self.raw_episode,
            &self.raw_movie,
            &self.raw_series,
            &self.standard_person,
            &self.standard_video,
            &self.encoded_data,
        ]
    }
}

/// Every queue in the graph.
#[derive(Clone, Debug)]
pub struct Queues {
    pub raw: Arc<Queue>,
    pub person: Arc<Queue>,
    pub video: Arc<Queue>,
    pub encode: Arc<Queue>,
}

/// The fully wired catalog pipeline.
///
/// Every table-to-queue and queue-to-consumer edge is detached onto the
/// dispatcher, so an ingress submission returns once the raw table is
/// written and everything downstream happens in the background.
#[derive(Clone, Debug)]
pub struct Pipeline {
    tables: Tables,
    queues: Queues,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Build and wire every node under `config.data_dir`.
    pub fn build(config: &PipelineConfig, dispatcher: Dispatcher) -> PipelineResult<Self> {
        let dir = &config.data_dir;
        let table = |name: &str, rel: &str| Arc::new(Table::new(name, dir.join(rel)));
        let queue = |name: &str, rel: &str| Arc::new(Queue::new(name, dir.join(rel)));

        let tables = Tables {
            raw_actor: table("rawActor", "raw/actor.json"),
            raw_episode: table("rawEpisode", "raw/episodes.json"),
            raw_movie: table("rawMovie", "raw/movie.json"),
            raw_series: table("rawSeries", "raw/series.json"),
            standard_person: table("standardPerson", "standard/person.json"),
            standard_video: table("standardVideo", "standard/video.json"),
            encoded_data: table("encodedData", "encoded/data.json"),
        };
        let queues = Queues {
            raw: queue("raw_q", "raw.log"),
            person: queue("person_q", "person.log"),
            video: queue("video_q", "video.log"),
            encode: queue("encode_q", "encode.log"),
        };

        for raw in [
            &tables.raw_actor,
            &tables.raw_episode,
            &tables.raw_movie,
            &tables.raw_series,
        ] {
            raw.set_handler(dispatcher.detach(Arc::clone(&queues.raw)))?;
        }
        tables
            .standard_person
            .set_handler(dispatcher.detach(Arc::clone(&queues.person)))?;
        tables
            .standard_video
            .set_handler(dispatcher.detach(Arc::clone(&queues.video)))?;

        let raw_router = TypeRouter::new()
            .route::<Person>(Arc::clone(&tables.standard_person))
            .route::<Video>(Arc::clone(&tables.standard_video))
            .route::<EncodeJob>(Arc::clone(&queues.encode))
            .route::<RawEpisode>(Arc::clone(&tables.raw_episode));
        let raw_dest = Arc::new(RawDestination::new(
            Arc::new(raw_router),
            Arc::clone(&tables.raw_episode),
        ));

        let sources = SourceRouter::new()
            .route(tables.raw_actor.name(), {
                let dest = Arc::clone(&raw_dest);
                typed::<RawActor, _>(handler_fn(move |e: Event<RawActor>| dest.actor(e)))
            })
            .route(tables.raw_movie.name(), {
                let dest = Arc::clone(&raw_dest);
                typed::<RawMovie, _>(handler_fn(move |e: Event<RawMovie>| dest.movie(e)))
            })
            .route(tables.raw_episode.name(), {
                let dest = Arc::clone(&raw_dest);
                typed::<RawEpisode, _>(handler_fn(move |e: Event<RawEpisode>| dest.episode(e)))
            })
            .route(tables.raw_series.name(), {
                let dest = Arc::clone(&raw_dest);
                typed::<RawSeries, _>(handler_fn(move |e: Event<RawSeries>| {
                    dest.split_series(e)
                }))
            });
        queues.raw.set_handler(dispatcher.detach(sources))?;

        let encode_router =
            TypeRouter::new().route::<EncodeResult>(Arc::clone(&tables.encoded_data));
        let encode_dest = EncodeDestination::new(Arc::new(encode_router));
        let encoder = typed::<EncodeJob, _>(handler_fn(move |e: Event<EncodeJob>| {
            encode_dest.encode(e)
        }));
        queues
            .encode
            .set_handler(dispatcher.detach(Delayed::new(config.encode_delay(), encoder)))?;

        info!(
            data_dir = %dir.display(),
            encode_delay_ms = config.encode_delay_ms,
            max_inflight = config.max_inflight,
            "pipeline wired"
        );

        Ok(Self {
            tables,
            queues,
            dispatcher,
        })
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn queues(&self) -> &Queues {
        &self.queues
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Look up a table by its name, e.g. `standardVideo`.
    pub fn table(&self, name: &str) -> Option<&Arc<Table>> {
        self.tables.all().into_iter().find(|t| t.name() == name)
    }

    /// The ingress endpoint called `endpoint`, e.g. `rawMovies`.
    pub fn ingress(&self, endpoint: &str) -> Option<Ingress> {
        let (name, table) = ENDPOINTS.iter().find(|(name, _)| *name == endpoint)?;
        let table = self.table(table)?;
        Some(Ingress::new(*name, Arc::clone(table), self.dispatcher.sink()))
    }

    /// Wait for every background notification to finish.
    pub async fn settle(&self) {
        self.dispatcher.drain().await;
    }
}
