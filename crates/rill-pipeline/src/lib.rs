//! A media-catalog notification graph built from Rill components.
//!
//! Raw actor, movie, and series records arrive through [`Ingress`]
//! endpoints, land in raw tables, and flow through the `raw_q` queue into a
//! source router. Transforms reshape them into people, videos, and encode
//! jobs; a delayed encode stage turns jobs into encoded results.
//!
//! ```text
//! ingress -> raw tables -> raw_q -> source router -> transforms
//!                                          |
//!        standardPerson / standardVideo <--+--> encode_q -> (delay) -> encodedData
//!                 rawEpisode <-------------+
//! ```

pub mod config;
pub mod ingress;
pub mod records;
pub mod transforms;
pub mod wiring;

pub use config::PipelineConfig;
pub use ingress::{Ingress, IngressReceipt};
pub use records::{
    EncodeJob, EncodeResult, Person, RawActor, RawEpisode, RawMovie, RawSeries, SeriesEpisode,
    Video,
};
pub use transforms::{EncodeDestination, RawDestination};
pub use wiring::{Pipeline, Queues, Tables};
