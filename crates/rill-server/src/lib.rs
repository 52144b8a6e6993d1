//! HTTP ingress for the Rill catalog pipeline.
//!
//! Exposes each ingress endpoint as `POST /v1/ingest/{endpoint}` and every
//! table as `GET /v1/tables/{name}`.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::RillServer;
