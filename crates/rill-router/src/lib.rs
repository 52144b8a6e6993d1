//! Routing for the Rill notification pipeline.
//!
//! - [`SourceRouter`] dispatches on the first registered segment of an
//!   event's source chain, letting one queue carry events from many producers.
//! - [`TypeRouter`] dispatches on the [`Record`](rill_events::Record) kind of
//!   a payload; the table of kinds is built explicitly at wiring time.
//! - [`Typed`] is the coercion adapter: the single point where an open
//!   [`Payload`](rill_events::Payload) becomes a concrete type.

pub mod coerce;
pub mod source;
pub mod types;

pub use coerce::{typed, Typed};
pub use source::SourceRouter;
pub use types::TypeRouter;
