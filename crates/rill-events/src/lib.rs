//! Event envelope and handler contract for the Rill notification pipeline.
//!
//! Every stage of the pipeline exchanges [`Event`]s: a [`Context`] describing
//! the identity and provenance of one logical event, plus a data payload. A
//! [`Handler`] consumes an event and reports success or failure; the
//! [`Dispatcher`] turns any handler into a fire-and-forget stage whose outcome
//! is only visible through a [`DiagnosticSink`].
//!
//! # Key Types
//!
//! - [`Context`] -- ID, [`Status`], [`SourceChain`], authored timestamp
//! - [`Event`] -- `(Context, Data)` pair, generic over the payload type
//! - [`Payload`] -- the open payload carried between stages
//! - [`Record`] -- a concrete payload type tagged with a stable kind
//! - [`Handler`] -- synchronous `Event<T> -> PipelineResult<()>` contract
//! - [`Delayed`] -- fixed-delay wrapper
//! - [`Dispatcher`] -- bounded fire-and-forget execution

pub mod context;
pub mod diagnostic;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handler;
pub mod payload;

pub use context::{Context, SourceChain, Status};
pub use diagnostic::{diagnostic_line, DiagnosticSink, MemorySink, TracingSink};
pub use dispatch::{Detached, DispatchConfig, Dispatcher};
pub use error::{PipelineError, PipelineResult};
pub use event::Event;
pub use handler::{handler_fn, Delayed, FnHandler, Handler, SharedHandler};
pub use payload::{ErasedRecord, Payload, Record, HEX_TAG};
