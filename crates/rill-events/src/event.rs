use serde::{Deserialize, Serialize};

use crate::context::Context;

/// A `(Context, Data)` pair flowing between pipeline stages.
///
/// `T` is whatever the producing stage declares: a concrete record type on
/// typed edges, [`Payload`](crate::Payload) on open edges, or
/// `serde_json::Value` when reading a queue log back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event<T> {
    pub context: Context,
    pub data: T,
}

impl<T> Event<T> {
    pub fn new(context: Context, data: T) -> Self {
        Self { context, data }
    }

    /// Replace the payload, keeping the context.
    pub fn with_data<U>(self, data: U) -> Event<U> {
        Event {
            context: self.context,
            data,
        }
    }

    /// Transform the payload, keeping the context.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U> {
        Event {
            context: self.context,
            data: f(self.data),
        }
    }
}
