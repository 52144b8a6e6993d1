use std::any::Any;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};

/// A concrete payload type with a stable kind tag.
///
/// The tag is what the type router dispatches on, so it must be unique among
/// the records registered with one router.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;
}

/// Object-safe view of a [`Record`] carried inside a [`Payload`].
pub trait ErasedRecord: Any + Send + Sync {
    fn kind(&self) -> &'static str;
    fn to_json(&self) -> serde_json::Result<Value>;
    fn as_any(&self) -> &dyn Any;
}

impl<R: Record> ErasedRecord for R {
    fn kind(&self) -> &'static str {
        R::KIND
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Open payload exchanged on untyped pipeline edges.
///
/// Typed handlers never see this directly; the coercion adapter in
/// `rill-router` is the one place a payload becomes a concrete type.
pub enum Payload {
    /// An in-process value of a known record kind.
    Record(Arc<dyn ErasedRecord>),
    /// Decoded generic JSON.
    Json(Value),
    /// Raw serialized bytes (what queues forward).
    Bytes(Bytes),
    /// A string whose content is structured data.
    Text(String),
    /// A byte source yet to be read.
    Stream(Box<dyn Read + Send>),
}

impl Payload {
    /// Wrap a concrete record.
    pub fn record<R: Record>(record: R) -> Self {
        Self::Record(Arc::new(record))
    }

    /// Human-readable name of the dynamic shape, used in error messages.
    pub fn shape(&self) -> String {
        match self {
            Self::Record(r) => format!("record:{}", r.kind()),
            Self::Json(_) => "json".into(),
            Self::Bytes(_) => "bytes".into(),
            Self::Text(_) => "text".into(),
            Self::Stream(_) => "stream".into(),
        }
    }

    /// The record kind, if this payload is a tagged record.
    pub fn kind(&self) -> Option<&'static str> {
        match self {
            Self::Record(r) => Some(r.kind()),
            _ => None,
        }
    }

    /// Borrow the payload as `R` when it already is one.
    pub fn downcast_ref<R: Record>(&self) -> Option<&R> {
        match self {
            Self::Record(r) => r.as_any().downcast_ref::<R>(),
            _ => None,
        }
    }

    /// Normalize into a canonical byte sequence.
    ///
    /// Bytes pass through untouched; text keeps its content; everything else
    /// is serialized as JSON. Streams are read to the end.
    pub fn into_bytes(self) -> PipelineResult<Bytes> {
        match self {
            Self::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map_err(PipelineError::Stream)?;
                Ok(Bytes::from(buf))
            }
            other => other.to_bytes(),
        }
    }

    /// [`into_bytes`](Self::into_bytes) without consuming the payload.
    /// Fails for streams, which can only be read once.
    pub fn to_bytes(&self) -> PipelineResult<Bytes> {
        match self {
            Self::Bytes(b) => Ok(b.clone()),
            Self::Text(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            Self::Json(v) => serde_json::to_vec(v)
                .map(Bytes::from)
                .map_err(PipelineError::Encode),
            Self::Record(r) => {
                let value = r.to_json().map_err(PipelineError::Encode)?;
                serde_json::to_vec(&value)
                    .map(Bytes::from)
                    .map_err(PipelineError::Encode)
            }
            Self::Stream(_) => Err(PipelineError::UnsupportedPayloadShape {
                shape: self.shape(),
            }),
        }
    }

    /// Decode into generic JSON. Empty bytes or text decode to `null`.
    pub fn into_value(self) -> PipelineResult<Value> {
        match self {
            Self::Json(v) => Ok(v),
            Self::Record(r) => r.to_json().map_err(PipelineError::Encode),
            Self::Bytes(b) if b.is_empty() => Ok(Value::Null),
            Self::Bytes(b) => serde_json::from_slice(&b).map_err(PipelineError::Decode),
            Self::Text(s) if s.is_empty() => Ok(Value::Null),
            Self::Text(s) => serde_json::from_str(&s).map_err(PipelineError::Decode),
            Self::Stream(reader) => serde_json::from_reader(reader).map_err(PipelineError::Decode),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Record(r) => f.debug_tuple("Record").field(&r.kind()).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Key under which non-JSON bytes are hex-encoded when a payload is serialized.
pub const HEX_TAG: &str = "$hex";

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{Error, SerializeMap};
        match self {
            Self::Record(r) => r.to_json().map_err(S::Error::custom)?.serialize(serializer),
            Self::Json(v) => v.serialize(serializer),
            // Bytes holding JSON are embedded as-is so logs stay readable.
            // Anything else goes under a hex tag: a plain string would be lossy
            // for non-UTF-8 input and indistinguishable from a JSON string.
            Self::Bytes(b) => match serde_json::from_slice::<Value>(b) {
                Ok(v) => v.serialize(serializer),
                Err(_) => {
                    let mut map = serializer.serialize_map(Some(1))?;
                    map.serialize_entry(HEX_TAG, &hex::encode(b))?;
                    map.end()
                }
            },
            Self::Text(s) => serializer.serialize_str(s),
            Self::Stream(_) => Err(S::Error::custom("stream payloads must be read before encoding")),
        }
    }
}

impl From<Value> for Payload {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(b))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
