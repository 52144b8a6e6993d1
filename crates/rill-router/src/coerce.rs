use std::marker::PhantomData;

use rill_events::{Event, Handler, Payload, PipelineError, PipelineResult};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Coercion adapter from an open [`Payload`] to a concrete type `D`.
///
/// Conversion policy:
/// 1. a record that already is a `D` is used as-is, without parsing;
/// 2. bytes are parsed as JSON into `D`;
/// 3. text is parsed as JSON into `D`;
/// 4. a stream is decoded as JSON into `D`;
/// 5. decoded generic JSON is converted into `D`.
///
/// A record of any other kind fails with
/// [`PipelineError::UnsupportedPayloadShape`]. The wrapped handler is only
/// invoked once conversion succeeded.
pub struct Typed<D, H> {
    inner: H,
    _target: PhantomData<fn() -> D>,
}

/// Wrap a typed handler so it accepts open payloads.
pub fn typed<D, H>(handler: H) -> Typed<D, H>
where
    D: DeserializeOwned + Clone + 'static,
    H: Handler<D>,
{
    Typed {
        inner: handler,
        _target: PhantomData,
    }
}

impl<D, H> Typed<D, H>
where
    D: DeserializeOwned + Clone + 'static,
{
    fn coerce(payload: Payload) -> PipelineResult<D> {
        match payload {
            Payload::Record(record) => match record.as_any().downcast_ref::<D>() {
                Some(value) => Ok(value.clone()),
                None => Err(PipelineError::UnsupportedPayloadShape {
                    shape: format!("record:{}", record.kind()),
                }),
            },
            Payload::Bytes(bytes) => serde_json::from_slice(&bytes).map_err(PipelineError::Decode),
            Payload::Text(text) => serde_json::from_str(&text).map_err(PipelineError::Decode),
            Payload::Stream(reader) => serde_json::from_reader(reader).map_err(PipelineError::Decode),
            Payload::Json(value) => serde_json::from_value(value).map_err(PipelineError::Decode),
        }
    }
}

impl<D, H> Handler<Payload> for Typed<D, H>
where
    D: DeserializeOwned + Clone + 'static,
    H: Handler<D>,
{
    fn handle(&self, event: Event<Payload>) -> PipelineResult<()> {
        let Event { context, data } = event;
        let shape = data.shape();
        let data = Self::coerce(data)?;
        debug!(id = %context.id, from = %shape, to = std::any::type_name::<D>(), "payload coerced");
        self.inner.handle(Event::new(context, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rill_events::{handler_fn, Context, Record, Status};
    use serde::{Deserialize, Deserializer, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Movie {
        title: String,
    }

    impl Record for Movie {
        const KIND: &'static str = "movie";
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Person {
        name: String,
    }

    impl Record for Person {
        const KIND: &'static str = "person";
    }

    /// Serializable, but refuses every deserialization attempt.
    #[derive(Clone, Debug, PartialEq, Serialize)]
    struct Sealed(u32);

    impl<'de> Deserialize<'de> for Sealed {
        fn deserialize<De: Deserializer<'de>>(_: De) -> Result<Self, De::Error> {
            Err(serde::de::Error::custom("sealed values are never parsed"))
        }
    }

    impl Record for Sealed {
        const KIND: &'static str = "sealed";
    }

    fn event(data: Payload) -> Event<Payload> {
        Event::new(Context::now("m1", Status::Active, "rawMovie:raw_q"), data)
    }

    fn capture<D: Clone + Send + 'static>() -> (Arc<Mutex<Vec<D>>>, impl Handler<D>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = handler_fn(move |e: Event<D>| {
            sink.lock().unwrap().push(e.data);
            Ok(())
        });
        (seen, handler)
    }

    #[test]
    fn matching_record_bypasses_parsing() {
        let (seen, handler) = capture::<Sealed>();
        let adapter = typed::<Sealed, _>(handler);
        adapter.handle(event(Payload::record(Sealed(7)))).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Sealed(7)]);
    }

    #[test]
    fn bytes_text_stream_and_json_are_parsed() {
        let (seen, handler) = capture::<Movie>();
        let adapter = typed::<Movie, _>(handler);

        adapter
            .handle(event(Payload::Bytes(Bytes::from_static(br#"{"title":"a"}"#))))
            .unwrap();
        adapter
            .handle(event(Payload::Text(r#"{"title":"b"}"#.into())))
            .unwrap();
        adapter
            .handle(event(Payload::Stream(Box::new(std::io::Cursor::new(
                br#"{"title":"c"}"#.to_vec(),
            )))))
            .unwrap();
        adapter
            .handle(event(Payload::Json(serde_json::json!({"title": "d"}))))
            .unwrap();

        let titles: Vec<String> = seen.lock().unwrap().iter().map(|m| m.title.clone()).collect();
        assert_eq!(titles, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn malformed_bytes_never_reach_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let adapter = typed::<Movie, _>(handler_fn(move |_e: Event<Movie>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let err = adapter
            .handle(event(Payload::Bytes(Bytes::from_static(b"{not json"))))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn foreign_record_is_an_unsupported_shape() {
        let (seen, handler) = capture::<Movie>();
        let adapter = typed::<Movie, _>(handler);
        let err = adapter
            .handle(event(Payload::record(Person { name: "Ada".into() })))
            .unwrap_err();
        match err {
            PipelineError::UnsupportedPayloadShape { shape } => assert_eq!(shape, "record:person"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn context_is_carried_through() {
        let contexts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&contexts);
        let adapter = typed::<Movie, _>(handler_fn(move |e: Event<Movie>| {
            sink.lock().unwrap().push(e.context);
            Ok(())
        }));
        let input = event(Payload::record(Movie { title: "Foo".into() }));
        let expected = input.context.clone();
        adapter.handle(input).unwrap();
        assert_eq!(contexts.lock().unwrap()[0], expected);
    }
}
