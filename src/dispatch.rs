//! Dispatch engine - per-exchange routing and mode-specific protocol logic.
//!
//! The [`Dispatcher`] is the server side of the core. A transport hands it
//! one inbound exchange at a time through the entry point matching the
//! exchange's shape; the engine decodes the metadata envelope, resolves
//! the route and converter, decodes the payload, invokes the handler
//! under its mode's contract, and encodes the result frames.
//!
//! The engine carries no state between exchanges. The route table and
//! converter registry are built once by [`DispatcherBuilder`] and shared
//! read-only behind `Arc`, so concurrent exchanges never contend.
//!
//! # Example
//!
//! ```
//! use routewire::dispatch::Dispatcher;
//! use futures::stream;
//!
//! let dispatcher = Dispatcher::builder()
//!     .request_one("/echo", "application/json", |s: String| async move { Ok(s) })
//!     .request_many("/count", "application/json", |n: i32| {
//!         stream::iter((0..n).map(Ok))
//!     })
//!     .build()
//!     .unwrap();
//! # let _ = dispatcher;
//! ```

use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, Future, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::converter::{Converter, ConverterRegistry};
use crate::error::{Result, RoutewireError};
use crate::handler::{ExchangeHandler, RegisteredRoute, RouteTable};
use crate::route::{Envelope, ExchangeMode, RouteMetadata};
use crate::transport::{ExchangePayload, FrameStream, PayloadStream};

/// Builder collecting route registrations and converters.
///
/// Registration problems (duplicate paths, invalid metadata) are reported
/// by [`build`](DispatcherBuilder::build): the engine refuses to start
/// rather than silently shadowing a handler.
#[derive(Default)]
pub struct DispatcherBuilder {
    registrations: Vec<(RouteMetadata, ExchangeHandler)>,
    converters: ConverterRegistry,
}

impl DispatcherBuilder {
    /// Create a builder with the default converters registered.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            converters: ConverterRegistry::with_defaults(),
        }
    }

    /// Register an additional payload converter.
    pub fn converter(mut self, converter: Converter) -> Self {
        self.converters.register(converter);
        self
    }

    /// Register a fire-and-forget handler.
    pub fn one_way<F, T, Fut>(self, path: &str, content_type: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(
            RouteMetadata::new(path, content_type, ExchangeMode::OneWay),
            ExchangeHandler::one_way(handler),
        )
    }

    /// Register a request/single-response handler.
    pub fn request_one<F, T, R, Fut>(self, path: &str, content_type: &str, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        self.register(
            RouteMetadata::new(path, content_type, ExchangeMode::RequestOne),
            ExchangeHandler::request_one(handler),
        )
    }

    /// Register a request/response-stream handler.
    pub fn request_many<F, T, R, S>(self, path: &str, content_type: &str, handler: F) -> Self
    where
        F: Fn(T) -> S + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        S: Stream<Item = Result<R>> + Send + 'static,
    {
        self.register(
            RouteMetadata::new(path, content_type, ExchangeMode::RequestMany),
            ExchangeHandler::request_many(handler),
        )
    }

    /// Register a bidirectional-stream handler.
    pub fn request_stream<F, T, R, S>(self, path: &str, content_type: &str, handler: F) -> Self
    where
        F: Fn(futures::stream::BoxStream<'static, Result<T>>) -> S + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        S: Stream<Item = Result<R>> + Send + 'static,
    {
        self.register(
            RouteMetadata::new(path, content_type, ExchangeMode::RequestStream),
            ExchangeHandler::request_stream(handler),
        )
    }

    /// Register a pre-built (metadata, handler) pair, e.g. from an
    /// external handler-discovery step.
    pub fn register(mut self, metadata: RouteMetadata, handler: ExchangeHandler) -> Self {
        self.registrations.push((metadata, handler));
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid or duplicate registration, in
    /// registration order.
    pub fn build(self) -> Result<Dispatcher> {
        let mut table = RouteTable::new();
        for (metadata, handler) in self.registrations {
            table.register(metadata, handler)?;
        }
        Ok(Dispatcher {
            routes: Arc::new(table),
            converters: Arc::new(self.converters),
        })
    }
}

/// The exchange-mode dispatch engine.
///
/// Cheap to clone; clones share the same route table and converters.
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    converters: Arc<ConverterRegistry>,
}

impl Dispatcher {
    /// Create a new dispatcher builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Number of registered routes.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Envelope → route → converter resolution, shared by all modes.
    fn resolve(&self, metadata: &[u8]) -> Result<(Arc<RegisteredRoute>, Converter)> {
        let envelope = Envelope::decode(metadata)?;
        let route = self.routes.resolve(envelope.path())?;
        let converter = self.converters.converter_for(envelope.mime_type())?.clone();
        Ok((route, converter))
    }

    /// Handle a fire-and-forget exchange: one frame in, nothing out.
    ///
    /// Failures before the handler runs (envelope, route, converter,
    /// decode) are returned to the caller. Once the handler is invoked
    /// there is no return channel; its failure is logged and swallowed.
    pub async fn fire_and_forget(&self, frame: ExchangePayload) -> Result<()> {
        let (route, converter) = self.resolve(frame.require_metadata()?)?;
        let handler = match route.handler() {
            ExchangeHandler::OneWay(h) => h,
            _ => return Err(mode_mismatch(route.metadata(), ExchangeMode::OneWay)),
        };

        let invocation = handler.call(&converter, frame.data)?;
        if let Err(e) = invocation.await {
            tracing::warn!(path = route.metadata().path(), error = %e, "one-way handler failed");
        }
        Ok(())
    }

    /// Handle a request/single-response exchange: one frame in, one out.
    pub async fn request_one(&self, frame: ExchangePayload) -> Result<Bytes> {
        let (route, converter) = self.resolve(frame.require_metadata()?)?;
        match route.handler() {
            ExchangeHandler::RequestOne(h) => h.call(&converter, frame.data).await,
            _ => Err(mode_mismatch(route.metadata(), ExchangeMode::RequestOne)),
        }
    }

    /// Handle a request/response-stream exchange: one frame in, zero or
    /// more out, in the handler's production order.
    ///
    /// Resolution errors surface as the stream's single error item.
    /// Dropping the returned stream cancels the handler's sequence.
    pub fn request_many(&self, frame: ExchangePayload) -> PayloadStream {
        let resolved = frame
            .require_metadata()
            .and_then(|metadata| self.resolve(metadata));
        let (route, converter) = match resolved {
            Ok(r) => r,
            Err(e) => return error_stream(e),
        };

        match route.handler() {
            ExchangeHandler::RequestMany(h) => h.call(&converter, frame.data),
            _ => error_stream(mode_mismatch(route.metadata(), ExchangeMode::RequestMany)),
        }
    }

    /// Handle a bidirectional-stream exchange.
    ///
    /// The FIRST inbound frame carries the envelope and, deliberately,
    /// also the first payload element: it is decoded with the route's
    /// converter like every later frame, so nothing the peer sends is
    /// skipped. The handler's output defines any inbound/outbound
    /// ordering relationship; the engine imposes none.
    pub fn request_stream(&self, inbound: FrameStream) -> PayloadStream {
        let routes = Arc::clone(&self.routes);
        let converters = Arc::clone(&self.converters);

        let setup = async move {
            let mut inbound = inbound;
            let first = inbound.next().await.ok_or_else(|| {
                RoutewireError::Envelope("stream exchange ended before its first frame".to_string())
            })?;

            let envelope = Envelope::decode(first.require_metadata()?)?;
            let route = routes.resolve(envelope.path())?;
            let converter = converters.converter_for(envelope.mime_type())?.clone();
            let handler = match route.handler() {
                ExchangeHandler::RequestStream(h) => h,
                _ => return Err(mode_mismatch(route.metadata(), ExchangeMode::RequestStream)),
            };

            let payloads = stream::once(async move { Ok(first.data) })
                .chain(inbound.map(|frame| Ok(frame.data)))
                .boxed();
            Ok(handler.call(&converter, payloads))
        };

        stream::once(setup).try_flatten().boxed()
    }
}

fn mode_mismatch(route: &RouteMetadata, invoked: ExchangeMode) -> RoutewireError {
    RoutewireError::ExchangeModeMismatch {
        path: route.path().to_string(),
        registered: route.mode(),
        invoked,
    }
}

fn error_stream(error: RoutewireError) -> PayloadStream {
    stream::once(async move { Err(error) }).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct User {
        name: String,
        favorite_color: String,
    }

    fn envelope_bytes(path: &str, mime_type: &str) -> Bytes {
        Envelope::new(path, mime_type).encode().unwrap()
    }

    fn json_frame(path: &str, payload: &[u8]) -> ExchangePayload {
        ExchangePayload::with_metadata(
            envelope_bytes(path, "application/json"),
            Bytes::copy_from_slice(payload),
        )
    }

    #[tokio::test]
    async fn test_one_way_invokes_handler_exactly_once() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        let dispatcher = Dispatcher::builder()
            .one_way("/oneway", "application/json", move |_: User| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let payload = br#"{"name":"Mary","favorite_color":"blue"}"#;
        dispatcher
            .fire_and_forget(json_frame("/oneway", payload))
            .await
            .unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_way_handler_failure_is_swallowed() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        let dispatcher = Dispatcher::builder()
            .one_way("/oneway", "application/json", move |_: i32| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(RoutewireError::handler("internal failure"))
                }
            })
            .build()
            .unwrap();

        // The handler ran and failed, but fire-and-forget still reports Ok.
        let result = dispatcher.fire_and_forget(json_frame("/oneway", b"1")).await;
        assert!(result.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_way_unknown_content_type_fails_before_invocation() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();
        let dispatcher = Dispatcher::builder()
            .one_way("/oneway", "application/json", move |_: i32| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .build()
            .unwrap();

        let frame = ExchangePayload::with_metadata(
            envelope_bytes("/oneway", "application/binary"),
            Bytes::from_static(b"1"),
        );
        let result = dispatcher.fire_and_forget(frame).await;

        assert!(matches!(result, Err(RoutewireError::ConverterNotFound(_))));
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_way_decode_error_is_surfaced() {
        let dispatcher = Dispatcher::builder()
            .one_way("/oneway", "application/json", |_: i32| async { Ok(()) })
            .build()
            .unwrap();

        let result = dispatcher
            .fire_and_forget(json_frame("/oneway", b"not a number"))
            .await;
        assert!(matches!(result, Err(RoutewireError::Json(_))));
    }

    #[tokio::test]
    async fn test_request_one_red_becomes_blue() {
        let dispatcher = Dispatcher::builder()
            .request_one("/redblue", "application/json", |mut user: User| async move {
                user.favorite_color = "blue".to_string();
                Ok(user)
            })
            .build()
            .unwrap();

        let payload = br#"{"name":"Mary","favorite_color":"red"}"#;
        let response = dispatcher
            .request_one(json_frame("/redblue", payload))
            .await
            .unwrap();

        let user: User = serde_json::from_slice(&response).unwrap();
        assert_eq!(user.name, "Mary");
        assert_eq!(user.favorite_color, "blue");
    }

    #[tokio::test]
    async fn test_request_one_unknown_path() {
        let dispatcher = Dispatcher::builder()
            .request_one("/redblue", "application/json", |user: User| async move { Ok(user) })
            .build()
            .unwrap();

        let result = dispatcher.request_one(json_frame("/notfound", b"{}")).await;
        assert!(matches!(
            result,
            Err(RoutewireError::RouteNotFound(path)) if path == "/notfound"
        ));
    }

    #[tokio::test]
    async fn test_request_one_missing_metadata() {
        let dispatcher = Dispatcher::builder()
            .request_one("/a", "application/json", |n: i32| async move { Ok(n) })
            .build()
            .unwrap();

        let frame = ExchangePayload::data_only(Bytes::from_static(b"1"));
        let result = dispatcher.request_one(frame).await;
        assert!(matches!(result, Err(RoutewireError::Envelope(_))));
    }

    #[tokio::test]
    async fn test_request_one_malformed_envelope() {
        let dispatcher = Dispatcher::builder()
            .request_one("/a", "application/json", |n: i32| async move { Ok(n) })
            .build()
            .unwrap();

        let frame = ExchangePayload::with_metadata(
            Bytes::from_static(b"{\"PATH\":\"/a\"}"), // MIME_TYPE missing
            Bytes::from_static(b"1"),
        );
        let result = dispatcher.request_one(frame).await;
        assert!(matches!(result, Err(RoutewireError::Envelope(_))));
    }

    #[tokio::test]
    async fn test_mode_mismatch_rejected() {
        let dispatcher = Dispatcher::builder()
            .one_way("/oneway", "application/json", |_: i32| async { Ok(()) })
            .build()
            .unwrap();

        let result = dispatcher.request_one(json_frame("/oneway", b"1")).await;
        assert!(matches!(
            result,
            Err(RoutewireError::ExchangeModeMismatch {
                registered: ExchangeMode::OneWay,
                invoked: ExchangeMode::RequestOne,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_request_many_counting_sequence() {
        let dispatcher = Dispatcher::builder()
            .request_many("/count", "application/json", |n: i32| {
                stream::iter((0..n).map(Ok))
            })
            .build()
            .unwrap();

        let frames: Vec<_> = dispatcher
            .request_many(json_frame("/count", b"10"))
            .collect()
            .await;

        assert_eq!(frames.len(), 10);
        let values: Vec<i32> = frames
            .into_iter()
            .map(|f| serde_json::from_slice(&f.unwrap()).unwrap())
            .collect();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_request_many_resolution_error_is_single_error_item() {
        let dispatcher = Dispatcher::builder()
            .request_many("/count", "application/json", |n: i32| {
                stream::iter((0..n).map(Ok))
            })
            .build()
            .unwrap();

        let frames: Vec<_> = dispatcher
            .request_many(json_frame("/nope", b"10"))
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert!(matches!(frames[0], Err(RoutewireError::RouteNotFound(_))));
    }

    #[tokio::test]
    async fn test_request_stream_first_frame_is_also_first_element() {
        let dispatcher = Dispatcher::builder()
            .request_stream("/plusone", "application/json", |input: futures::stream::BoxStream<'static, Result<i32>>| {
                input.map(|item| item.map(|n| n + 1))
            })
            .build()
            .unwrap();

        let mut frames = vec![json_frame("/plusone", b"0")];
        frames.extend((1..10).map(|n| ExchangePayload::data_only(Bytes::from(n.to_string()))));

        let out: Vec<_> = dispatcher
            .request_stream(stream::iter(frames).boxed())
            .collect()
            .await;

        assert_eq!(out.len(), 10);
        let values: Vec<i32> = out
            .into_iter()
            .map(|f| serde_json::from_slice(&f.unwrap()).unwrap())
            .collect();
        assert_eq!(values, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_request_stream_empty_exchange_is_envelope_error() {
        let dispatcher = Dispatcher::builder()
            .request_stream("/s", "application/json", |input: futures::stream::BoxStream<'static, Result<i32>>| input)
            .build()
            .unwrap();

        let out: Vec<_> = dispatcher
            .request_stream(stream::empty().boxed())
            .collect()
            .await;

        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(RoutewireError::Envelope(_))));
    }

    #[test]
    fn test_duplicate_route_fails_build() {
        let result = Dispatcher::builder()
            .one_way("/dup", "application/json", |_: i32| async { Ok(()) })
            .request_one("/dup", "application/json", |n: i32| async move { Ok(n) })
            .build();

        assert!(matches!(
            result,
            Err(RoutewireError::DuplicateRoute(path)) if path == "/dup"
        ));
    }

    #[test]
    fn test_builder_registers_custom_converter() {
        let dispatcher = Dispatcher::builder()
            .converter(Converter::json_as("application/vnd.example+json"))
            .request_one("/a", "application/vnd.example+json", |n: i32| async move { Ok(n) })
            .build()
            .unwrap();

        assert_eq!(dispatcher.route_count(), 1);
    }

    #[tokio::test]
    async fn test_native_payloads_dispatch() {
        let dispatcher = Dispatcher::builder()
            .request_one("/users", "application/x-rust-native", |user: User| async move { Ok(user) })
            .build()
            .unwrap();

        let native = Converter::native();
        let user = User {
            name: "Mary".to_string(),
            favorite_color: "blue".to_string(),
        };
        let frame = ExchangePayload::with_metadata(
            envelope_bytes("/users", "application/x-rust-native"),
            Bytes::from(native.encode(&user).unwrap()),
        );

        let response = dispatcher.request_one(frame).await.unwrap();
        let decoded: User = native.decode(&response).unwrap();
        assert_eq!(decoded, user);
    }

    #[tokio::test]
    async fn test_dropping_request_many_stream_stops_the_producer() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let dispatcher = Dispatcher::builder()
            .request_many("/count", "application/json", move |n: i32| {
                let counter = counter.clone();
                stream::iter(0..n).map(move |i| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
            .build()
            .unwrap();

        let mut frames = dispatcher.request_many(json_frame("/count", b"1000"));
        let first = frames.next().await.unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<i32>(&first).unwrap(), 0);
        drop(frames);

        // Pull-based: only the polled element was ever produced.
        assert_eq!(produced.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dropping_request_stream_output_stops_consuming_input() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let dispatcher = Dispatcher::builder()
            .request_stream(
                "/echo",
                "application/json",
                |input: futures::stream::BoxStream<'static, Result<i32>>| input,
            )
            .build()
            .unwrap();

        // Endless inbound exchange; each pull past the first frame counts.
        let inbound = stream::once(async { json_frame("/echo", b"0") })
            .chain(stream::repeat_with(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ExchangePayload::data_only(Bytes::from_static(b"1"))
            }))
            .boxed();

        let mut out = dispatcher.request_stream(inbound);
        for _ in 0..3 {
            out.next().await.unwrap().unwrap();
        }
        drop(out);

        assert!(pulled.load(Ordering::SeqCst) <= 3);
    }
}
