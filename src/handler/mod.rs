//! Handler layer - erased exchange handlers and the route table.
//!
//! Provides:
//! - per-mode call traits ([`OneWayCall`], [`RequestOneCall`],
//!   [`RequestManyCall`], [`RequestStreamCall`]) that the dispatch engine
//!   invokes through
//! - [`ExchangeHandler`] - the tagged handler a route registers
//! - [`RouteTable`] - path to handler resolution
//!
//! Typed closures are adapted into the erased traits by the adapters in
//! [`typed`]; payload decoding happens inside the adapter, where the
//! parameter type is known, using the converter the engine resolved from
//! the exchange's envelope.
//!
//! # Example
//!
//! ```
//! use routewire::handler::ExchangeHandler;
//!
//! // A request/one handler: decoded argument in, one value out.
//! let handler = ExchangeHandler::request_one(|n: i32| async move { Ok(n + 1) });
//! assert_eq!(handler.mode(), routewire::route::ExchangeMode::RequestOne);
//! ```

mod registry;
pub mod typed;

pub use registry::{RegisteredRoute, RouteTable};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{Future, Stream};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::converter::Converter;
use crate::error::Result;
use crate::route::ExchangeMode;
use crate::transport::PayloadStream;

use typed::{OneWayHandler, RequestManyHandler, RequestOneHandler, RequestStreamHandler};

/// Fire-and-forget handler entry point.
pub trait OneWayCall: Send + Sync + 'static {
    /// Decode the argument and start the handler.
    ///
    /// An `Err` here is a pre-invocation failure (decode) and is surfaced
    /// to the caller. The returned future runs the handler itself; its
    /// failure has no channel back and is swallowed by the engine.
    fn call(&self, converter: &Converter, payload: Bytes) -> Result<BoxFuture<'static, Result<()>>>;
}

/// Request/single-response handler entry point.
pub trait RequestOneCall: Send + Sync + 'static {
    /// Decode, invoke, await one value, encode it.
    fn call(&self, converter: &Converter, payload: Bytes) -> BoxFuture<'static, Result<Bytes>>;
}

/// Request/response-stream handler entry point.
pub trait RequestManyCall: Send + Sync + 'static {
    /// Decode one argument, return the handler's output sequence with
    /// each value encoded in production order.
    fn call(&self, converter: &Converter, payload: Bytes) -> PayloadStream;
}

/// Bidirectional-stream handler entry point.
pub trait RequestStreamCall: Send + Sync + 'static {
    /// Feed every inbound frame (first included) through the converter as
    /// one input element; return the handler's encoded output sequence.
    fn call(&self, converter: &Converter, inbound: PayloadStream) -> PayloadStream;
}

/// A registered handler, tagged by its exchange mode.
pub enum ExchangeHandler {
    /// Fire-and-forget.
    OneWay(Box<dyn OneWayCall>),
    /// Request/single-response.
    RequestOne(Box<dyn RequestOneCall>),
    /// Request/response-stream.
    RequestMany(Box<dyn RequestManyCall>),
    /// Bidirectional stream.
    RequestStream(Box<dyn RequestStreamCall>),
}

impl ExchangeHandler {
    /// Adapt a `Fn(T) -> Future<Result<()>>` closure as a one-way handler.
    pub fn one_way<F, T, Fut>(handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        ExchangeHandler::OneWay(Box::new(OneWayHandler::new(handler)))
    }

    /// Adapt a `Fn(T) -> Future<Result<R>>` closure as a request/one handler.
    pub fn request_one<F, T, R, Fut>(handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        ExchangeHandler::RequestOne(Box::new(RequestOneHandler::new(handler)))
    }

    /// Adapt a `Fn(T) -> Stream<Result<R>>` closure as a request/many handler.
    pub fn request_many<F, T, R, S>(handler: F) -> Self
    where
        F: Fn(T) -> S + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        S: Stream<Item = Result<R>> + Send + 'static,
    {
        ExchangeHandler::RequestMany(Box::new(RequestManyHandler::new(handler)))
    }

    /// Adapt a stream-transforming closure as a request/stream handler.
    ///
    /// The closure receives the decoded input sequence and returns the
    /// output sequence; input and output are independently ordered.
    pub fn request_stream<F, T, R, S>(handler: F) -> Self
    where
        F: Fn(futures::stream::BoxStream<'static, Result<T>>) -> S + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        S: Stream<Item = Result<R>> + Send + 'static,
    {
        ExchangeHandler::RequestStream(Box::new(RequestStreamHandler::new(handler)))
    }

    /// Exchange mode this handler serves.
    pub fn mode(&self) -> ExchangeMode {
        match self {
            ExchangeHandler::OneWay(_) => ExchangeMode::OneWay,
            ExchangeHandler::RequestOne(_) => ExchangeMode::RequestOne,
            ExchangeHandler::RequestMany(_) => ExchangeMode::RequestMany,
            ExchangeHandler::RequestStream(_) => ExchangeMode::RequestStream,
        }
    }
}

impl std::fmt::Debug for ExchangeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ExchangeHandler").field(&self.mode()).finish()
    }
}
