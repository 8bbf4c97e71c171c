//! Typed adapters that erase handler closures behind the call traits.
//!
//! Each adapter pairs a user closure with the decode/encode steps for its
//! exchange mode. The converter is supplied per call by the engine (it is
//! resolved from the exchange's envelope, not fixed at registration), and
//! cloned into the returned future/stream so the exchange owns everything
//! it needs for its lifetime.

use std::marker::PhantomData;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{stream, Future, FutureExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::converter::Converter;
use crate::error::Result;
use crate::transport::PayloadStream;

use super::{OneWayCall, RequestManyCall, RequestOneCall, RequestStreamCall};

/// Fire-and-forget adapter: `Fn(T) -> Future<Result<()>>`.
pub struct OneWayHandler<F, T, Fut> {
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> OneWayHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    /// Create a new one-way adapter.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> OneWayCall for OneWayHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn call(&self, converter: &Converter, payload: Bytes) -> Result<BoxFuture<'static, Result<()>>> {
        // Decode failures happen before invocation and are surfaced.
        let argument: T = converter.decode(&payload)?;
        Ok((self.handler)(argument).boxed())
    }
}

/// Request/single-response adapter: `Fn(T) -> Future<Result<R>>`.
pub struct RequestOneHandler<F, T, R, Fut> {
    handler: F,
    _phantom: PhantomData<fn(T) -> (R, Fut)>,
}

impl<F, T, R, Fut> RequestOneHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    /// Create a new request/one adapter.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, R, Fut> RequestOneCall for RequestOneHandler<F, T, R, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    fn call(&self, converter: &Converter, payload: Bytes) -> BoxFuture<'static, Result<Bytes>> {
        let argument: T = match converter.decode(&payload) {
            Ok(v) => v,
            Err(e) => return async move { Err(e) }.boxed(),
        };

        let converter = converter.clone();
        let fut = (self.handler)(argument);
        async move {
            let value = fut.await?;
            Ok(Bytes::from(converter.encode(&value)?))
        }
        .boxed()
    }
}

/// Request/response-stream adapter: `Fn(T) -> Stream<Result<R>>`.
pub struct RequestManyHandler<F, T, R, S> {
    handler: F,
    _phantom: PhantomData<fn(T) -> (R, S)>,
}

impl<F, T, R, S> RequestManyHandler<F, T, R, S>
where
    F: Fn(T) -> S + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    S: Stream<Item = Result<R>> + Send + 'static,
{
    /// Create a new request/many adapter.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, R, S> RequestManyCall for RequestManyHandler<F, T, R, S>
where
    F: Fn(T) -> S + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    S: Stream<Item = Result<R>> + Send + 'static,
{
    fn call(&self, converter: &Converter, payload: Bytes) -> PayloadStream {
        let argument: T = match converter.decode(&payload) {
            Ok(v) => v,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let converter = converter.clone();
        (self.handler)(argument)
            .map(move |item| item.and_then(|value| Ok(Bytes::from(converter.encode(&value)?))))
            .boxed()
    }
}

/// Bidirectional-stream adapter:
/// `Fn(BoxStream<Result<T>>) -> Stream<Result<R>>`.
pub struct RequestStreamHandler<F, T, R, S> {
    handler: F,
    _phantom: PhantomData<fn(T) -> (R, S)>,
}

impl<F, T, R, S> RequestStreamHandler<F, T, R, S>
where
    F: Fn(BoxStream<'static, Result<T>>) -> S + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    S: Stream<Item = Result<R>> + Send + 'static,
{
    /// Create a new request/stream adapter.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, R, S> RequestStreamCall for RequestStreamHandler<F, T, R, S>
where
    F: Fn(BoxStream<'static, Result<T>>) -> S + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    S: Stream<Item = Result<R>> + Send + 'static,
{
    fn call(&self, converter: &Converter, inbound: PayloadStream) -> PayloadStream {
        // Every inbound frame decodes with the element type T; frame
        // errors from the transport pass through as input errors.
        let decoder = converter.clone();
        let input = inbound
            .map(move |frame| frame.and_then(|bytes| decoder.decode::<T>(&bytes)))
            .boxed();

        let encoder = converter.clone();
        (self.handler)(input)
            .map(move |item| item.and_then(|value| Ok(Bytes::from(encoder.encode(&value)?))))
            .boxed()
    }
}
