//! Client-side proxy for invoking remote routes.
//!
//! The [`ProxyClient`] is the mirror image of the dispatch engine: the
//! caller hands it a route descriptor and a typed request, and the proxy
//! encodes the payload, attaches the metadata envelope, and drives the
//! exchange over an [`ExchangeTransport`].
//!
//! Resolution work that depends only on the route (envelope encoding,
//! converter lookup, mode check) is done once per path and cached in a
//! method slot, so repeated invocations pay only for payload encoding.
//!
//! # Example
//!
//! ```ignore
//! use routewire::client::ProxyClient;
//! use routewire::route::{ExchangeMode, RouteMetadata};
//!
//! let client = ProxyClient::new(transport);
//! let route = RouteMetadata::new("/users/find", "application/json", ExchangeMode::RequestOne);
//! let user: User = client.request_one(&route, &query).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{stream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::converter::{Converter, ConverterRegistry};
use crate::error::{Result, RoutewireError};
use crate::route::{Envelope, ExchangeMode, RouteMetadata};
use crate::transport::{ExchangePayload, ExchangeTransport};

/// Per-route resolution result, computed on first use.
struct MethodSlot {
    envelope: Bytes,
    converter: Converter,
    mode: ExchangeMode,
    content_type: String,
}

/// Typed proxy over an exchange transport.
pub struct ProxyClient {
    transport: Arc<dyn ExchangeTransport>,
    converters: Arc<ConverterRegistry>,
    slots: RwLock<HashMap<String, Arc<MethodSlot>>>,
}

impl ProxyClient {
    /// Create a proxy with the default converters.
    pub fn new(transport: Arc<dyn ExchangeTransport>) -> Self {
        Self::with_converters(transport, ConverterRegistry::with_defaults())
    }

    /// Create a proxy with a custom converter registry.
    pub fn with_converters(
        transport: Arc<dyn ExchangeTransport>,
        converters: ConverterRegistry,
    ) -> Self {
        Self {
            transport,
            converters: Arc::new(converters),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Invoke a fire-and-forget route. Resolves once the transport has
    /// accepted the frame; no response is awaited.
    pub async fn one_way<T: Serialize>(&self, route: &RouteMetadata, request: &T) -> Result<()> {
        let slot = self.resolve_slot(route, ExchangeMode::OneWay).await?;
        let data = Bytes::from(slot.converter.encode(request)?);
        self.transport
            .send_one_way(slot.envelope.clone(), data)
            .await
    }

    /// Invoke a request/single-response route.
    pub async fn request_one<T, R>(&self, route: &RouteMetadata, request: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let slot = self.resolve_slot(route, ExchangeMode::RequestOne).await?;
        let data = Bytes::from(slot.converter.encode(request)?);
        let response = self
            .transport
            .send_request_one(slot.envelope.clone(), data)
            .await?;
        slot.converter.decode(&response)
    }

    /// Invoke a request/response-stream route.
    ///
    /// Dropping the returned stream abandons the rest of the sequence.
    pub async fn request_many<T, R>(
        &self,
        route: &RouteMetadata,
        request: &T,
    ) -> Result<BoxStream<'static, Result<R>>>
    where
        T: Serialize,
        R: DeserializeOwned + Send + 'static,
    {
        let slot = self.resolve_slot(route, ExchangeMode::RequestMany).await?;
        let data = Bytes::from(slot.converter.encode(request)?);
        let converter = slot.converter.clone();
        let frames = self
            .transport
            .send_request_many(slot.envelope.clone(), data);
        Ok(frames
            .map(move |frame| frame.and_then(|bytes| converter.decode(&bytes)))
            .boxed())
    }

    /// Invoke a bidirectional-stream route.
    ///
    /// The envelope rides on the first outbound frame only, so the first
    /// element of `requests` doubles as that frame's payload. If an
    /// element fails to encode, the outbound stream ends there and the
    /// encode failure becomes the response stream's final error item.
    pub async fn request_stream<T, R, S>(
        &self,
        route: &RouteMetadata,
        requests: S,
    ) -> Result<BoxStream<'static, Result<R>>>
    where
        T: Serialize + Send + 'static,
        R: DeserializeOwned + Send + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let slot = self.resolve_slot(route, ExchangeMode::RequestStream).await?;
        let encoder = slot.converter.clone();
        let decoder = slot.converter.clone();
        let mut envelope = Some(slot.envelope.clone());

        // The outbound frame stream has no error channel of its own, so
        // an encode failure is parked on a oneshot and replayed to the
        // caller after the responses end.
        let (failure_tx, failure_rx) = tokio::sync::oneshot::channel();
        let mut failure_tx = Some(failure_tx);

        let frames = requests
            .scan((), move |_, item| {
                let frame = match encoder.encode(&item) {
                    Ok(encoded) => {
                        let data = Bytes::from(encoded);
                        Some(match envelope.take() {
                            Some(metadata) => ExchangePayload::with_metadata(metadata, data),
                            None => ExchangePayload::data_only(data),
                        })
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "ending stream exchange: request encoding failed");
                        if let Some(tx) = failure_tx.take() {
                            let _ = tx.send(e);
                        }
                        None
                    }
                };
                futures::future::ready(frame)
            })
            .boxed();

        let responses = self.transport.send_request_stream(frames);
        let trailer = stream::once(failure_rx)
            .filter_map(|parked| futures::future::ready(parked.ok().map(Err)));
        Ok(responses
            .map(move |frame| frame.and_then(|bytes| decoder.decode(&bytes)))
            .chain(trailer)
            .boxed())
    }

    /// Resolve the cached slot for a route, or populate it on first use.
    ///
    /// The mode and content-type checks run before anything touches the
    /// transport: a call whose shape or declared framing disagrees with
    /// the path's first resolution has no valid exchange to perform.
    async fn resolve_slot(
        &self,
        route: &RouteMetadata,
        invoked: ExchangeMode,
    ) -> Result<Arc<MethodSlot>> {
        if let Some(slot) = self.slots.read().await.get(route.path()) {
            return verify_slot(slot, route, invoked);
        }

        route.validate()?;
        if route.mode() != invoked {
            return Err(mode_mismatch(route.path(), route.mode(), invoked));
        }
        let converter = self.converters.converter_for(route.content_type())?.clone();
        let envelope = Envelope::for_route(route).encode()?;

        let mut slots = self.slots.write().await;
        // A concurrent caller may have populated the slot in the meantime.
        if let Some(slot) = slots.get(route.path()) {
            return verify_slot(slot, route, invoked);
        }
        let slot = Arc::new(MethodSlot {
            envelope,
            converter,
            mode: route.mode(),
            content_type: route.content_type().to_string(),
        });
        slots.insert(route.path().to_string(), Arc::clone(&slot));
        Ok(slot)
    }
}

/// Check a cached slot against the route descriptor of the current call.
fn verify_slot(
    slot: &Arc<MethodSlot>,
    route: &RouteMetadata,
    invoked: ExchangeMode,
) -> Result<Arc<MethodSlot>> {
    if slot.mode != invoked {
        return Err(mode_mismatch(route.path(), slot.mode, invoked));
    }
    if slot.content_type != route.content_type() {
        return Err(RoutewireError::InvalidRoute(format!(
            "path {} was resolved with content type {}, not {}",
            route.path(),
            slot.content_type,
            route.content_type()
        )));
    }
    Ok(Arc::clone(slot))
}

fn mode_mismatch(path: &str, registered: ExchangeMode, invoked: ExchangeMode) -> RoutewireError {
    RoutewireError::ExchangeModeMismatch {
        path: path.to_string(),
        registered,
        invoked,
    }
}
