//! Transport seam - the four exchange primitives.
//!
//! The core does not open connections, frame bytes, or multiplex
//! exchanges; it only consumes these primitives. A transport
//! implementation binds each call to one logical exchange and reports the
//! exchange's terminal outcome through the returned future/stream.
//!
//! The server-side inverse of this trait is the engine itself: a
//! transport delivers inbound exchanges to the four
//! [`Dispatcher`](crate::dispatch::Dispatcher) entry points following the
//! same shapes.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::{Result, RoutewireError};

/// A stream of encoded payload frames, the outbound half of a
/// many-framed exchange.
pub type PayloadStream = BoxStream<'static, Result<Bytes>>;

/// A stream of raw frames as the transport delivers or accepts them.
pub type FrameStream = BoxStream<'static, ExchangePayload>;

/// One frame of an exchange: optional metadata bytes plus payload bytes.
///
/// Single-frame exchanges always carry metadata. On a bidirectional
/// stream only the first frame does; subsequent frames are payload-only.
#[derive(Debug, Clone)]
pub struct ExchangePayload {
    /// Encoded metadata envelope, present on an exchange's leading frame.
    pub metadata: Option<Bytes>,
    /// Payload body bytes.
    pub data: Bytes,
}

impl ExchangePayload {
    /// Create a frame carrying both metadata and payload.
    pub fn with_metadata(metadata: Bytes, data: Bytes) -> Self {
        Self {
            metadata: Some(metadata),
            data,
        }
    }

    /// Create a payload-only frame (a stream continuation frame).
    pub fn data_only(data: Bytes) -> Self {
        Self {
            metadata: None,
            data,
        }
    }

    /// Metadata bytes, or an envelope error if this frame has none.
    ///
    /// Every exchange's leading frame must carry a decodable envelope;
    /// absence is a protocol error, not a default.
    pub fn require_metadata(&self) -> Result<&Bytes> {
        self.metadata
            .as_ref()
            .ok_or_else(|| RoutewireError::Envelope("exchange frame carries no metadata".to_string()))
    }
}

/// Client-side transport primitives, one per exchange mode.
///
/// Object-safe by construction (boxed futures/streams, the same pattern
/// the handler traits use), so proxies hold an `Arc<dyn ExchangeTransport>`.
pub trait ExchangeTransport: Send + Sync + 'static {
    /// Fire-and-forget: send one frame, expect no response frames.
    ///
    /// The returned future resolves once the transport has accepted the
    /// frame; it cannot observe handler-side failures.
    fn send_one_way(&self, metadata: Bytes, data: Bytes) -> BoxFuture<'static, Result<()>>;

    /// Request/response: send one frame, await exactly one response frame.
    fn send_request_one(&self, metadata: Bytes, data: Bytes) -> BoxFuture<'static, Result<Bytes>>;

    /// Request/stream: send one frame, consume zero or more response
    /// frames until the peer terminates the exchange.
    fn send_request_many(&self, metadata: Bytes, data: Bytes) -> PayloadStream;

    /// Bidirectional stream: feed outbound frames (metadata on the first
    /// only) while consuming response frames.
    fn send_request_stream(&self, outbound: FrameStream) -> PayloadStream;
}
