//! # routewire
//!
//! Request routing and exchange-mode dispatch over a multiplexed
//! transport.
//!
//! The crate sits between a frame transport and application handlers.
//! Every exchange opens with a metadata envelope (a flat JSON map naming
//! the target route and the payload MIME type) and runs under one of
//! four interaction shapes:
//!
//! - **one-way**: one request frame, no response
//! - **request/one**: one request frame, one response frame
//! - **request/many**: one request frame, a stream of response frames
//! - **request/stream**: a stream of request frames, a stream of
//!   response frames, with the envelope on the first frame only
//!
//! The server side is the [`dispatch::Dispatcher`], which resolves the
//! envelope against a route table, decodes the payload through a
//! content-type-matched converter, and invokes the registered handler.
//! The client side is the [`client::ProxyClient`], which performs the
//! same resolution once per route and drives exchanges over any
//! [`transport::ExchangeTransport`] implementation.
//!
//! ## Example
//!
//! ```
//! use routewire::dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::builder()
//!     .request_one("/echo", "application/json", |s: String| async move { Ok(s) })
//!     .build()
//!     .unwrap();
//! # let _ = dispatcher;
//! ```

pub mod converter;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod route;
pub mod transport;

mod client;

pub use client::ProxyClient;
pub use converter::{Converter, ConverterRegistry};
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use error::{Result, RoutewireError};
pub use handler::{ExchangeHandler, RouteTable};
pub use route::{Envelope, ExchangeMode, RouteMetadata};
pub use transport::{ExchangePayload, ExchangeTransport, FrameStream, PayloadStream};
