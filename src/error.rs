//! Error types for routewire.

use thiserror::Error;

use crate::route::ExchangeMode;

/// Main error type for all routing and dispatch operations.
#[derive(Debug, Error)]
pub enum RoutewireError {
    /// JSON serialization/deserialization error (payload body).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Native codec serialization error.
    #[error("native encode error: {0}")]
    NativeEncode(#[from] rmp_serde::encode::Error),

    /// Native codec deserialization error.
    #[error("native decode error: {0}")]
    NativeDecode(#[from] rmp_serde::decode::Error),

    /// Metadata envelope is missing, malformed, or lacks a required key.
    #[error("malformed metadata envelope: {0}")]
    Envelope(String),

    /// No handler registered for the envelope's PATH.
    #[error("no route registered for path: {0}")]
    RouteNotFound(String),

    /// No converter registered for the envelope's MIME_TYPE.
    #[error("no converter registered for content type: {0}")]
    ConverterNotFound(String),

    /// Two registrations share a path. Fatal at startup.
    #[error("duplicate route registration for path: {0}")]
    DuplicateRoute(String),

    /// Route metadata is structurally invalid (e.g. empty path). Fatal at startup.
    #[error("invalid route metadata: {0}")]
    InvalidRoute(String),

    /// An exchange was invoked under a shape that does not match the
    /// route's declared exchange mode.
    #[error("exchange mode mismatch for path {path}: route is {registered:?}, invoked as {invoked:?}")]
    ExchangeModeMismatch {
        /// Route path involved in the mismatch.
        path: String,
        /// Mode the route was registered with.
        registered: ExchangeMode,
        /// Mode the exchange was invoked as.
        invoked: ExchangeMode,
    },

    /// The handler itself failed.
    #[error("handler error: {0}")]
    Handler(String),

    /// Transport reported the exchange's connection as closed.
    #[error("connection closed")]
    ConnectionClosed,
}

impl RoutewireError {
    /// Build a handler error from any displayable failure.
    pub fn handler(message: impl Into<String>) -> Self {
        RoutewireError::Handler(message.into())
    }
}

/// Result type alias using RoutewireError.
pub type Result<T> = std::result::Result<T, RoutewireError>;
