//! Route table - path to handler resolution.
//!
//! The table is built once at startup from the externally supplied
//! handler list and is read-only afterwards, so resolution needs no
//! locking. Paths match exactly; there is no prefix or fallback matching.
//!
//! # Example
//!
//! ```
//! use routewire::handler::{ExchangeHandler, RouteTable};
//! use routewire::route::{ExchangeMode, RouteMetadata};
//!
//! let mut table = RouteTable::new();
//! table
//!     .register(
//!         RouteMetadata::new("/echo", "application/json", ExchangeMode::RequestOne),
//!         ExchangeHandler::request_one(|s: String| async move { Ok(s) }),
//!     )
//!     .unwrap();
//!
//! assert!(table.resolve("/echo").is_ok());
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, RoutewireError};
use crate::route::RouteMetadata;

use super::ExchangeHandler;

/// One registered operation: route descriptor plus its handler.
#[derive(Debug)]
pub struct RegisteredRoute {
    metadata: RouteMetadata,
    handler: ExchangeHandler,
}

impl RegisteredRoute {
    /// Route descriptor for this registration.
    #[inline]
    pub fn metadata(&self) -> &RouteMetadata {
        &self.metadata
    }

    /// Handler for this registration.
    #[inline]
    pub fn handler(&self) -> &ExchangeHandler {
        &self.handler
    }
}

/// Maps a route path to its registered handler.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Arc<RegisteredRoute>>,
}

impl RouteTable {
    /// Create an empty route table.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a handler under `metadata.path()`.
    ///
    /// # Errors
    ///
    /// - [`RoutewireError::InvalidRoute`] if the metadata is structurally
    ///   invalid or the handler's shape disagrees with the declared mode
    /// - [`RoutewireError::DuplicateRoute`] if the path is already taken;
    ///   duplicates are a configuration error, never silently shadowed
    pub fn register(&mut self, metadata: RouteMetadata, handler: ExchangeHandler) -> Result<()> {
        metadata.validate()?;
        if handler.mode() != metadata.mode() {
            return Err(RoutewireError::InvalidRoute(format!(
                "route {} declares {:?} but its handler is {:?}",
                metadata.path(),
                metadata.mode(),
                handler.mode()
            )));
        }

        match self.routes.entry(metadata.path().to_string()) {
            Entry::Occupied(_) => Err(RoutewireError::DuplicateRoute(metadata.path().to_string())),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    path = metadata.path(),
                    mode = ?metadata.mode(),
                    content_type = metadata.content_type(),
                    "registered route"
                );
                slot.insert(Arc::new(RegisteredRoute { metadata, handler }));
                Ok(())
            }
        }
    }

    /// Resolve a path to its registration by exact match.
    ///
    /// # Errors
    ///
    /// Returns [`RoutewireError::RouteNotFound`] for unregistered paths.
    pub fn resolve(&self, path: &str) -> Result<Arc<RegisteredRoute>> {
        self.routes
            .get(path)
            .cloned()
            .ok_or_else(|| RoutewireError::RouteNotFound(path.to_string()))
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
