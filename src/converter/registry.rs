//! Converter registry - ordered content-type lookup.
//!
//! The registry holds converters in registration order and resolves them
//! by exact content-type equality, first match wins. It is populated once
//! at startup and read-only afterwards, so lookups need no locking.

use crate::error::{Result, RoutewireError};

use super::Converter;

/// Ordered collection of payload converters.
///
/// Ships with the JSON and native defaults; additional converters are
/// appended after them and therefore cannot shadow a default under the
/// same content type (matching is first-registered, first-matched).
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: Vec<Converter>,
}

impl ConverterRegistry {
    /// Create a registry pre-populated with the two default converters.
    pub fn with_defaults() -> Self {
        Self {
            converters: vec![Converter::json(), Converter::native()],
        }
    }

    /// Create an empty registry. Most callers want [`with_defaults`].
    ///
    /// [`with_defaults`]: ConverterRegistry::with_defaults
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Append a converter to the lookup order.
    pub fn register(&mut self, converter: Converter) {
        self.converters.push(converter);
    }

    /// Resolve a converter by exact content-type match.
    ///
    /// # Errors
    ///
    /// Returns [`RoutewireError::ConverterNotFound`] if no registered
    /// converter accepts the content type.
    pub fn converter_for(&self, content_type: &str) -> Result<&Converter> {
        self.converters
            .iter()
            .find(|c| c.accept(content_type))
            .ok_or_else(|| RoutewireError::ConverterNotFound(content_type.to_string()))
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether the registry has no converters.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
