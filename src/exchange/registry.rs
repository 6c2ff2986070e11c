//! Exchange registry.
//!
//! An explicit name -> factory map constructed at startup and passed by
//! reference wherever adapters are created. There is deliberately no
//! process-wide registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

use super::traits::Exchange;

/// Factory producing a configured adapter instance.
pub type ExchangeFactory = Box<dyn Fn() -> Result<Arc<dyn Exchange>> + Send + Sync>;

/// Registry of known venue adapters.
#[derive(Default)]
pub struct ExchangeRegistry {
    factories: HashMap<String, ExchangeFactory>,
}

impl ExchangeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter factory under a (case-insensitive) name.
    pub fn register(&mut self, name: impl Into<String>, factory: ExchangeFactory) {
        self.factories.insert(name.into().to_lowercase(), factory);
    }

    /// Create an adapter by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exchange`] naming the available adapters when the
    /// name is unknown, or the factory's own error on construction failure.
    pub fn create(&self, name: &str) -> Result<Arc<dyn Exchange>> {
        let key = name.to_lowercase();
        let factory = self.factories.get(&key).ok_or_else(|| {
            let mut available: Vec<&str> = self.factories.keys().map(String::as_str).collect();
            available.sort_unstable();
            Error::Exchange(format!(
                "unknown exchange '{name}'; available: {}",
                available.join(", ")
            ))
        })?;
        factory()
    }

    /// Registered adapter names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
