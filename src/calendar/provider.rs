//! # Provider Registry
//!
//! Maps a provider type (`caldav`, `ical`, `google`, ...) to a constructor
//! that builds a [`CalendarProvider`] from its calendar configuration. Backend
//! crates register themselves here; the service builds every configured
//! calendar through the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{CalendarError, CalendarProvider};
use crate::config::CalendarConfig;

pub type ProviderConstructor =
    Arc<dyn Fn(&CalendarConfig) -> Result<Arc<dyn CalendarProvider>, CalendarError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    constructors: HashMap<String, ProviderConstructor>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("supported_types", &self.supported_types())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for a provider type
    pub fn register<F>(&mut self, provider_type: impl Into<String>, constructor: F)
    where
        F: Fn(&CalendarConfig) -> Result<Arc<dyn CalendarProvider>, CalendarError>
            + Send
            + Sync
            + 'static,
    {
        let provider_type = provider_type.into();
        debug!(provider_type = %provider_type, "Registered calendar provider type");
        self.constructors.insert(provider_type, Arc::new(constructor));
    }

    pub fn is_supported(&self, provider_type: &str) -> bool {
        self.constructors.contains_key(provider_type)
    }

    /// Build a provider for one configured calendar
    pub fn create_provider(
        &self,
        config: &CalendarConfig,
    ) -> Result<Arc<dyn CalendarProvider>, CalendarError> {
        let constructor = self
            .constructors
            .get(&config.provider_type)
            .ok_or_else(|| CalendarError::UnsupportedProvider(config.provider_type.clone()))?;

        constructor(config)
    }

    /// Registered provider types, sorted
    pub fn supported_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }
}
