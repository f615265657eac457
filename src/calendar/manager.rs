//! # Multi-Calendar Manager
//!
//! Fans a time range out to every registered provider and coordinates the
//! combined result. Each provider call runs through that provider's circuit
//! breaker (`calendar:<name>`) wrapping a retryer, so a flapping backend is
//! retried a few times and then isolated instead of stalling every poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{
    CalendarError, CalendarManager, CalendarProvider, CoordinatorConfig, EventCoordinator,
    ProviderRegistry,
};
use crate::config::CalendarConfig;
use crate::models::Event;
use crate::resilience::{
    render_chain, CircuitBreakerError, CircuitBreakerManager, RetryConfig, RetryError, Retryer,
};

/// Breaker component name for a calendar provider
pub fn breaker_component(provider_name: &str) -> String {
    format!("calendar:{provider_name}")
}

pub struct MultiCalendarManager {
    providers: RwLock<BTreeMap<String, Arc<dyn CalendarProvider>>>,
    coordinator: RwLock<EventCoordinator>,
    retry_config: RetryConfig,
    breakers: Arc<CircuitBreakerManager>,
}

impl std::fmt::Debug for MultiCalendarManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiCalendarManager")
            .field("providers", &self.provider_names())
            .field("retry_config", &self.retry_config)
            .finish()
    }
}

impl MultiCalendarManager {
    pub fn new(
        coordinator_config: CoordinatorConfig,
        retry_config: RetryConfig,
        breakers: Arc<CircuitBreakerManager>,
    ) -> Self {
        Self {
            providers: RwLock::new(BTreeMap::new()),
            coordinator: RwLock::new(EventCoordinator::new(coordinator_config)),
            retry_config,
            breakers,
        }
    }

    /// Build one provider per configured calendar through the registry
    pub fn add_providers_from_config(
        &self,
        registry: &ProviderRegistry,
        calendars: &[CalendarConfig],
    ) -> Result<(), CalendarError> {
        for calendar in calendars {
            let provider = registry.create_provider(calendar)?;
            info!(
                provider = %calendar.name,
                provider_type = %calendar.provider_type,
                "📅 Calendar provider configured"
            );
            self.add_provider(calendar.name.clone(), provider);
        }
        Ok(())
    }

    /// Add or replace a provider under `name`
    pub fn add_provider(&self, name: impl Into<String>, provider: Arc<dyn CalendarProvider>) {
        self.providers.write().insert(name.into(), provider);
    }

    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn CalendarProvider>> {
        self.providers.read().get(name).cloned()
    }

    /// Configured provider names, sorted
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        self.coordinator.read().config().clone()
    }

    pub fn update_coordinator_config(&self, config: CoordinatorConfig) {
        self.coordinator.write().set_config(config);
        info!("Coordinator configuration updated");
    }

    pub fn circuit_breakers(&self) -> &Arc<CircuitBreakerManager> {
        &self.breakers
    }

    /// Health of every provider, keyed by provider name
    pub async fn health_check(&self) -> BTreeMap<String, Result<(), CalendarError>> {
        let probes = self
            .snapshot_providers()
            .into_iter()
            .map(|(name, provider)| async move {
                let result = provider.is_healthy().await;
                if let Err(e) = &result {
                    warn!(provider = %name, error = %e, "Calendar provider unhealthy");
                }
                (name, result)
            });

        join_all(probes).await.into_iter().collect()
    }

    fn snapshot_providers(&self) -> Vec<(String, Arc<dyn CalendarProvider>)> {
        self.providers
            .read()
            .iter()
            .map(|(name, provider)| (name.clone(), Arc::clone(provider)))
            .collect()
    }

    /// Run one provider call behind the provider's breaker and retryer
    async fn guarded<T, F, Fut>(
        &self,
        provider_name: &str,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, CalendarError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CalendarError>>,
    {
        let component = breaker_component(provider_name);
        let breaker = self.breakers.get_circuit_breaker(&component);
        let retryer = Retryer::new(component, self.retry_config.clone());

        let result = breaker
            .execute(|| retryer.run_with_result(cancel, operation))
            .await;

        match result {
            Ok(value) => Ok(value),
            Err(CircuitBreakerError::CircuitOpen { .. }) => Err(CalendarError::CircuitOpen {
                provider: provider_name.to_string(),
            }),
            Err(CircuitBreakerError::OperationFailed(retry_error)) => match retry_error {
                RetryError::Cancelled { .. } => Err(CalendarError::Cancelled {
                    provider: provider_name.to_string(),
                }),
                RetryError::NonRetriable { source, .. } => Err(source),
                RetryError::Exhausted { attempts, source } => Err(CalendarError::RetriesExhausted {
                    provider: provider_name.to_string(),
                    attempts,
                    reason: render_chain(&source),
                }),
            },
        }
    }

    async fn fetch_provider_events(
        &self,
        name: &str,
        provider: &Arc<dyn CalendarProvider>,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        let calendars = self
            .guarded(name, cancel, || provider.get_calendars())
            .await?;

        let calendar_ids: Vec<String> = calendars.into_iter().map(|c| c.id).collect();
        if calendar_ids.is_empty() {
            debug!(provider = %name, "No calendars found for provider, skipping");
            return Ok(Vec::new());
        }

        let mut events = self
            .guarded(name, cancel, || provider.get_events(&calendar_ids, from, to))
            .await?;

        for event in &mut events {
            event.calendar_name = name.to_string();
        }

        debug!(
            provider = %name,
            provider_type = provider.provider_type(),
            event_count = events.len(),
            "Fetched events from provider"
        );

        Ok(events)
    }
}

#[async_trait]
impl CalendarManager for MultiCalendarManager {
    #[instrument(skip(self, cancel), fields(providers = tracing::field::Empty))]
    async fn get_all_events(
        &self,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        let providers = self.snapshot_providers();
        tracing::Span::current().record("providers", providers.len());

        let mut all_events = Vec::new();
        for (name, provider) in &providers {
            match self
                .fetch_provider_events(name, provider, cancel, from, to)
                .await
            {
                Ok(events) => all_events.extend(events),
                Err(e) => {
                    error!(
                        provider = %name,
                        provider_type = provider.provider_type(),
                        error = %e,
                        "Failed to fetch events from provider"
                    );
                    return Err(e);
                }
            }
        }

        let coordinated = self.coordinator.read().coordinate_events(&all_events);

        info!(
            raw_events = all_events.len(),
            coordinated_events = coordinated.len(),
            duplicates_removed = all_events.len().saturating_sub(coordinated.len()),
            "Event coordination completed"
        );

        Ok(coordinated)
    }

    async fn close(&self) -> Result<(), CalendarError> {
        let mut first_error = None;
        for (name, provider) in self.snapshot_providers() {
            if let Err(e) = provider.close().await {
                warn!(provider = %name, error = %e, "Failed to close calendar provider");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
