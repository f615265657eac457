//! # Circuit Breaker Manager
//!
//! Owns one circuit breaker per component name (`calendar:<provider>`,
//! `publisher`, ...) and aggregates their metrics.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, SystemCircuitBreakerMetrics};

#[derive(Debug)]
pub struct CircuitBreakerManager {
    circuit_breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
    component_configs: HashMap<String, CircuitBreakerConfig>,
}

impl CircuitBreakerManager {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            circuit_breakers: DashMap::new(),
            default_config,
            component_configs: HashMap::new(),
        }
    }

    /// Override the configuration used when `component` is first requested
    pub fn with_component_config(
        mut self,
        component: impl Into<String>,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.component_configs.insert(component.into(), config);
        self
    }

    pub fn config_for_component(&self, component: &str) -> &CircuitBreakerConfig {
        self.component_configs
            .get(component)
            .unwrap_or(&self.default_config)
    }

    /// Get or create the circuit breaker for a component
    pub fn get_circuit_breaker(&self, component: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.circuit_breakers.get(component) {
            return Arc::clone(breaker.value());
        }

        let entry = self
            .circuit_breakers
            .entry(component.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    component,
                    self.config_for_component(component).clone(),
                ))
            });
        let breaker = Arc::clone(entry.value());
        drop(entry);

        info!(
            component = component,
            total_circuit_breakers = self.circuit_breakers.len(),
            "Created new circuit breaker"
        );

        breaker
    }

    /// Component names with a live breaker, sorted
    pub fn list_components(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .circuit_breakers
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn component_metrics(&self, component: &str) -> Option<CircuitBreakerMetrics> {
        self.circuit_breakers
            .get(component)
            .map(|breaker| breaker.metrics())
    }

    pub fn all_metrics(&self) -> SystemCircuitBreakerMetrics {
        let mut system = SystemCircuitBreakerMetrics::new();
        for entry in self.circuit_breakers.iter() {
            system.add_circuit_breaker(entry.key().clone(), entry.value().metrics());
        }
        system
    }

    pub fn force_open_all(&self) {
        warn!("🚨 Forcing all circuit breakers open");
        for entry in self.circuit_breakers.iter() {
            entry.value().force_open();
        }
    }

    pub fn force_close_all(&self) {
        warn!("🚨 Forcing all circuit breakers closed");
        for entry in self.circuit_breakers.iter() {
            entry.value().force_closed();
        }
    }

    pub fn remove_circuit_breaker(&self, component: &str) -> bool {
        let removed = self.circuit_breakers.remove(component).is_some();
        if removed {
            info!(
                component = component,
                remaining_count = self.circuit_breakers.len(),
                "Removed circuit breaker"
            );
        }
        removed
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
