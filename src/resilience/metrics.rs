//! # Circuit Breaker Metrics
//!
//! Point-in-time snapshots of breaker counters, per breaker and aggregated
//! across every breaker a [`crate::resilience::CircuitBreakerManager`] owns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::CircuitState;

/// Snapshot of a single circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    /// Calls that actually ran the protected operation
    pub total_calls: u64,

    pub success_count: u64,

    pub failure_count: u64,

    /// Calls rejected without running because the circuit was open
    pub rejected_calls: u64,

    /// Failures since the last success (drives Closed -> Open)
    pub consecutive_failures: u32,

    /// Successes counted toward closing a half-open circuit
    pub half_open_successes: u32,

    pub total_duration: Duration,

    pub current_state: CircuitState,
}

impl CircuitBreakerMetrics {
    pub fn new() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            failure_count: 0,
            rejected_calls: 0,
            consecutive_failures: 0,
            half_open_successes: 0,
            total_duration: Duration::ZERO,
            current_state: CircuitState::Closed,
        }
    }

    /// Fraction of executed calls that failed (0.0 when nothing ran yet)
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 0.0;
        }
        self.failure_count as f64 / self.total_calls as f64
    }

    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.total_calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total_duration / calls,
            Err(_) => Duration::ZERO,
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self.current_state {
            CircuitState::Closed => self.failure_rate() < 0.5,
            CircuitState::Open => false,
            CircuitState::HalfOpen => true,
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "State: {} | Calls: {} | Failures: {} | Rejected: {} | Avg Duration: {}ms",
            self.current_state,
            self.total_calls,
            self.failure_count,
            self.rejected_calls,
            self.average_duration().as_millis()
        )
    }
}

impl Default for CircuitBreakerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics of every breaker, keyed by component name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemCircuitBreakerMetrics {
    pub circuit_breakers: HashMap<String, CircuitBreakerMetrics>,
}

impl SystemCircuitBreakerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_circuit_breaker(&mut self, name: String, metrics: CircuitBreakerMetrics) {
        self.circuit_breakers.insert(name, metrics);
    }

    pub fn count_by_state(&self) -> HashMap<CircuitState, usize> {
        let mut counts = HashMap::new();
        for metrics in self.circuit_breakers.values() {
            *counts.entry(metrics.current_state).or_insert(0) += 1;
        }
        counts
    }

    /// Names of breakers that currently report unhealthy, sorted
    pub fn unhealthy_circuits(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .circuit_breakers
            .iter()
            .filter(|(_, metrics)| !metrics.is_healthy())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Share of healthy breakers (1.0 when there are none)
    pub fn health_score(&self) -> f64 {
        if self.circuit_breakers.is_empty() {
            return 1.0;
        }

        let healthy = self
            .circuit_breakers
            .values()
            .filter(|metrics| metrics.is_healthy())
            .count();

        healthy as f64 / self.circuit_breakers.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_rate_and_health() {
        let mut metrics = CircuitBreakerMetrics::new();
        assert_eq!(metrics.failure_rate(), 0.0);
        assert!(metrics.is_healthy());

        metrics.total_calls = 4;
        metrics.failure_count = 3;
        assert_eq!(metrics.failure_rate(), 0.75);
        assert!(!metrics.is_healthy());

        metrics.current_state = CircuitState::HalfOpen;
        assert!(metrics.is_healthy());
    }

    #[test]
    fn test_system_metrics_aggregation() {
        let mut system = SystemCircuitBreakerMetrics::new();
        assert_eq!(system.health_score(), 1.0);

        let open = CircuitBreakerMetrics {
            current_state: CircuitState::Open,
            ..Default::default()
        };
        system.add_circuit_breaker("calendar:work".to_string(), open);
        system.add_circuit_breaker("publisher".to_string(), CircuitBreakerMetrics::new());

        assert_eq!(system.health_score(), 0.5);
        assert_eq!(system.unhealthy_circuits(), vec!["calendar:work".to_string()]);
        assert_eq!(system.count_by_state().get(&CircuitState::Open), Some(&1));
    }
}
