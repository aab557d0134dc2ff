//! Circuit breaker types and configuration

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, operations proceed normally
    Closed,
    /// Circuit is open, operations are rejected
    Open,
    /// Circuit is half-open, a single trial operation is allowed
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
///
/// Durations are integer milliseconds on the wire.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit
    pub failure_threshold: u32,
    /// How long OPEN (or a stuck HALF_OPEN) may last before the monitor intervenes
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub reset_timeout: Duration,
    /// Per-call timeout; a timed out call counts as a failure. Zero disables it.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub request_timeout: Duration,
    /// Cool-down after opening before the next call may be attempted
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub open_state_timeout: Duration,
    /// Period of the background monitor
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub monitor_interval: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
            open_state_timeout: Duration::from_secs(300),
            monitor_interval: Duration::from_secs(5),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a config for aggressive circuit breaking
    pub fn aggressive() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(10),
            open_state_timeout: Duration::from_secs(30),
            monitor_interval: Duration::from_secs(1),
        }
    }

    /// The per-call timeout, if enabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (!self.request_timeout.is_zero()).then_some(self.request_timeout)
    }
}

/// Error from circuit breaker operations
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open; carries the last known failure message
    Open {
        component: String,
        last_error: Option<String>,
    },
    /// The guarded call exceeded the request timeout
    Timeout { component: String, after: Duration },
    /// Operation failed
    OperationFailed(E),
}

impl<E> CircuitBreakerError<E> {
    /// Whether the call was rejected without running
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open {
                component,
                last_error: Some(message),
            } => write!(f, "Circuit is OPEN for {}: {}", component, message),
            Self::Open { component, .. } => write!(f, "Circuit is OPEN for {}", component),
            Self::Timeout { after, .. } => {
                write!(f, "Request timed out after {}ms", after.as_millis())
            }
            Self::OperationFailed(e) => write!(f, "Operation failed: {}", e),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for CircuitBreakerError<E> {}

/// Observable snapshot of a circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_error: Option<String>,
    pub last_state_change: Instant,
    pub next_attempt: Instant,
    pub total_calls: u64,
    pub total_failures: u64,
}

impl CircuitBreakerStats {
    /// Calculate failure rate as a percentage
    pub fn failure_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            (self.total_failures as f64 / self.total_calls as f64) * 100.0
        }
    }
}
