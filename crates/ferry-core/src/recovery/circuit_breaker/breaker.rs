//! Circuit breaker implementation

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::types::{CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState};
use crate::recovery::spawn_logged;

/// Mutable breaker state, only touched under the lock and never across an await
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_error: Option<String>,
    last_state_change: Instant,
    next_attempt: Instant,
    /// A HALF_OPEN trial call is currently running
    trial_in_flight: bool,
}

impl BreakerState {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_error: None,
            last_state_change: now,
            next_attempt: now,
            trial_in_flight: false,
        }
    }

    fn reset(&mut self) {
        let now = Instant::now();
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_error = None;
        self.last_state_change = now;
        self.next_attempt = now;
        self.trial_in_flight = false;
    }

    fn open(&mut self, cool_down: std::time::Duration) {
        let now = Instant::now();
        self.state = CircuitState::Open;
        self.last_state_change = now;
        self.next_attempt = now + cool_down;
        self.trial_in_flight = false;
    }
}

/// Circuit breaker for protecting against failing dependencies
///
/// A background monitor re-arms the next attempt once an open circuit has
/// waited `reset_timeout`, and force-closes a HALF_OPEN circuit whose trial
/// has lingered that long. Call [`CircuitBreaker::dispose`] (or drop the
/// breaker) to stop the monitor.
pub struct CircuitBreaker {
    /// Component name (for logging)
    name: String,
    /// Configuration
    config: CircuitBreakerConfig,
    /// Shared with the monitor task
    inner: Arc<Mutex<BreakerState>>,
    /// Total calls counter
    total_calls: AtomicU64,
    /// Total failures counter
    total_failures: AtomicU64,
    /// Stops the monitor task
    monitor: CancellationToken,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default config
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    /// Create a new circuit breaker with custom config
    ///
    /// The monitor task is only started when called inside a tokio runtime.
    pub fn with_config(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        let inner = Arc::new(Mutex::new(BreakerState::new()));
        let monitor = CancellationToken::new();

        if tokio::runtime::Handle::try_current().is_ok() {
            spawn_logged(
                "circuit monitor",
                Self::run_monitor(
                    name.clone(),
                    config.clone(),
                    Arc::clone(&inner),
                    monitor.clone(),
                ),
            );
        } else {
            tracing::warn!(circuit = %name, "No tokio runtime; circuit monitor disabled");
        }

        Self {
            name,
            config,
            inner,
            total_calls: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            monitor,
        }
    }

    /// Get the component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get the current state
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        E: std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire()?;
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let outcome = match self.config.request_timeout() {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result.map_err(CircuitBreakerError::OperationFailed),
                Err(_) => Err(CircuitBreakerError::Timeout {
                    component: self.name.clone(),
                    after: limit,
                }),
            },
            None => operation()
                .await
                .map_err(CircuitBreakerError::OperationFailed),
        };

        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => Err(self.record_failure(error)),
        }
    }

    /// Decide whether a call may proceed, moving OPEN to HALF_OPEN once the
    /// cool-down has elapsed.
    fn acquire<E>(&self) -> Result<(), CircuitBreakerError<E>> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                if Instant::now() < inner.next_attempt {
                    return Err(self.open_error(&inner));
                }
                inner.state = CircuitState::HalfOpen;
                inner.last_state_change = Instant::now();
                inner.trial_in_flight = true;
                tracing::info!(circuit = %self.name, "Circuit breaker transitioning to half-open");
                Ok(())
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.open_error(&inner));
                }
                inner.trial_in_flight = true;
                Ok(())
            }
        }
    }

    fn open_error<E>(&self, inner: &BreakerState) -> CircuitBreakerError<E> {
        CircuitBreakerError::Open {
            component: self.name.clone(),
            last_error: inner.last_error.clone(),
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.reset();
            tracing::info!(circuit = %self.name, "Circuit breaker closed");
        }
    }

    /// Count a failure; the call that trips the circuit reports it as open.
    fn record_failure<E: std::fmt::Display>(
        &self,
        error: CircuitBreakerError<E>,
    ) -> CircuitBreakerError<E> {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let message = match &error {
            CircuitBreakerError::OperationFailed(e) => e.to_string(),
            other => other.to_string(),
        };

        let mut inner = self.inner.lock();
        inner.failure_count += 1;
        inner.last_error = Some(message.clone());

        if inner.failure_count >= self.config.failure_threshold
            || inner.state == CircuitState::HalfOpen
        {
            inner.open(self.config.open_state_timeout);
            tracing::warn!(
                circuit = %self.name,
                failures = inner.failure_count,
                "Circuit breaker opened: {}",
                message
            );
            return CircuitBreakerError::Open {
                component: self.name.clone(),
                last_error: Some(message),
            };
        }

        error
    }

    /// Get circuit breaker statistics
    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.lock();
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            last_error: inner.last_error.clone(),
            last_state_change: inner.last_state_change,
            next_attempt: inner.next_attempt,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
        }
    }

    /// Manually reset the circuit breaker to closed state
    pub fn reset(&self) {
        self.inner.lock().reset();
        tracing::info!(circuit = %self.name, "Circuit breaker reset");
    }

    /// Manually open the circuit breaker
    pub fn trip(&self) {
        self.inner.lock().open(self.config.open_state_timeout);
        tracing::warn!(circuit = %self.name, "Circuit breaker tripped manually");
    }

    /// Stop the background monitor. Idempotent.
    pub fn dispose(&self) {
        self.monitor.cancel();
    }

    /// Whether the monitor has been stopped
    pub fn is_disposed(&self) -> bool {
        self.monitor.is_cancelled()
    }

    async fn run_monitor(
        name: String,
        config: CircuitBreakerConfig,
        inner: Arc<Mutex<BreakerState>>,
        token: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(config.monitor_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => Self::monitor_tick(&name, &config, &inner),
            }
        }

        tracing::debug!(circuit = %name, "Circuit monitor stopped");
    }

    fn monitor_tick(name: &str, config: &CircuitBreakerConfig, inner: &Mutex<BreakerState>) {
        let mut inner = inner.lock();
        let now = Instant::now();
        let lingering = now.duration_since(inner.last_state_change) >= config.reset_timeout;

        match inner.state {
            CircuitState::Open if lingering && inner.next_attempt > now => {
                inner.next_attempt = now;
                tracing::debug!(circuit = %name, "Circuit monitor re-armed next attempt");
            }
            CircuitState::HalfOpen if lingering => {
                inner.reset();
                tracing::info!(circuit = %name, "Circuit monitor reset a stuck half-open trial");
            }
            _ => {}
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        self.monitor.cancel();
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}
