//! Tests for circuit breaker functionality

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::breaker::CircuitBreaker;
use super::types::{CircuitBreakerConfig, CircuitBreakerError, CircuitState};

fn config(threshold: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: threshold,
        reset_timeout: Duration::from_secs(60),
        request_timeout: Duration::ZERO,
        open_state_timeout: Duration::from_millis(100),
        monitor_interval: Duration::from_secs(5),
    }
}

async fn fail(cb: &CircuitBreaker) -> CircuitBreakerError<&'static str> {
    cb.call(|| async { Err::<(), _>("boom") })
        .await
        .unwrap_err()
}

#[tokio::test(start_paused = true)]
async fn test_circuit_starts_closed() {
    let cb = CircuitBreaker::new("test");
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.stats().failure_count, 0);
    assert!(cb.stats().last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_circuit_opens_after_failures() {
    let cb = CircuitBreaker::with_config("test", config(3));

    assert!(matches!(fail(&cb).await, CircuitBreakerError::OperationFailed("boom")));
    assert!(matches!(fail(&cb).await, CircuitBreakerError::OperationFailed("boom")));
    assert_eq!(cb.state(), CircuitState::Closed);

    // The tripping call reports the open circuit with the failure message
    match fail(&cb).await {
        CircuitBreakerError::Open { last_error, .. } => {
            assert_eq!(last_error.as_deref(), Some("boom"))
        }
        other => panic!("expected open circuit, got {}", other),
    }
    assert_eq!(cb.state(), CircuitState::Open);
    assert_eq!(cb.stats().failure_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_call_rejected_when_open() {
    let cb = CircuitBreaker::with_config("test", config(1));
    fail(&cb).await;

    let ran = AtomicBool::new(false);
    let result: Result<i32, CircuitBreakerError<&str>> = cb
        .call(|| async {
            ran.store(true, Ordering::SeqCst);
            Ok(42)
        })
        .await;

    assert!(result.unwrap_err().is_open());
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_half_open_success_closes_circuit() {
    let cb = CircuitBreaker::with_config("test", config(2));
    fail(&cb).await;
    fail(&cb).await;
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::advance(Duration::from_millis(150)).await;

    let observed = cb
        .call(|| async { Ok::<_, &str>(cb.state()) })
        .await
        .unwrap();
    assert_eq!(observed, CircuitState::HalfOpen);

    let stats = cb.stats();
    assert_eq!(stats.state, CircuitState::Closed);
    assert_eq!(stats.failure_count, 0);
    assert!(stats.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_half_open_failure_reopens_immediately() {
    let cb = CircuitBreaker::with_config("test", config(5));
    cb.trip();
    tokio::time::advance(Duration::from_millis(150)).await;

    assert!(fail(&cb).await.is_open());
    let stats = cb.stats();
    assert_eq!(stats.state, CircuitState::Open);
    assert!(stats.next_attempt > tokio::time::Instant::now());

    // Cool-down restarted, so an immediate retry is rejected
    let result: Result<(), CircuitBreakerError<&str>> = cb.call(|| async { Ok(()) }).await;
    assert!(result.unwrap_err().is_open());
}

#[tokio::test(start_paused = true)]
async fn test_success_while_closed_keeps_failure_count() {
    let cb = CircuitBreaker::with_config("test", config(3));
    fail(&cb).await;
    cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap();

    assert_eq!(cb.stats().failure_count, 1);
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_counts_as_failure() {
    let cb = CircuitBreaker::with_config(
        "test",
        CircuitBreakerConfig {
            request_timeout: Duration::from_millis(50),
            ..config(3)
        },
    );

    let result: Result<(), CircuitBreakerError<&str>> = cb
        .call(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

    assert!(matches!(result, Err(CircuitBreakerError::Timeout { .. })));
    let stats = cb.stats();
    assert_eq!(stats.failure_count, 1);
    assert_eq!(stats.last_error.as_deref(), Some("Request timed out after 50ms"));
}

#[tokio::test(start_paused = true)]
async fn test_monitor_rearms_open_circuit() {
    let cb = CircuitBreaker::with_config(
        "test",
        CircuitBreakerConfig {
            reset_timeout: Duration::from_secs(1),
            open_state_timeout: Duration::from_secs(300),
            monitor_interval: Duration::from_millis(100),
            ..config(1)
        },
    );
    fail(&cb).await;
    assert_eq!(cb.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(1300)).await;

    assert!(cb.stats().next_attempt <= tokio::time::Instant::now());
    cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_resets_stuck_half_open() {
    let cb = Arc::new(CircuitBreaker::with_config(
        "test",
        CircuitBreakerConfig {
            reset_timeout: Duration::from_secs(1),
            open_state_timeout: Duration::from_millis(10),
            monitor_interval: Duration::from_millis(100),
            ..config(1)
        },
    ));
    fail(&cb).await;
    tokio::time::advance(Duration::from_millis(20)).await;

    let trial = {
        let cb = Arc::clone(&cb);
        tokio::spawn(async move {
            let _: Result<(), CircuitBreakerError<&str>> =
                cb.call(|| std::future::pending()).await;
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cb.state(), CircuitState::HalfOpen);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.stats().failure_count, 0);

    trial.abort();
}

#[tokio::test(start_paused = true)]
async fn test_half_open_allows_single_trial() {
    let cb = Arc::new(CircuitBreaker::with_config("test", config(1)));
    fail(&cb).await;
    tokio::time::advance(Duration::from_millis(150)).await;

    let trial = {
        let cb = Arc::clone(&cb);
        tokio::spawn(async move {
            let _: Result<(), CircuitBreakerError<&str>> =
                cb.call(|| std::future::pending()).await;
        })
    };
    tokio::task::yield_now().await;

    let second: Result<(), CircuitBreakerError<&str>> = cb.call(|| async { Ok(()) }).await;
    assert!(second.unwrap_err().is_open());

    trial.abort();
}

#[tokio::test(start_paused = true)]
async fn test_dispose_and_reset() {
    let cb = CircuitBreaker::with_config("test", config(1));
    fail(&cb).await;
    cb.reset();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.stats().failure_count, 0);

    assert!(!cb.is_disposed());
    cb.dispose();
    cb.dispose();
    assert!(cb.is_disposed());
}

#[tokio::test(start_paused = true)]
async fn test_stats() {
    let cb = CircuitBreaker::with_config("test", config(10));

    cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    cb.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
    fail(&cb).await;

    let stats = cb.stats();
    assert_eq!(stats.total_calls, 3);
    assert_eq!(stats.total_failures, 1);
    assert!((stats.failure_rate() - 33.33).abs() < 0.1);
}

#[test]
fn test_config_durations_are_milliseconds() {
    let config: CircuitBreakerConfig = serde_json::from_value(serde_json::json!({
        "reset_timeout": 1500,
        "monitor_interval": 250
    }))
    .unwrap();
    assert_eq!(config.reset_timeout, Duration::from_millis(1500));
    assert_eq!(config.monitor_interval, Duration::from_millis(250));
    assert_eq!(config.failure_threshold, CircuitBreakerConfig::default().failure_threshold);

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["reset_timeout"], 1500);
    assert_eq!(json["request_timeout"], config.request_timeout.as_millis() as u64);
}
