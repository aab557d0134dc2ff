//! Failure isolation for calls into unreliable collaborators
//!
//! The bridge guards the backend probe path with a circuit breaker so that a
//! missing or wedged CLI fails fast instead of stalling every handshake.
//! Handler calls and background tasks run behind a panic guard.

pub mod circuit_breaker;
pub mod panic;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerStats, CircuitState,
};
pub use panic::{catch_panic, panic_message, spawn_logged};
