pub mod circuit_breaker;
pub mod keyed_lock;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
pub use keyed_lock::KeyedLocks;
pub use retry::{retry_with_backoff, IsTransient, RetryConfig, RetryResult};
