use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker
// ============================================================================
//
// Guards an outbound transport. After `failure_threshold` consecutive failures
// calls are rejected without touching the transport until `open_timeout` has
// passed; then a trial call is let through (HalfOpen) and `success_threshold`
// successes close the circuit again.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge encoding: 0 = closed, 1 = open, 2 = half-open
    pub fn as_gauge(self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit '{0}' is open")]
    CircuitOpen(String),
    #[error("{0}")]
    OperationFailed(E),
}

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            })),
        }
    }

    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.state == CircuitState::Open {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed < self.config.open_timeout {
                    return Err(CircuitBreakerError::CircuitOpen(self.name.clone()));
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        let outcome = operation.await;

        let mut inner = self.inner.lock().await;
        match outcome {
            Ok(value) => {
                inner.consecutive_failures = 0;
                if inner.state == CircuitState::HalfOpen {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.config.success_threshold {
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                }
                Ok(value)
            }
            Err(err) => {
                inner.consecutive_failures += 1;
                let trips = inner.state == CircuitState::HalfOpen
                    || inner.consecutive_failures >= self.config.failure_threshold;
                if trips && inner.state != CircuitState::Open {
                    self.transition(&mut inner, CircuitState::Open);
                }
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn transition(&self, inner: &mut BreakerState, next: CircuitState) {
        tracing::warn!(
            circuit = %self.name,
            from = ?inner.state,
            to = ?next,
            consecutive_failures = inner.consecutive_failures,
            "Circuit breaker state change"
        );
        inner.state = next;
        inner.half_open_successes = 0;
        match next {
            CircuitState::Open => inner.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test-transport",
            CircuitBreakerConfig { failure_threshold, open_timeout, success_threshold: 1 },
        )
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(cb.call(async { Err::<(), _>("broker down") }).await.is_err());
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        let rejected = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(rejected, Err(CircuitBreakerError::CircuitOpen(name)) if name == cb.name()));
        assert_eq!(cb.name(), "test-transport");
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let cb = breaker(2, Duration::from_secs(60));

        let _ = cb.call(async { Err::<(), _>("blip") }).await;
        let _ = cb.call(async { Ok::<_, &str>(()) }).await;
        let _ = cb.call(async { Err::<(), _>("blip") }).await;

        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_closes_circuit() {
        let cb = breaker(1, Duration::from_millis(50));

        let _ = cb.call(async { Err::<(), _>("broker down") }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(cb.call(async { Ok::<_, &str>(()) }).await.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(50));

        let _ = cb.call(async { Err::<(), _>("broker down") }).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _ = cb.call(async { Err::<(), _>("still down") }).await;

        assert_eq!(cb.state().await, CircuitState::Open);
        assert_eq!(CircuitState::Open.as_gauge(), 1);
    }
}
