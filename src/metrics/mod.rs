mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Order operations (outcome counts, latency)
// - Status transitions by edge
// - Payments by method
// - Notification delivery per audience, with retries
// - Outbound transport circuit breaker
//
// Everything is registered on one Registry scraped via /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub order_operations: IntCounterVec,
    pub order_operation_duration: HistogramVec,
    pub status_transitions: IntCounterVec,
    pub payments_recorded: IntCounterVec,

    pub notifications_sent: IntCounterVec,
    pub notifications_failed: IntCounterVec,
    pub retry_attempts_total: IntCounterVec,

    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let order_operations = IntCounterVec::new(
            Opts::new("order_operations_total", "Service order operations by outcome"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(order_operations.clone()))?;

        let order_operation_duration = HistogramVec::new(
            HistogramOpts::new("order_operation_duration_seconds", "Service order operation latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(order_operation_duration.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Persisted status changes by edge"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let payments_recorded = IntCounterVec::new(
            Opts::new("payments_recorded_total", "Payments recorded by method"),
            &["method"],
        )?;
        registry.register(Box::new(payments_recorded.clone()))?;

        let notifications_sent = IntCounterVec::new(
            Opts::new("notifications_sent_total", "Notifications delivered to the transport"),
            &["audience"],
        )?;
        registry.register(Box::new(notifications_sent.clone()))?;

        let notifications_failed = IntCounterVec::new(
            Opts::new("notifications_failed_total", "Notifications dropped after retries"),
            &["audience"],
        )?;
        registry.register(Box::new(notifications_failed.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Attempts used by retried operations"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Outbound transport circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            order_operations,
            order_operation_duration,
            status_transitions,
            payments_recorded,
            notifications_sent,
            notifications_failed,
            retry_attempts_total,
            circuit_breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_operation(&self, operation: &str, duration_secs: f64, outcome: &str) {
        self.order_operations.with_label_values(&[operation, outcome]).inc();
        self.order_operation_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_payment(&self, method: &str) {
        self.payments_recorded.with_label_values(&[method]).inc();
    }

    pub fn record_notification(&self, audience: &str, delivered: bool) {
        if delivered {
            self.notifications_sent.with_label_values(&[audience]).inc();
        } else {
            self.notifications_failed.with_label_values(&[audience]).inc();
        }
    }

    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total.with_label_values(&[operation, &attempt.to_string()]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: i64) {
        self.circuit_breaker_state.set(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_value(metrics: &Metrics, name: &str) -> f64 {
        metrics
            .registry()
            .gather()
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.metric.iter().map(|s| s.counter.value.unwrap_or(0.0)).sum())
            .unwrap_or(0.0)
    }

    #[test]
    fn test_record_operation_counts_and_times() {
        let metrics = Metrics::new().unwrap();
        metrics.record_operation("change_status", 0.002, "ok");
        metrics.record_operation("change_status", 0.004, "VALIDATION_ERROR");

        assert_eq!(counter_value(&metrics, "order_operations_total"), 2.0);
    }

    #[test]
    fn test_notification_outcomes_use_separate_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_notification("client", true);
        metrics.record_notification("boss", true);
        metrics.record_notification("boss", false);

        assert_eq!(counter_value(&metrics, "notifications_sent_total"), 2.0);
        assert_eq!(counter_value(&metrics, "notifications_failed_total"), 1.0);
    }

    #[test]
    fn test_transition_labels() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("ASSIGNED", "FACTURADO");
        metrics.record_transition("FACTURADO", "APROBADO");

        let gathered = metrics.registry().gather();
        let transitions = gathered.iter().find(|m| m.name() == "order_status_transitions_total").unwrap();
        assert_eq!(transitions.metric.len(), 2);
    }

    #[test]
    fn test_circuit_breaker_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.update_circuit_breaker_state(1);

        let gathered = metrics.registry().gather();
        let state = gathered.iter().find(|m| m.name() == "circuit_breaker_state").unwrap();
        assert_eq!(state.metric[0].gauge.value, Some(1.0));
    }
}
