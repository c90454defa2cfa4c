use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use serde::Serialize;

use crate::domain::order::value_objects::PhoneNumber;
use crate::metrics::Metrics;
use crate::notifications::{NotificationDispatcher, NotificationError};
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

/// What the WhatsApp gateway consumes from the outbound topic
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEnvelope<'a> {
    pub destination: &'a str,
    pub message: &'a str,
    pub sent_at: DateTime<Utc>,
}

/// Publishes outbound messages to a Redpanda topic, keyed by destination so
/// one recipient's messages stay ordered.
pub struct RedpandaDispatcher {
    producer: FutureProducer,
    topic: String,
    circuit_breaker: CircuitBreaker,
    metrics: Option<Arc<Metrics>>,
}

impl RedpandaDispatcher {
    pub fn new(brokers: &str, topic: impl Into<String>) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
        };

        let topic = topic.into();
        tracing::info!(brokers, topic = %topic, "Redpanda notification transport ready");

        Ok(Self {
            producer,
            topic,
            circuit_breaker: CircuitBreaker::new("redpanda", cb_config),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn publish(&self, key: &str, payload: &str) -> Result<(), NotificationError> {
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(&self.topic).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(Duration::from_secs(5)))
                    .await
                    .map(|_| ())
                    .map_err(|(e, _)| e.to_string())
            })
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.update_circuit_breaker_state(self.circuit_breaker.state().await.as_gauge());
        }

        match result {
            Ok(()) => {
                tracing::debug!(topic = %self.topic, key, circuit = self.circuit_breaker.name(), "Published to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen(name)) => {
                tracing::error!(topic = %self.topic, circuit = %name, "Circuit breaker open - Redpanda unavailable");
                Err(NotificationError::Unavailable(format!("circuit '{}' is open", name)))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(
                    error = %e,
                    topic = %self.topic,
                    circuit = self.circuit_breaker.name(),
                    "Failed to publish to Redpanda"
                );
                Err(NotificationError::Transport(e))
            }
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RedpandaDispatcher {
    async fn send(&self, destination: &PhoneNumber, message: &str) -> Result<(), NotificationError> {
        let destination = destination.as_str().trim();
        if destination.is_empty() {
            return Err(NotificationError::InvalidDestination("empty phone number".to_string()));
        }

        let envelope = OutboundEnvelope { destination, message, sent_at: Utc::now() };
        let payload =
            serde_json::to_string(&envelope).map_err(|e| NotificationError::Transport(e.to_string()))?;

        self.publish(destination, &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_shape() {
        let sent_at = Utc.with_ymd_and_hms(2026, 3, 1, 15, 30, 0).unwrap();
        let envelope = OutboundEnvelope {
            destination: "+525511112222",
            message: "Hola Rosa",
            sent_at,
        };

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "destination": "+525511112222",
                "message": "Hola Rosa",
                "sentAt": "2026-03-01T15:30:00Z"
            })
        );
    }
}
