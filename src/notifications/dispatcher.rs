use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tokio::task::JoinHandle;

use super::composer::{MessageComposer, OutboundMessage};
use crate::domain::order::events::NotificationEvent;
use crate::domain::order::value_objects::PhoneNumber;
use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, IsTransient, RetryConfig, RetryResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl IsTransient for NotificationError {
    fn is_transient(&self) -> bool {
        !matches!(self, NotificationError::InvalidDestination(_))
    }
}

/// Best-effort outbound messaging (WhatsApp gateway, broker topic, log).
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, destination: &PhoneNumber, message: &str) -> Result<(), NotificationError>;
}

/// Logs messages instead of sending them.
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn send(&self, destination: &PhoneNumber, message: &str) -> Result<(), NotificationError> {
        tracing::info!(destination = %destination, message, "Notification (log transport)");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

// ============================================================================
// Notification Router
// ============================================================================
//
// Runs after the order is saved. Failures are logged and counted, never
// surfaced to the caller of the order operation.
//
// ============================================================================

#[derive(Clone)]
pub struct NotificationRouter {
    composer: MessageComposer,
    transport: Arc<dyn NotificationDispatcher>,
    retry: RetryConfig,
    metrics: Option<Arc<Metrics>>,
}

impl NotificationRouter {
    pub fn new(composer: MessageComposer, transport: Arc<dyn NotificationDispatcher>, retry: RetryConfig) -> Self {
        Self { composer, transport, retry, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn compose(&self, events: &[NotificationEvent]) -> Vec<OutboundMessage> {
        events.iter().flat_map(|event| self.composer.compose(event)).collect()
    }

    /// Deliver in the background. `None` when there is nothing to say.
    pub fn spawn(&self, events: Vec<NotificationEvent>) -> Option<JoinHandle<DispatchReport>> {
        let messages = self.compose(&events);
        if messages.is_empty() {
            return None;
        }

        let router = self.clone();
        Some(tokio::spawn(async move { router.deliver(messages).await }))
    }

    pub async fn deliver(&self, messages: Vec<OutboundMessage>) -> DispatchReport {
        let outcomes = join_all(messages.iter().map(|message| self.deliver_one(message))).await;

        let sent = outcomes.iter().filter(|delivered| **delivered).count();
        let report = DispatchReport { sent, failed: outcomes.len() - sent };
        tracing::debug!(sent = report.sent, failed = report.failed, "Notification batch finished");
        report
    }

    async fn deliver_one(&self, message: &OutboundMessage) -> bool {
        let transport = &self.transport;
        let metrics = self.metrics.as_deref();
        let destination = &message.destination;
        let body = message.body.as_str();

        let outcome = retry_with_backoff(&self.retry, move |attempt| {
            if attempt > 1 {
                if let Some(metrics) = metrics {
                    metrics.record_retry_attempt("notification_send", attempt);
                }
            }
            transport.send(destination, body)
        })
        .await;

        let delivered = outcome.is_success();
        let attempts = outcome.attempts();
        match outcome {
            RetryResult::Success { .. } => {
                tracing::debug!(
                    order_id = %message.order_id,
                    audience = message.audience.as_str(),
                    attempts,
                    "Notification sent"
                );
            }
            RetryResult::Failed { error, .. } | RetryResult::PermanentFailure { error, .. } => {
                tracing::warn!(
                    order_id = %message.order_id,
                    audience = message.audience.as_str(),
                    attempts,
                    error = %error,
                    "Notification dropped"
                );
            }
        }

        if let Some(metrics) = metrics {
            metrics.record_notification(message.audience.as_str(), delivered);
        }
        delivered
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every message; optionally fails the first `failures` sends.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        pub sent: Mutex<Vec<(String, String)>>,
        failures: Mutex<u32>,
    }

    impl RecordingDispatcher {
        pub fn failing(failures: u32) -> Self {
            Self { sent: Mutex::new(Vec::new()), failures: Mutex::new(failures) }
        }
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn send(&self, destination: &PhoneNumber, message: &str) -> Result<(), NotificationError> {
            let mut failures = self.failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(NotificationError::Transport("gateway timeout".to_string()));
            }
            self.sent.lock().await.push((destination.to_string(), message.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingDispatcher;
    use super::*;
    use crate::domain::order::events::NotificationContext;
    use crate::domain::order::value_objects::{ClientContact, OrderStatus};
    use std::time::Duration;
    use uuid::Uuid;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    fn created_event() -> NotificationEvent {
        NotificationEvent::OrderCreated {
            context: NotificationContext {
                order_id: Uuid::new_v4(),
                order_number: "REF-0001".to_string(),
                client: ClientContact {
                    name: "Luis".to_string(),
                    phone: Some(PhoneNumber::new("+525512345678")),
                },
                notify_client: true,
            },
            status: OrderStatus::Preorder,
        }
    }

    #[tokio::test]
    async fn test_router_sends_client_and_boss() {
        let transport = Arc::new(RecordingDispatcher::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let router = NotificationRouter::new(
            MessageComposer::new(Some(PhoneNumber::new("+525500000001"))),
            transport.clone(),
            fast_retry(3),
        )
        .with_metrics(metrics.clone());

        let report = router.spawn(vec![created_event()]).unwrap().await.unwrap();

        assert_eq!(report, DispatchReport { sent: 2, failed: 0 });
        assert_eq!(transport.sent.lock().await.len(), 2);
        assert_eq!(metrics.notifications_sent.with_label_values(&["boss"]).get(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let transport = Arc::new(RecordingDispatcher::failing(2));
        let router = NotificationRouter::new(MessageComposer::new(None), transport.clone(), fast_retry(3));

        let report = router.deliver(router.compose(&[created_event()])).await;

        assert_eq!(report, DispatchReport { sent: 1, failed: 0 });
    }

    #[tokio::test]
    async fn test_exhausted_retries_count_as_failed() {
        let transport = Arc::new(RecordingDispatcher::failing(10));
        let router = NotificationRouter::new(MessageComposer::new(None), transport.clone(), fast_retry(2));

        let report = router.deliver(router.compose(&[created_event()])).await;

        assert_eq!(report, DispatchReport { sent: 0, failed: 1 });
        assert!(transport.sent.lock().await.is_empty());
    }

    #[test]
    fn test_nothing_to_send_spawns_nothing() {
        let router = NotificationRouter::new(
            MessageComposer::new(None),
            Arc::new(LoggingDispatcher),
            RetryConfig::default(),
        );
        assert!(router.spawn(Vec::new()).is_none());
    }

    #[test]
    fn test_invalid_destination_is_permanent() {
        assert!(!NotificationError::InvalidDestination("".to_string()).is_transient());
        assert!(NotificationError::Unavailable("circuit open".to_string()).is_transient());
    }
}
