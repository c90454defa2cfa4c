use anyhow::{bail, Context};

use crate::domain::order::value_objects::PhoneNumber;
use crate::utils::RetryConfig;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Read from the environment (after `.env` is loaded). Every value has a local
// development default except the optional ones: no REDPANDA_BROKERS means
// messages are only logged, no BOSS_PHONE means the boss is not notified.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Scylla,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationConfig {
    pub boss_phone: Option<PhoneNumber>,
    pub retry: RetryConfig,
    pub redpanda_brokers: Option<String>,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub store: StoreKind,
    pub scylla_node: String,
    pub scylla_keyspace: String,
    pub metrics_port: u16,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store = match get("ORDER_STORE").as_deref() {
            None | Some("memory") => StoreKind::Memory,
            Some("scylla") => StoreKind::Scylla,
            Some(other) => bail!("ORDER_STORE must be 'memory' or 'scylla', got '{}'", other),
        };

        let metrics_port = match get("METRICS_PORT") {
            Some(port) => port.parse().with_context(|| format!("METRICS_PORT is not a port: {}", port))?,
            None => 9090,
        };

        let mut retry = RetryConfig::default();
        if let Some(attempts) = get("NOTIFICATION_MAX_ATTEMPTS") {
            let attempts: u32 = attempts
                .parse()
                .with_context(|| format!("NOTIFICATION_MAX_ATTEMPTS is not a number: {}", attempts))?;
            retry = retry.with_max_attempts(attempts);
        }

        Ok(Self {
            store,
            scylla_node: get("SCYLLA_NODE").unwrap_or_else(|| "127.0.0.1:9042".to_string()),
            scylla_keyspace: get("SCYLLA_KEYSPACE").unwrap_or_else(|| "repair_orders".to_string()),
            metrics_port,
            notifications: NotificationConfig {
                boss_phone: get("BOSS_PHONE").map(PhoneNumber::new),
                retry,
                redpanda_brokers: get("REDPANDA_BROKERS"),
                topic: get("NOTIFICATION_TOPIC").unwrap_or_else(|| "outbound-messages".to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.scylla_node, "127.0.0.1:9042");
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.notifications.boss_phone, None);
        assert_eq!(config.notifications.redpanda_brokers, None);
        assert_eq!(config.notifications.topic, "outbound-messages");
        assert_eq!(config.notifications.retry.max_attempts, 3);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ORDER_STORE", "scylla"),
            ("METRICS_PORT", "9100"),
            ("BOSS_PHONE", "+525500000001"),
            ("REDPANDA_BROKERS", "10.0.0.5:9092"),
            ("NOTIFICATION_MAX_ATTEMPTS", "5"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreKind::Scylla);
        assert_eq!(config.metrics_port, 9100);
        assert_eq!(config.notifications.boss_phone, Some(PhoneNumber::new("+525500000001")));
        assert_eq!(config.notifications.redpanda_brokers.as_deref(), Some("10.0.0.5:9092"));
        assert_eq!(config.notifications.retry.max_attempts, 5);
    }

    #[test]
    fn test_blank_boss_phone_is_unset() {
        let config = config(&[("BOSS_PHONE", "   ")]).unwrap();
        assert_eq!(config.notifications.boss_phone, None);
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(config(&[("ORDER_STORE", "postgres")]).is_err());
        assert!(config(&[("METRICS_PORT", "http")]).is_err());
        assert!(config(&[("NOTIFICATION_MAX_ATTEMPTS", "-1")]).is_err());
    }
}
