use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use repair_orders::config::{AppConfig, StoreKind};
use repair_orders::domain::order::{
    ApprovalPayload, ApplianceType, ChangeStatusRequest, ClientContact, CreateOrderRequest, OperationResult,
    OrderCommandHandler, PaymentMethod, PhoneNumber, QuotePayload, RecordPaymentRequest, WarrantyPeriodRequest,
    WarrantyPriority,
};
use repair_orders::messaging::RedpandaDispatcher;
use repair_orders::metrics::{self, Metrics};
use repair_orders::notifications::{LoggingDispatcher, MessageComposer, NotificationDispatcher, NotificationRouter};
use repair_orders::store::{InMemoryOrderRepository, OrderRepository, ScyllaOrderRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Default to INFO, override with RUST_LOG (e.g. RUST_LOG=debug)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,repair_orders=debug")))
        .init();

    tracing::info!("🚀 Starting service order lifecycle demo");

    let config = AppConfig::from_env()?;

    // === 1. Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metric families", metrics.registry().gather().len());

    let server_metrics = metrics.clone();
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(server_metrics, metrics_port)) {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 2. Order repository ===
    let repository: Arc<dyn OrderRepository> = match config.store {
        StoreKind::Memory => {
            tracing::info!("Using in-memory order store");
            Arc::new(InMemoryOrderRepository::new())
        }
        StoreKind::Scylla => {
            Arc::new(ScyllaOrderRepository::connect(&config.scylla_node, &config.scylla_keyspace).await?)
        }
    };

    // === 3. Notification transport (Redpanda with circuit breaker, or log only) ===
    let notifications = &config.notifications;
    let transport: Arc<dyn NotificationDispatcher> = match &notifications.redpanda_brokers {
        Some(brokers) => {
            Arc::new(RedpandaDispatcher::new(brokers, notifications.topic.clone())?.with_metrics(metrics.clone()))
        }
        None => {
            tracing::info!("REDPANDA_BROKERS not set, notifications are logged only");
            Arc::new(LoggingDispatcher)
        }
    };

    let router = NotificationRouter::new(
        MessageComposer::new(notifications.boss_phone.clone()),
        transport,
        notifications.retry.clone(),
    )
    .with_metrics(metrics.clone());

    let handler = OrderCommandHandler::new(repository)
        .with_notifications(router)
        .with_metrics(metrics.clone());

    // === 4. Walk one order through its lifecycle ===
    tracing::info!("📝 Demonstrating a repair order lifecycle");
    let clerk = Uuid::new_v4();
    let technician = Uuid::new_v4();

    let mut intake = CreateOrderRequest::new(
        ClientContact {
            name: "Rosa Martinez".to_string(),
            phone: Some(PhoneNumber::new("+525511112222")),
        },
        ApplianceType::Lavadora,
    );
    intake.appliance_description = Some("Top-load washer, does not spin".to_string());
    intake.technician_id = Some(technician);

    let order = handler.create_order(intake, clerk).await?;
    let order_id = order.id;
    tracing::info!("✅ Order {} created in {}", order.order_number, order.status);

    let quote = ChangeStatusRequest::Facturado(QuotePayload {
        presupuesto_amount: Some(Decimal::from(1200)),
        include_iva: Some(true),
        diagnostics: Some("Worn drive belt and clutch".to_string()),
        ..Default::default()
    });
    let order = handler.change_status(order_id, quote, technician).await?;
    tracing::info!("✅ Quoted, total {}", order.total_amount);

    let approval = ChangeStatusRequest::Aprobado(ApprovalPayload {
        fecha_reparacion: Some(Utc::now() + Duration::days(2)),
    });
    let order = handler.change_status(order_id, approval, clerk).await?;
    tracing::info!("✅ Approved, now {}", order.status);

    let deposit = RecordPaymentRequest {
        amount: Decimal::from(600),
        method: PaymentMethod::Cash,
        reference: None,
        notes: Some("Deposit".to_string()),
    };
    handler.record_payment(order_id, deposit, clerk).await?;

    handler.change_status(order_id, ChangeStatusRequest::Completed, technician).await?;
    let order = handler.change_status(order_id, ChangeStatusRequest::Delivered, clerk).await?;

    let balance = RecordPaymentRequest {
        amount: order.total_amount - order.paid_amount,
        method: PaymentMethod::Transfer,
        reference: Some("SPEI-48213".to_string()),
        notes: None,
    };
    handler.record_payment(order_id, balance, clerk).await?;
    tracing::info!("✅ Delivered and paid");

    // Uniform envelope for a rejected request
    let rejected: OperationResult<_> =
        handler.change_status(order_id, ChangeStatusRequest::Completed, clerk).await.into();
    tracing::info!("Rejected request envelope: {}", serde_json::to_string(&rejected)?);

    let period = WarrantyPeriodRequest {
        start_date: Utc::now(),
        end_date: Some(Utc::now() + Duration::days(90)),
        is_unlimited: false,
    };
    handler.set_warranty_period(order_id, period, clerk).await?;

    handler
        .apply_warranty_damage(order_id, "Drum noise after repair".to_string(), WarrantyPriority::Alta, clerk)
        .await?;
    let order = handler
        .resolve_warranty(order_id, "Replaced drum bearing under warranty".to_string(), technician)
        .await?;
    tracing::info!("✅ Warranty resolved, order back to {}", order.status);

    for entry in handler.status_history(order_id).await? {
        tracing::info!("  {} {} - {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.status, entry.notes);
    }

    // Let background notification sends finish
    tracing::info!("⏳ Waiting for notifications to drain...");
    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;

    tracing::info!("🎉 Demo complete!");
    Ok(())
}
