use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use super::aggregate::{Payment, ServiceOrder, ServiceOrderAggregate, StatusHistoryEntry, TechnicianAssignment};
use super::commands::{
    CancellationRequest, ChangeStatusRequest, CreateOrderRequest, OrderCommand, RecordPaymentRequest,
    WarrantyClaim, WarrantyPeriodRequest, WarrantyResolution,
};
use super::errors::OrderError;
use super::events::{NotificationEvent, OrderEvent};
use super::history::StatusHistoryLog;
use super::value_objects::WarrantyPriority;
use crate::domain::aggregate::{Aggregate, CommandContext};
use crate::metrics::Metrics;
use crate::notifications::NotificationRouter;
use crate::store::OrderRepository;
use crate::utils::KeyedLocks;

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: lock → load → Command → Aggregate → Events → save → notify
//
// One writer per order id inside this process; the repository's version check
// covers writers in other processes.
//
// ============================================================================

pub struct OrderCommandHandler {
    repository: Arc<dyn OrderRepository>,
    notifications: Option<NotificationRouter>,
    metrics: Option<Arc<Metrics>>,
    locks: KeyedLocks<Uuid>,
}

impl OrderCommandHandler {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self {
            repository,
            notifications: None,
            metrics: None,
            locks: KeyedLocks::new(),
        }
    }

    pub fn with_notifications(mut self, router: NotificationRouter) -> Self {
        self.notifications = Some(router);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_order(&self, request: CreateOrderRequest, actor_id: Uuid) -> Result<ServiceOrder, OrderError> {
        let started = Instant::now();
        let result = self.open(&request, actor_id).await;
        self.observe("create_order", started, result.as_ref().map(|_| ()));

        let (aggregate, events) = result?;
        tracing::info!(
            order_id = %aggregate.order.id,
            order_number = %aggregate.order.order_number,
            status = %aggregate.order.status,
            "Service order created"
        );
        self.after_save(&aggregate, &events);
        Ok(aggregate.order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn change_status(
        &self,
        order_id: Uuid,
        request: ChangeStatusRequest,
        actor_id: Uuid,
    ) -> Result<ServiceOrder, OrderError> {
        let aggregate = self.execute(order_id, OrderCommand::ChangeStatus(request), actor_id).await?;
        Ok(aggregate.order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn record_payment(
        &self,
        order_id: Uuid,
        request: RecordPaymentRequest,
        actor_id: Uuid,
    ) -> Result<Payment, OrderError> {
        let aggregate = self.execute(order_id, OrderCommand::RecordPayment(request), actor_id).await?;
        aggregate
            .payments
            .last()
            .cloned()
            .ok_or_else(|| OrderError::InvalidEvent("payment was not recorded".to_string()))
    }

    /// Returns the technician's active assignment after the change
    #[tracing::instrument(skip(self))]
    pub async fn assign_technician(
        &self,
        order_id: Uuid,
        technician_id: Uuid,
        notes: Option<String>,
        actor_id: Uuid,
    ) -> Result<TechnicianAssignment, OrderError> {
        let command = OrderCommand::AssignTechnician { technician_id, notes };
        let aggregate = self.execute(order_id, command, actor_id).await?;
        aggregate
            .active_assignment(technician_id)
            .cloned()
            .ok_or_else(|| OrderError::InvalidEvent(format!("technician {} not assigned", technician_id)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_technician_assignment(
        &self,
        order_id: Uuid,
        technician_id: Uuid,
        replacement_technician_id: Option<Uuid>,
        actor_id: Uuid,
    ) -> Result<ServiceOrderAggregate, OrderError> {
        let command = OrderCommand::DeactivateTechnician { technician_id, replacement_technician_id };
        self.execute(order_id, command, actor_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn apply_warranty_damage(
        &self,
        order_id: Uuid,
        razon_garantia: String,
        garantia_prioridad: WarrantyPriority,
        actor_id: Uuid,
    ) -> Result<ServiceOrder, OrderError> {
        let claim = WarrantyClaim { razon_garantia, garantia_prioridad };
        let aggregate = self.execute(order_id, OrderCommand::ApplyWarrantyDamage(claim), actor_id).await?;
        Ok(aggregate.order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_warranty_period(
        &self,
        order_id: Uuid,
        request: WarrantyPeriodRequest,
        actor_id: Uuid,
    ) -> Result<ServiceOrder, OrderError> {
        let aggregate = self.execute(order_id, OrderCommand::SetWarrantyPeriod(request), actor_id).await?;
        Ok(aggregate.order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve_warranty(
        &self,
        order_id: Uuid,
        razon_resolucion_garantia: String,
        actor_id: Uuid,
    ) -> Result<ServiceOrder, OrderError> {
        let resolution = WarrantyResolution { razon_resolucion_garantia };
        let aggregate = self.execute(order_id, OrderCommand::ResolveWarranty(resolution), actor_id).await?;
        Ok(aggregate.order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_or_reschedule(
        &self,
        order_id: Uuid,
        request: CancellationRequest,
        actor_id: Uuid,
    ) -> Result<ServiceOrder, OrderError> {
        let aggregate = self.execute(order_id, OrderCommand::CancelOrReschedule(request), actor_id).await?;
        Ok(aggregate.order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<ServiceOrderAggregate, OrderError> {
        Ok(self.repository.load(order_id).await?)
    }

    /// Newest first
    pub async fn status_history(&self, order_id: Uuid) -> Result<Vec<StatusHistoryEntry>, OrderError> {
        let aggregate = self.repository.load(order_id).await?;
        Ok(StatusHistoryLog::list(&aggregate.history))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), OrderError> {
        let _guard = self.locks.acquire(&order_id).await;
        self.repository.delete(order_id).await?;
        tracing::info!(order_id = %order_id, "Service order deleted");
        Ok(())
    }

    async fn open(
        &self,
        request: &CreateOrderRequest,
        actor_id: Uuid,
    ) -> Result<(ServiceOrderAggregate, Vec<OrderEvent>), OrderError> {
        ServiceOrderAggregate::validate_new(request)?;
        let ctx = CommandContext::new(actor_id);

        let sequence = self.repository.next_order_sequence(request.appliance_type.prefix()).await?;
        let order_number = request.appliance_type.order_number(sequence);

        let events = ServiceOrderAggregate::open(Uuid::now_v7(), order_number, request, &ctx)?;
        let (first, rest) = events.split_first().ok_or(OrderError::NotInitialized)?;

        let mut aggregate = ServiceOrderAggregate::apply_first_event(first)?;
        aggregate.apply_events(rest)?;
        aggregate.version = self.repository.save(&aggregate, 0).await?;

        Ok((aggregate, events))
    }

    async fn execute(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        actor_id: Uuid,
    ) -> Result<ServiceOrderAggregate, OrderError> {
        let operation = command.name();
        let started = Instant::now();

        let result = self.apply(order_id, &command, actor_id).await;
        self.observe(operation, started, result.as_ref().map(|_| ()));

        match result {
            Ok((aggregate, events)) => {
                self.after_save(&aggregate, &events);
                Ok(aggregate)
            }
            Err(err) => {
                tracing::warn!(order_id = %order_id, operation, error = %err, code = err.code(), "Command rejected");
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        order_id: Uuid,
        command: &OrderCommand,
        actor_id: Uuid,
    ) -> Result<(ServiceOrderAggregate, Vec<OrderEvent>), OrderError> {
        let _guard = self.locks.acquire(&order_id).await;

        let current = self.repository.load(order_id).await?;
        let ctx = CommandContext::new(actor_id);

        let events = current.handle_command(command, &ctx)?;
        if events.is_empty() {
            tracing::debug!(order_id = %order_id, operation = command.name(), "Nothing to change");
            return Ok((current, events));
        }

        let mut next = current.clone();
        next.apply_events(&events)?;
        next.touch(&ctx);
        next.version = self.repository.save(&next, current.version()).await?;

        Ok((next, events))
    }

    fn after_save(&self, aggregate: &ServiceOrderAggregate, events: &[OrderEvent]) {
        for event in events {
            tracing::debug!(
                order_id = %aggregate.order.id,
                event_type = event.event_type(),
                version = aggregate.version,
                "Order event persisted"
            );

            if let Some(metrics) = &self.metrics {
                match event {
                    OrderEvent::StatusChanged(changed) => {
                        metrics.record_transition(changed.from.as_str(), changed.to.as_str())
                    }
                    OrderEvent::PaymentRecorded(recorded) => {
                        metrics.record_payment(&recorded.payment.method.to_string())
                    }
                    _ => {}
                }
            }
        }

        if let Some(router) = &self.notifications {
            router.spawn(NotificationEvent::from_events(&aggregate.order, events));
        }
    }

    fn observe(&self, operation: &str, started: Instant, result: Result<(), &OrderError>) {
        if let Some(metrics) = &self.metrics {
            let outcome = match result {
                Ok(()) => "success",
                Err(err) => err.code(),
            };
            metrics.record_operation(operation, started.elapsed().as_secs_f64(), outcome);
        }
    }
}
