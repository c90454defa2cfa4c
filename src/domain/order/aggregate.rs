use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::assignments::TechnicianAssignmentTracker;
use super::cancellation::CancellationPolicy;
use super::commands::{CreateOrderRequest, OrderCommand};
use super::errors::OrderError;
use super::events::*;
use super::history::StatusHistoryLog;
use super::payments::PaymentLedger;
use super::state_machine::OrderStateMachine;
use super::value_objects::{
    ApplianceType, CancellationType, ClientContact, ConceptoOrden, OrderStatus, PaymentMethod, PaymentStatus,
    WarrantyPriority, WarrantyWindow,
};
use super::warranty::WarrantyPolicy;
use crate::domain::aggregate::{Aggregate, CommandContext};

// ============================================================================
// Service Order - Aggregate Root Data
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    // Identity
    pub id: Uuid,
    pub order_number: String,
    pub client: ClientContact,
    pub appliance_type: ApplianceType,
    pub appliance_description: Option<String>,

    // Classification
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    // Money
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub presupuesto_amount: Option<Decimal>,
    #[serde(rename = "includeIVA")]
    pub include_iva: bool,
    pub concepto_orden: Option<ConceptoOrden>,

    // Free text
    pub diagnostics: Option<String>,
    pub razon_no_aprobado: Option<String>,
    pub razon_garantia: Option<String>,
    pub razon_resolucion_garantia: Option<String>,

    // Warranty
    pub garantia_start_date: Option<DateTime<Utc>>,
    pub garantia_end_date: Option<DateTime<Utc>>,
    pub garantia_ilimitada: bool,
    pub garantia_prioridad: Option<WarrantyPriority>,

    // Cancellation
    pub cancellation_notes: Option<String>,
    pub cancellation_type: Option<CancellationType>,
    pub cancellation_date: Option<DateTime<Utc>>,
    pub rescheduled_from_cancellation: bool,

    // Dates
    pub fecha_captacion: Option<DateTime<Utc>>,
    pub fecha_agendado: Option<DateTime<Utc>>,
    pub fecha_seguimiento: Option<DateTime<Utc>>,
    pub fecha_reparacion: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,

    pub client_notifications_enabled: bool,

    // Audit Trail
    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceOrder {
    pub fn warranty_window(&self) -> WarrantyWindow {
        WarrantyWindow {
            start: self.garantia_start_date,
            end: self.garantia_end_date,
            unlimited: self.garantia_ilimitada,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub service_order_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianAssignment {
    pub id: Uuid,
    pub service_order_id: Uuid,
    pub technician_id: Uuid,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: Uuid,
    pub service_order_id: Uuid,
    pub status: OrderStatus,
    pub notes: String,
    pub presupuesto_amount: Option<Decimal>,
    pub created_by: Uuid,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Service Order Aggregate - order plus its owned collections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrderAggregate {
    pub order: ServiceOrder,
    pub payments: Vec<Payment>,
    pub assignments: Vec<TechnicianAssignment>,
    pub history: Vec<StatusHistoryEntry>,
    pub version: i64,
}

impl ServiceOrderAggregate {
    /// Decide the creation event for a new order. The caller allocates the id
    /// and the order number.
    pub fn open(
        order_id: Uuid,
        order_number: String,
        request: &CreateOrderRequest,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        Self::validate_new(request)?;

        let status = request.initial_status();
        let total_amount = request.total_amount.unwrap_or(Decimal::ZERO);

        let order = ServiceOrder {
            id: order_id,
            order_number,
            client: ClientContact {
                name: request.client.name.trim().to_string(),
                phone: request.client.phone.clone(),
            },
            appliance_type: request.appliance_type,
            appliance_description: request.appliance_description.clone(),
            status,
            payment_status: PaymentStatus::derive(Decimal::ZERO, total_amount),
            total_amount,
            paid_amount: Decimal::ZERO,
            presupuesto_amount: None,
            include_iva: false,
            concepto_orden: None,
            diagnostics: request.diagnostics.clone(),
            razon_no_aprobado: None,
            razon_garantia: None,
            razon_resolucion_garantia: None,
            garantia_start_date: None,
            garantia_end_date: None,
            garantia_ilimitada: false,
            garantia_prioridad: None,
            cancellation_notes: None,
            cancellation_type: None,
            cancellation_date: None,
            rescheduled_from_cancellation: false,
            fecha_captacion: Some(request.fecha_captacion.unwrap_or(ctx.now)),
            fecha_agendado: request.fecha_agendado,
            fecha_seguimiento: None,
            fecha_reparacion: None,
            completed_date: None,
            delivered_date: None,
            client_notifications_enabled: request.client_notifications_enabled,
            created_by: ctx.actor_id,
            updated_by: ctx.actor_id,
            created_at: ctx.now,
            updated_at: ctx.now,
        };

        let initial_assignment = request
            .technician_id
            .map(|technician_id| TechnicianAssignmentTracker::new_assignment(order_id, technician_id, None, ctx));

        let history_entry = StatusHistoryLog::record(
            order_id,
            status,
            format!("Order created with status {}", status),
            ctx.actor_id,
            None,
            ctx.now,
        );

        Ok(vec![OrderEvent::Created(OrderCreated { order, initial_assignment, history_entry })])
    }

    pub fn validate_new(request: &CreateOrderRequest) -> Result<(), OrderError> {
        if request.client.name.trim().is_empty() {
            return Err(OrderError::validation("client name is required"));
        }
        if request.client.phone.as_ref().is_some_and(|phone| phone.as_str().trim().is_empty()) {
            return Err(OrderError::validation("client phone must not be blank"));
        }
        if request.total_amount.is_some_and(|total| total < Decimal::ZERO) {
            return Err(OrderError::validation("totalAmount must not be negative"));
        }
        Ok(())
    }

    pub fn active_assignment(&self, technician_id: Uuid) -> Option<&TechnicianAssignment> {
        self.assignments.iter().find(|a| a.is_active && a.technician_id == technician_id)
    }

    /// Stamp the audit columns after a successful command
    pub fn touch(&mut self, ctx: &CommandContext) {
        self.order.updated_by = ctx.actor_id;
        self.order.updated_at = ctx.now;
    }

    fn assignment_mut(&mut self, assignment_id: Uuid) -> Result<&mut TechnicianAssignment, OrderError> {
        self.assignments
            .iter_mut()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| OrderError::InvalidEvent(format!("unknown assignment {}", assignment_id)))
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for ServiceOrderAggregate {
    type Event = OrderEvent;
    type Command = OrderCommand;
    type Error = OrderError;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            OrderEvent::Created(e) => Ok(Self {
                order: e.order.clone(),
                payments: Vec::new(),
                assignments: e.initial_assignment.iter().cloned().collect(),
                history: vec![e.history_entry.clone()],
                version: 0,
            }),
            _ => Err(OrderError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            OrderEvent::Created(_) => Err(OrderError::InvalidEvent("order already created".to_string())),
            OrderEvent::StatusChanged(e) => {
                self.order.status = e.to;
                e.changes.apply_to(&mut self.order);
                StatusHistoryLog::append(&mut self.history, e.history_entry.clone());
                Ok(())
            }
            OrderEvent::FieldsUpdated(e) => {
                e.changes.apply_to(&mut self.order);
                Ok(())
            }
            OrderEvent::PaymentRecorded(e) => {
                self.payments.push(e.payment.clone());
                self.order.paid_amount = e.paid_amount;
                self.order.payment_status = e.payment_status;
                Ok(())
            }
            OrderEvent::TechnicianAssigned(e) => {
                self.assignments.push(e.assignment.clone());
                Ok(())
            }
            OrderEvent::AssignmentNotesUpdated(e) => {
                let assignment = self.assignment_mut(e.assignment_id)?;
                assignment.notes = e.notes.clone();
                assignment.updated_at = e.updated_at;
                Ok(())
            }
            OrderEvent::TechnicianDeactivated(e) => {
                let assignment = self.assignment_mut(e.assignment_id)?;
                assignment.is_active = false;
                assignment.updated_at = e.deactivated_at;
                Ok(())
            }
            OrderEvent::WarrantyPeriodSet(e) => {
                self.order.garantia_start_date = Some(e.start_date);
                self.order.garantia_end_date = e.end_date;
                self.order.garantia_ilimitada = e.unlimited;
                Ok(())
            }
        }
    }

    fn handle_command(&self, command: &Self::Command, ctx: &CommandContext) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::ChangeStatus(request) => OrderStateMachine::change_status(&self.order, request, ctx),
            OrderCommand::RecordPayment(request) => PaymentLedger::record_payment(&self.order, request, ctx),
            OrderCommand::AssignTechnician { technician_id, notes } => {
                TechnicianAssignmentTracker::assign(self, *technician_id, notes.as_deref(), ctx)
            }
            OrderCommand::DeactivateTechnician { technician_id, replacement_technician_id } => {
                TechnicianAssignmentTracker::deactivate(self, *technician_id, *replacement_technician_id, ctx)
            }
            OrderCommand::SetWarrantyPeriod(request) => WarrantyPolicy::set_warranty_period(&self.order, request),
            OrderCommand::ApplyWarrantyDamage(claim) => WarrantyPolicy::apply_warranty_damage(&self.order, claim, ctx),
            OrderCommand::ResolveWarranty(resolution) => {
                WarrantyPolicy::resolve_warranty(&self.order, resolution, ctx)
            }
            OrderCommand::CancelOrReschedule(request) => {
                CancellationPolicy::cancel_or_reschedule(&self.order, request, ctx)
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.order.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Test Fixtures
// ============================================================================

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::order::value_objects::PhoneNumber;

    pub fn actor() -> Uuid {
        Uuid::from_u128(0xA11CE)
    }

    pub fn ctx() -> CommandContext {
        CommandContext::new(actor())
    }

    pub fn intake() -> CreateOrderRequest {
        CreateOrderRequest::new(
            ClientContact {
                name: "Rosa Martinez".to_string(),
                phone: Some(PhoneNumber::new("+525511112222")),
            },
            ApplianceType::Lavadora,
        )
    }

    pub fn new_order(request: &CreateOrderRequest) -> ServiceOrderAggregate {
        let events = ServiceOrderAggregate::open(Uuid::new_v4(), "LAV-0001".to_string(), request, &ctx()).unwrap();
        ServiceOrderAggregate::apply_first_event(&events[0]).unwrap()
    }

    /// An order forced into `status`, bypassing the graph
    pub fn order_in(status: OrderStatus) -> ServiceOrderAggregate {
        let mut aggregate = new_order(&intake());
        aggregate.order.status = status;
        aggregate
    }

    pub fn run(aggregate: &ServiceOrderAggregate, command: OrderCommand) -> Result<ServiceOrderAggregate, OrderError> {
        let events = aggregate.handle_command(&command, &ctx())?;
        let mut next = aggregate.clone();
        next.apply_events(&events)?;
        Ok(next)
    }
}
