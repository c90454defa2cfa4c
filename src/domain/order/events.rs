use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::{Payment, ServiceOrder, StatusHistoryEntry, TechnicianAssignment};
use super::payments::PaymentLedger;
use super::value_objects::{
    CancellationType, ClientContact, ConceptoOrden, OrderStatus, PaymentMethod, PaymentStatus, WarrantyPriority,
};

// ============================================================================
// Order Domain Events
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Created(OrderCreated),
    StatusChanged(OrderStatusChanged),
    FieldsUpdated(OrderFieldsUpdated),
    PaymentRecorded(PaymentRecorded),
    TechnicianAssigned(TechnicianAssigned),
    AssignmentNotesUpdated(AssignmentNotesUpdated),
    TechnicianDeactivated(TechnicianDeactivated),
    WarrantyPeriodSet(WarrantyPeriodSet),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "OrderCreated",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::FieldsUpdated(_) => "OrderFieldsUpdated",
            OrderEvent::PaymentRecorded(_) => "PaymentRecorded",
            OrderEvent::TechnicianAssigned(_) => "TechnicianAssigned",
            OrderEvent::AssignmentNotesUpdated(_) => "AssignmentNotesUpdated",
            OrderEvent::TechnicianDeactivated(_) => "TechnicianDeactivated",
            OrderEvent::WarrantyPeriodSet(_) => "WarrantyPeriodSet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order: ServiceOrder,
    pub initial_assignment: Option<TechnicianAssignment>,
    pub history_entry: StatusHistoryEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// What the caller asked for; differs from `to` for the mapped edges
    /// (APROBADO with a repair date, GARANTIA_RESUELTA).
    pub requested: OrderStatus,
    pub changes: OrderFieldChanges,
    pub history_entry: StatusHistoryEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFieldsUpdated {
    pub changes: OrderFieldChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub payment: Payment,
    pub paid_amount: Decimal,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianAssigned {
    pub assignment: TechnicianAssignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentNotesUpdated {
    pub assignment_id: Uuid,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianDeactivated {
    pub assignment_id: Uuid,
    pub technician_id: Uuid,
    pub deactivated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarrantyPeriodSet {
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub unlimited: bool,
}

// ============================================================================
// Field Changes - the order columns a transition writes besides `status`
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CancellationUpdate {
    Record {
        notes: String,
        kind: CancellationType,
        date: DateTime<Utc>,
    },
    Clear,
}

/// `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderFieldChanges {
    pub total_amount: Option<Decimal>,
    pub payment_status: Option<PaymentStatus>,
    pub presupuesto_amount: Option<Decimal>,
    pub include_iva: Option<bool>,
    pub concepto_orden: Option<ConceptoOrden>,
    pub diagnostics: Option<String>,
    pub razon_no_aprobado: Option<String>,
    pub razon_garantia: Option<String>,
    pub garantia_prioridad: Option<WarrantyPriority>,
    pub razon_resolucion_garantia: Option<String>,
    pub fecha_agendado: Option<DateTime<Utc>>,
    pub fecha_seguimiento: Option<DateTime<Utc>>,
    pub fecha_reparacion: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub delivered_date: Option<DateTime<Utc>>,
    pub cancellation: Option<CancellationUpdate>,
    pub rescheduled_from_cancellation: Option<bool>,
}

impl OrderFieldChanges {
    pub fn is_empty(&self) -> bool {
        *self == OrderFieldChanges::default()
    }

    pub fn apply_to(&self, order: &mut ServiceOrder) {
        if let Some(total) = self.total_amount {
            order.total_amount = total;
        }
        if let Some(status) = self.payment_status {
            order.payment_status = status;
        }
        if let Some(amount) = self.presupuesto_amount {
            order.presupuesto_amount = Some(amount);
        }
        if let Some(include_iva) = self.include_iva {
            order.include_iva = include_iva;
        }
        if let Some(concepto) = &self.concepto_orden {
            order.concepto_orden = Some(concepto.clone());
        }
        if let Some(diagnostics) = &self.diagnostics {
            order.diagnostics = Some(diagnostics.clone());
        }
        if let Some(reason) = &self.razon_no_aprobado {
            order.razon_no_aprobado = Some(reason.clone());
        }
        if let Some(reason) = &self.razon_garantia {
            order.razon_garantia = Some(reason.clone());
        }
        if let Some(priority) = self.garantia_prioridad {
            order.garantia_prioridad = Some(priority);
        }
        if let Some(reason) = &self.razon_resolucion_garantia {
            order.razon_resolucion_garantia = Some(reason.clone());
        }
        if let Some(date) = self.fecha_agendado {
            order.fecha_agendado = Some(date);
        }
        if let Some(date) = self.fecha_seguimiento {
            order.fecha_seguimiento = Some(date);
        }
        if let Some(date) = self.fecha_reparacion {
            order.fecha_reparacion = Some(date);
        }
        if let Some(date) = self.completed_date {
            order.completed_date = Some(date);
        }
        if let Some(date) = self.delivered_date {
            order.delivered_date = Some(date);
        }
        match &self.cancellation {
            Some(CancellationUpdate::Record { notes, kind, date }) => {
                order.cancellation_notes = Some(notes.clone());
                order.cancellation_type = Some(*kind);
                order.cancellation_date = Some(*date);
            }
            Some(CancellationUpdate::Clear) => {
                order.cancellation_notes = None;
                order.cancellation_type = None;
                order.cancellation_date = None;
            }
            None => {}
        }
        if let Some(rescheduled) = self.rescheduled_from_cancellation {
            order.rescheduled_from_cancellation = rescheduled;
        }
    }
}

// ============================================================================
// Notification Events - what to tell people, derived after a save
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContext {
    pub order_id: Uuid,
    pub order_number: String,
    pub client: ClientContact,
    pub notify_client: bool,
}

impl NotificationContext {
    fn of(order: &ServiceOrder) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            client: order.client.clone(),
            notify_client: order.client_notifications_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    OrderCreated {
        context: NotificationContext,
        status: OrderStatus,
    },
    StatusChanged {
        context: NotificationContext,
        from: OrderStatus,
        to: OrderStatus,
        note: String,
        presupuesto_amount: Option<Decimal>,
        fecha_agendado: Option<DateTime<Utc>>,
        fecha_reparacion: Option<DateTime<Utc>>,
    },
    PaymentRecorded {
        context: NotificationContext,
        amount: Decimal,
        method: PaymentMethod,
        paid_amount: Decimal,
        total_amount: Decimal,
        remaining: Decimal,
    },
    /// Visit date moved without a status change
    VisitScheduled {
        context: NotificationContext,
        fecha_agendado: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn context(&self) -> &NotificationContext {
        match self {
            NotificationEvent::OrderCreated { context, .. }
            | NotificationEvent::StatusChanged { context, .. }
            | NotificationEvent::PaymentRecorded { context, .. }
            | NotificationEvent::VisitScheduled { context, .. } => context,
        }
    }

    /// Derive notifications from the events just persisted. `order` is the
    /// saved snapshot. A field-only update speaks up only when it moves the
    /// visit date; assignment bookkeeping and warranty periods stay silent.
    pub fn from_events(order: &ServiceOrder, events: &[OrderEvent]) -> Vec<NotificationEvent> {
        events
            .iter()
            .filter_map(|event| match event {
                OrderEvent::Created(created) => Some(NotificationEvent::OrderCreated {
                    context: NotificationContext::of(order),
                    status: created.order.status,
                }),
                OrderEvent::StatusChanged(changed) => Some(NotificationEvent::StatusChanged {
                    context: NotificationContext::of(order),
                    from: changed.from,
                    to: changed.to,
                    note: changed.history_entry.notes.clone(),
                    presupuesto_amount: changed.history_entry.presupuesto_amount,
                    fecha_agendado: order.fecha_agendado,
                    fecha_reparacion: order.fecha_reparacion,
                }),
                OrderEvent::PaymentRecorded(recorded) => Some(NotificationEvent::PaymentRecorded {
                    context: NotificationContext::of(order),
                    amount: recorded.payment.amount,
                    method: recorded.payment.method,
                    paid_amount: recorded.paid_amount,
                    total_amount: order.total_amount,
                    remaining: PaymentLedger::outstanding(order.total_amount, recorded.paid_amount),
                }),
                OrderEvent::FieldsUpdated(updated) => {
                    updated.changes.fecha_agendado.map(|fecha_agendado| NotificationEvent::VisitScheduled {
                        context: NotificationContext::of(order),
                        fecha_agendado,
                    })
                }
                _ => None,
            })
            .collect()
    }
}
