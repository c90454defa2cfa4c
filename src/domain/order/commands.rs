use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{
    ApplianceType, CancellationType, ClientContact, OrderStatus, PaymentMethod, WarrantyPriority,
};

// ============================================================================
// Order Commands
// ============================================================================

/// Everything a caller can ask of an existing order. Creation is separate
/// (`CreateOrderRequest`) because it needs a freshly allocated order number.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderCommand {
    ChangeStatus(ChangeStatusRequest),
    RecordPayment(RecordPaymentRequest),
    AssignTechnician {
        technician_id: Uuid,
        notes: Option<String>,
    },
    DeactivateTechnician {
        technician_id: Uuid,
        replacement_technician_id: Option<Uuid>,
    },
    SetWarrantyPeriod(WarrantyPeriodRequest),
    ApplyWarrantyDamage(WarrantyClaim),
    ResolveWarranty(WarrantyResolution),
    CancelOrReschedule(CancellationRequest),
}

impl OrderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            OrderCommand::ChangeStatus(_) => "change_status",
            OrderCommand::RecordPayment(_) => "record_payment",
            OrderCommand::AssignTechnician { .. } => "assign_technician",
            OrderCommand::DeactivateTechnician { .. } => "deactivate_technician_assignment",
            OrderCommand::SetWarrantyPeriod(_) => "set_warranty_period",
            OrderCommand::ApplyWarrantyDamage(_) => "apply_warranty_damage",
            OrderCommand::ResolveWarranty(_) => "resolve_warranty",
            OrderCommand::CancelOrReschedule(_) => "cancel_or_reschedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateOrderRequest {
    pub client: ClientContact,
    pub appliance_type: ApplianceType,
    #[serde(default)]
    pub appliance_description: Option<String>,
    #[serde(default)]
    pub technician_id: Option<Uuid>,
    #[serde(default)]
    pub fecha_agendado: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fecha_captacion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub diagnostics: Option<String>,
    #[serde(default = "default_true")]
    pub client_notifications_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl CreateOrderRequest {
    pub fn new(client: ClientContact, appliance_type: ApplianceType) -> Self {
        Self {
            client,
            appliance_type,
            appliance_description: None,
            technician_id: None,
            fecha_agendado: None,
            fecha_captacion: None,
            total_amount: None,
            diagnostics: None,
            client_notifications_enabled: true,
        }
    }

    /// `Assigned` when a technician comes with the intake, `Preorder` otherwise
    pub fn initial_status(&self) -> OrderStatus {
        if self.technician_id.is_some() {
            OrderStatus::Assigned
        } else {
            OrderStatus::Preorder
        }
    }
}

// ============================================================================
// Status Change Requests - one payload shape per target status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "targetStatus", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatusRequest {
    Preorder,
    Pending(SchedulePayload),
    Assigned,
    InProgress(DiagnosisPayload),
    Aprobado(ApprovalPayload),
    NoAprobado(RejectionPayload),
    PendienteAvisar(FollowUpPayload),
    Facturado(QuotePayload),
    Reparando(RepairPayload),
    Completed,
    EntregaGenerada,
    Delivered,
    GarantiaAplicada(WarrantyClaim),
    GarantiaResuelta(WarrantyResolution),
    Cancelled(CancelPayload),
}

impl ChangeStatusRequest {
    pub fn target(&self) -> OrderStatus {
        match self {
            ChangeStatusRequest::Preorder => OrderStatus::Preorder,
            ChangeStatusRequest::Pending(_) => OrderStatus::Pending,
            ChangeStatusRequest::Assigned => OrderStatus::Assigned,
            ChangeStatusRequest::InProgress(_) => OrderStatus::InProgress,
            ChangeStatusRequest::Aprobado(_) => OrderStatus::Aprobado,
            ChangeStatusRequest::NoAprobado(_) => OrderStatus::NoAprobado,
            ChangeStatusRequest::PendienteAvisar(_) => OrderStatus::PendienteAvisar,
            ChangeStatusRequest::Facturado(_) => OrderStatus::Facturado,
            ChangeStatusRequest::Reparando(_) => OrderStatus::Reparando,
            ChangeStatusRequest::Completed => OrderStatus::Completed,
            ChangeStatusRequest::EntregaGenerada => OrderStatus::EntregaGenerada,
            ChangeStatusRequest::Delivered => OrderStatus::Delivered,
            ChangeStatusRequest::GarantiaAplicada(_) => OrderStatus::GarantiaAplicada,
            ChangeStatusRequest::GarantiaResuelta(_) => OrderStatus::GarantiaResuelta,
            ChangeStatusRequest::Cancelled(_) => OrderStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchedulePayload {
    #[serde(default)]
    pub fecha_agendado: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiagnosisPayload {
    #[serde(default)]
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApprovalPayload {
    /// When present the repair is already booked and the order moves
    /// straight to REPARANDO.
    #[serde(default)]
    pub fecha_reparacion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RejectionPayload {
    #[serde(default)]
    pub razon_no_aprobado: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FollowUpPayload {
    #[serde(default)]
    pub presupuesto_amount: Option<Decimal>,
    #[serde(default)]
    pub fecha_seguimiento: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuotePayload {
    #[serde(default)]
    pub presupuesto_amount: Option<Decimal>,
    #[serde(default, rename = "includeIVA")]
    pub include_iva: Option<bool>,
    #[serde(default)]
    pub concepto_orden: Option<ConceptoOrdenInput>,
    #[serde(default)]
    pub diagnostics: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConceptoOrdenInput {
    pub header: String,
    pub body: String,
    pub base_amount: Decimal,
    #[serde(default, rename = "includeIVA")]
    pub include_iva: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepairPayload {
    #[serde(default)]
    pub fecha_reparacion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WarrantyClaim {
    pub razon_garantia: String,
    pub garantia_prioridad: WarrantyPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WarrantyResolution {
    pub razon_resolucion_garantia: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CancelPayload {
    pub cancellation_notes: String,
}

// ============================================================================
// Ledger / Warranty / Cancellation Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WarrantyPeriodRequest {
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_unlimited: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CancellationRequest {
    #[serde(default)]
    pub notes: String,
    #[serde(rename = "type")]
    pub cancellation_type: CancellationType,
    #[serde(default)]
    pub new_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_status_request_wire_shape() {
        let request: ChangeStatusRequest = serde_json::from_value(json!({
            "targetStatus": "FACTURADO",
            "payload": { "presupuestoAmount": "1200.00", "includeIVA": true }
        }))
        .unwrap();

        match &request {
            ChangeStatusRequest::Facturado(quote) => {
                assert_eq!(quote.presupuesto_amount, Some(Decimal::new(120000, 2)));
                assert_eq!(quote.include_iva, Some(true));
            }
            other => panic!("unexpected request {:?}", other),
        }
        assert_eq!(request.target(), OrderStatus::Facturado);
    }

    #[test]
    fn test_unit_targets_need_no_payload() {
        let request: ChangeStatusRequest = serde_json::from_value(json!({ "targetStatus": "COMPLETED" })).unwrap();
        assert_eq!(request, ChangeStatusRequest::Completed);
    }

    #[test]
    fn test_irrelevant_payload_fields_are_rejected() {
        let result = serde_json::from_value::<ChangeStatusRequest>(json!({
            "targetStatus": "APROBADO",
            "payload": { "presupuestoAmount": "100" }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_cancel_requires_notes_field() {
        let result = serde_json::from_value::<ChangeStatusRequest>(json!({
            "targetStatus": "CANCELLED",
            "payload": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_initial_status_from_intake() {
        let client = ClientContact { name: "Ana".into(), phone: None };
        let mut request = CreateOrderRequest::new(client, ApplianceType::Lavadora);
        assert_eq!(request.initial_status(), OrderStatus::Preorder);

        // a visit date alone does not schedule the order
        request.fecha_agendado = Some(Utc::now());
        assert_eq!(request.initial_status(), OrderStatus::Preorder);

        request.technician_id = Some(Uuid::new_v4());
        assert_eq!(request.initial_status(), OrderStatus::Assigned);
    }

    #[test]
    fn test_cancellation_request_type_field() {
        let request: CancellationRequest =
            serde_json::from_value(json!({ "type": "revert" })).unwrap();
        assert_eq!(request.cancellation_type, CancellationType::Revert);
        assert!(request.notes.is_empty());
    }
}
