use chrono::{DateTime, Utc};

use super::aggregate::ServiceOrder;
use super::commands::{ChangeStatusRequest, WarrantyClaim, WarrantyPeriodRequest, WarrantyResolution};
use super::errors::OrderError;
use super::events::{OrderEvent, OrderFieldChanges, WarrantyPeriodSet};
use super::state_machine::{OrderStateMachine, Transition};
use super::value_objects::{meets_min_len, OrderStatus, MIN_REASON_LEN};
use crate::domain::aggregate::CommandContext;

// ============================================================================
// Warranty Policy
// ============================================================================

pub struct WarrantyPolicy;

impl WarrantyPolicy {
    /// Delivered (or delivery-generated) orders inside their warranty window.
    pub fn can_apply_warranty(order: &ServiceOrder, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !order.status.accepts_warranty_claim() {
            return Err(OrderError::eligibility(format!(
                "order is {}, warranty claims need DELIVERED or ENTREGA_GENERADA",
                order.status
            )));
        }
        if !order.warranty_window().covers(now) {
            return Err(OrderError::eligibility("warranty period has expired or was never set"));
        }
        Ok(())
    }

    pub fn set_warranty_period(order: &ServiceOrder, request: &WarrantyPeriodRequest) -> Result<Vec<OrderEvent>, OrderError> {
        let end_date = if request.is_unlimited {
            None
        } else {
            let end = request
                .end_date
                .ok_or_else(|| OrderError::validation("endDate is required unless the warranty is unlimited"))?;
            if end < request.start_date {
                return Err(OrderError::validation("endDate must not precede startDate"));
            }
            Some(end)
        };

        tracing::debug!(
            order_id = %order.id,
            unlimited = request.is_unlimited,
            "Setting warranty period"
        );

        Ok(vec![OrderEvent::WarrantyPeriodSet(WarrantyPeriodSet {
            start_date: request.start_date,
            end_date,
            unlimited: request.is_unlimited,
        })])
    }

    /// The warranty edge: DELIVERED / ENTREGA_GENERADA into GARANTIA_APLICADA.
    /// Not part of the plain adjacency table.
    pub fn apply_warranty_damage(
        order: &ServiceOrder,
        claim: &WarrantyClaim,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let transition = Self::claim_transition(claim)?;
        Self::can_apply_warranty(order, ctx.now)?;
        Ok(OrderStateMachine::commit(order, transition, ctx))
    }

    pub fn resolve_warranty(
        order: &ServiceOrder,
        resolution: &WarrantyResolution,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if order.status != OrderStatus::GarantiaAplicada {
            return Err(OrderError::StateTransition {
                from: order.status,
                to: OrderStatus::GarantiaResuelta,
            });
        }
        OrderStateMachine::change_status(order, &ChangeStatusRequest::GarantiaResuelta(resolution.clone()), ctx)
    }

    pub(crate) fn claim_transition(claim: &WarrantyClaim) -> Result<Transition, OrderError> {
        let reason = claim.razon_garantia.trim();
        if reason.is_empty() {
            return Err(OrderError::validation("razonGarantia is required"));
        }

        let changes = OrderFieldChanges {
            razon_garantia: Some(reason.to_string()),
            garantia_prioridad: Some(claim.garantia_prioridad),
            ..Default::default()
        };
        Ok(Transition::to(OrderStatus::GarantiaAplicada)
            .with_note(format!("Warranty claim ({}): {}", claim.garantia_prioridad, reason))
            .with_changes(changes))
    }

    /// GARANTIA_RESUELTA is requested but DELIVERED is what gets persisted.
    pub(crate) fn resolution_transition(resolution: &WarrantyResolution) -> Result<Transition, OrderError> {
        let reason = resolution.razon_resolucion_garantia.trim();
        if !meets_min_len(reason) {
            return Err(OrderError::validation(format!(
                "razonResolucionGarantia must have at least {} characters",
                MIN_REASON_LEN
            )));
        }

        let changes = OrderFieldChanges {
            razon_resolucion_garantia: Some(reason.to_string()),
            ..Default::default()
        };
        Ok(Transition::to(OrderStatus::GarantiaResuelta)
            .landing_on(OrderStatus::Delivered)
            .with_note(format!("Warranty resolved: {}", reason))
            .with_changes(changes))
    }
}
