use rust_decimal::Decimal;

use super::aggregate::ServiceOrder;
use super::cancellation::CancellationPolicy;
use super::commands::ChangeStatusRequest;
use super::errors::OrderError;
use super::events::{OrderEvent, OrderFieldChanges, OrderFieldsUpdated, OrderStatusChanged};
use super::history::StatusHistoryLog;
use super::value_objects::{format_money, no_aprobado_fee, with_iva, ConceptoOrden, OrderStatus, PaymentStatus};
use super::warranty::WarrantyPolicy;
use crate::domain::aggregate::CommandContext;

// ============================================================================
// Order State Machine
// ============================================================================
//
// Every status mutation goes through here:
// 1. adjacency check against `OrderStatus::allowed_targets`
// 2. per-target guard, producing a `Transition` (nothing is mutated)
// 3. `commit` turns the transition into events, adding the history entry
//    and the completion/delivery stamps
//
// ============================================================================

/// A planned status change: what was asked, what will be persisted, and which
/// columns it writes.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub requested: OrderStatus,
    pub effective: OrderStatus,
    pub changes: OrderFieldChanges,
    pub note: Option<String>,
    pub presupuesto_amount: Option<Decimal>,
}

impl Transition {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            requested: status,
            effective: status,
            changes: OrderFieldChanges::default(),
            note: None,
            presupuesto_amount: None,
        }
    }

    pub fn landing_on(mut self, effective: OrderStatus) -> Self {
        self.effective = effective;
        self
    }

    pub fn with_changes(mut self, changes: OrderFieldChanges) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_presupuesto(mut self, amount: Decimal) -> Self {
        self.presupuesto_amount = Some(amount);
        self
    }
}

pub struct OrderStateMachine;

impl OrderStateMachine {
    pub fn ensure_allowed(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(OrderError::StateTransition { from, to })
        }
    }

    /// Validate and plan a caller's status change, then emit its events.
    pub fn change_status(
        order: &ServiceOrder,
        request: &ChangeStatusRequest,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        Self::ensure_allowed(order.status, request.target())?;
        let transition = Self::plan(order, request, ctx)?;
        Ok(Self::commit(order, transition, ctx))
    }

    fn plan(order: &ServiceOrder, request: &ChangeStatusRequest, ctx: &CommandContext) -> Result<Transition, OrderError> {
        let target = request.target();
        let mut changes = OrderFieldChanges::default();

        let transition = match request {
            ChangeStatusRequest::Preorder
            | ChangeStatusRequest::Assigned
            | ChangeStatusRequest::Completed
            | ChangeStatusRequest::EntregaGenerada
            | ChangeStatusRequest::Delivered => Transition::to(target),

            ChangeStatusRequest::Pending(schedule) => {
                changes.fecha_agendado = schedule.fecha_agendado;
                let transition = Transition::to(target);
                match schedule.fecha_agendado {
                    Some(date) => transition.with_note(format!("Visit scheduled for {}", date.format("%Y-%m-%d"))),
                    None => transition,
                }
                .with_changes(changes)
            }

            ChangeStatusRequest::InProgress(diagnosis) => {
                changes.diagnostics = non_blank(diagnosis.diagnostics.as_deref());
                Transition::to(target).with_changes(changes)
            }

            ChangeStatusRequest::Aprobado(approval) => match approval.fecha_reparacion {
                Some(date) => {
                    changes.fecha_reparacion = Some(date);
                    Transition::to(target)
                        .landing_on(OrderStatus::Reparando)
                        .with_note(format!("Approved, repair scheduled for {}", date.format("%Y-%m-%d")))
                        .with_changes(changes)
                }
                None => Transition::to(target),
            },

            ChangeStatusRequest::NoAprobado(rejection) => {
                let fee = no_aprobado_fee();
                let reason = non_blank(rejection.razon_no_aprobado.as_deref());
                changes.presupuesto_amount = Some(fee);
                changes.razon_no_aprobado = reason.clone();

                let note = match &reason {
                    Some(reason) => format!("Visit fee {}: {}", format_money(fee), reason),
                    None => format!("Visit fee {}", format_money(fee)),
                };
                Transition::to(target).with_note(note).with_presupuesto(fee).with_changes(changes)
            }

            ChangeStatusRequest::PendienteAvisar(follow_up) => {
                let mut notes = Vec::new();
                if let Some(amount) = follow_up.presupuesto_amount {
                    ensure_non_negative(amount, "presupuestoAmount")?;
                    changes.presupuesto_amount = Some(amount);
                    notes.push(format!("Budget: {}", format_money(amount)));
                }
                if let Some(date) = follow_up.fecha_seguimiento {
                    changes.fecha_seguimiento = Some(date);
                    notes.push(format!("follow up on {}", date.format("%Y-%m-%d")));
                }

                let mut transition = Transition::to(target).with_changes(changes);
                if !notes.is_empty() {
                    transition = transition.with_note(notes.join("; "));
                }
                if let Some(amount) = follow_up.presupuesto_amount {
                    transition = transition.with_presupuesto(amount);
                }
                transition
            }

            ChangeStatusRequest::Facturado(quote) => {
                let amount = quote
                    .presupuesto_amount
                    .or(order.presupuesto_amount)
                    .ok_or_else(|| OrderError::validation("presupuestoAmount is required to quote an order"))?;
                ensure_non_negative(amount, "presupuestoAmount")?;

                let concepto = match &quote.concepto_orden {
                    Some(input) => {
                        ensure_non_negative(input.base_amount, "conceptoOrden.baseAmount")?;
                        Some(ConceptoOrden::new(
                            input.header.trim(),
                            input.body.trim(),
                            input.base_amount,
                            input.include_iva,
                        ))
                    }
                    None => None,
                };
                let include_iva = quote
                    .include_iva
                    .or(concepto.as_ref().map(|c| c.include_iva))
                    .unwrap_or(order.include_iva);
                let total = with_iva(amount, include_iva);

                changes.presupuesto_amount = Some(amount);
                changes.include_iva = Some(include_iva);
                changes.concepto_orden = concepto;
                changes.total_amount = Some(total);
                changes.payment_status = Some(PaymentStatus::derive(order.paid_amount, total));
                changes.diagnostics = non_blank(quote.diagnostics.as_deref());

                let note = if include_iva {
                    format!("Budget: {} + IVA (total {})", format_money(amount), format_money(total))
                } else {
                    format!("Budget: {} (no IVA)", format_money(amount))
                };
                Transition::to(target).with_note(note).with_presupuesto(amount).with_changes(changes)
            }

            ChangeStatusRequest::Reparando(repair) => {
                changes.fecha_reparacion = repair.fecha_reparacion;
                Transition::to(target).with_changes(changes)
            }

            ChangeStatusRequest::GarantiaAplicada(claim) => WarrantyPolicy::claim_transition(claim)?,
            ChangeStatusRequest::GarantiaResuelta(resolution) => WarrantyPolicy::resolution_transition(resolution)?,
            ChangeStatusRequest::Cancelled(cancel) => {
                CancellationPolicy::permanent_transition(order, &cancel.cancellation_notes, ctx)?
            }
        };

        Ok(transition)
    }

    /// Turn a validated transition into events. A same-status request only
    /// writes its fields; an empty one produces nothing.
    pub fn commit(order: &ServiceOrder, transition: Transition, ctx: &CommandContext) -> Vec<OrderEvent> {
        let Transition { requested, effective, mut changes, note, presupuesto_amount } = transition;
        let from = order.status;

        if effective == from {
            if changes.is_empty() {
                return Vec::new();
            }
            return vec![OrderEvent::FieldsUpdated(OrderFieldsUpdated { changes })];
        }

        if effective == OrderStatus::Completed && order.completed_date.is_none() && changes.completed_date.is_none() {
            changes.completed_date = Some(ctx.now);
        }
        if effective == OrderStatus::Delivered && order.delivered_date.is_none() && changes.delivered_date.is_none() {
            changes.delivered_date = Some(ctx.now);
        }

        let history_entry = StatusHistoryLog::record(
            order.id,
            effective,
            StatusHistoryLog::transition_note(from, effective, note.as_deref()),
            ctx.actor_id,
            presupuesto_amount,
            ctx.now,
        );

        vec![OrderEvent::StatusChanged(OrderStatusChanged {
            from,
            to: effective,
            requested,
            changes,
            history_entry,
        })]
    }
}

fn non_blank(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn ensure_non_negative(amount: Decimal, field: &str) -> Result<(), OrderError> {
    if amount < Decimal::ZERO {
        return Err(OrderError::validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::Aggregate;
    use crate::domain::order::aggregate::fixtures::*;
    use crate::domain::order::commands::*;
    use chrono::{Duration, Utc};

    fn change(status: OrderStatus, request: ChangeStatusRequest) -> Result<crate::domain::order::aggregate::ServiceOrderAggregate, OrderError> {
        run(&order_in(status), OrderCommand::ChangeStatus(request))
    }

    #[test]
    fn test_unreachable_targets_fail_without_mutation() {
        for from in OrderStatus::ALL {
            for request in [
                ChangeStatusRequest::Preorder,
                ChangeStatusRequest::Assigned,
                ChangeStatusRequest::Completed,
                ChangeStatusRequest::EntregaGenerada,
                ChangeStatusRequest::Delivered,
            ] {
                let target = request.target();
                if from.can_transition_to(target) {
                    continue;
                }
                let aggregate = order_in(from);
                let result = aggregate.handle_command(&OrderCommand::ChangeStatus(request), &ctx());
                assert_eq!(result, Err(OrderError::StateTransition { from, to: target }));
            }
        }
    }

    #[test]
    fn test_adjacency_is_checked_before_guards() {
        // missing presupuesto would be a validation error, but DELIVERED cannot quote at all
        let result = change(OrderStatus::Delivered, ChangeStatusRequest::Facturado(QuotePayload::default()));
        assert!(matches!(result, Err(OrderError::StateTransition { .. })));
    }

    #[test]
    fn test_actual_change_appends_exactly_one_history_entry() {
        let aggregate = order_in(OrderStatus::Reparando);
        let before = aggregate.history.len();

        let next = run(&aggregate, OrderCommand::ChangeStatus(ChangeStatusRequest::Completed)).unwrap();

        assert_eq!(next.order.status, OrderStatus::Completed);
        assert_eq!(next.history.len(), before + 1);
        assert_eq!(next.history.last().unwrap().notes, "Changed from REPARANDO to COMPLETED");
        assert!(next.order.completed_date.is_some());
    }

    #[test]
    fn test_same_status_request_writes_no_history() {
        let aggregate = order_in(OrderStatus::InProgress);
        let before = aggregate.history.len();

        let next = run(
            &aggregate,
            OrderCommand::ChangeStatus(ChangeStatusRequest::InProgress(DiagnosisPayload {
                diagnostics: Some("Bomba de agua tapada".to_string()),
            })),
        )
        .unwrap();

        assert_eq!(next.history.len(), before);
        assert_eq!(next.order.diagnostics.as_deref(), Some("Bomba de agua tapada"));

        let events = next
            .handle_command(&OrderCommand::ChangeStatus(ChangeStatusRequest::InProgress(DiagnosisPayload::default())), &ctx())
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_facturado_requires_presupuesto() {
        let aggregate = order_in(OrderStatus::Assigned);
        let result = run(&aggregate, OrderCommand::ChangeStatus(ChangeStatusRequest::Facturado(QuotePayload::default())));

        assert!(matches!(result, Err(OrderError::Validation(_))));
        assert_eq!(aggregate.order.status, OrderStatus::Assigned);
    }

    #[test]
    fn test_facturado_rejects_negative_presupuesto() {
        let result = change(
            OrderStatus::Assigned,
            ChangeStatusRequest::Facturado(QuotePayload {
                presupuesto_amount: Some(Decimal::from(-1)),
                ..Default::default()
            }),
        );
        assert!(matches!(result, Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_facturado_uses_existing_presupuesto_and_iva() {
        let mut aggregate = order_in(OrderStatus::Assigned);
        aggregate.order.presupuesto_amount = Some(Decimal::from(1000));

        let next = run(
            &aggregate,
            OrderCommand::ChangeStatus(ChangeStatusRequest::Facturado(QuotePayload {
                include_iva: Some(true),
                ..Default::default()
            })),
        )
        .unwrap();

        assert_eq!(next.order.status, OrderStatus::Facturado);
        assert_eq!(next.order.total_amount, Decimal::from(1160));
        assert!(next.order.include_iva);
        let entry = next.history.last().unwrap();
        assert_eq!(entry.presupuesto_amount, Some(Decimal::from(1000)));
        assert_eq!(entry.notes, "Changed from ASSIGNED to FACTURADO - Budget: $1000.00 + IVA (total $1160.00)");
    }

    #[test]
    fn test_facturado_builds_concepto() {
        let next = change(
            OrderStatus::Assigned,
            ChangeStatusRequest::Facturado(QuotePayload {
                presupuesto_amount: Some(Decimal::from(250)),
                concepto_orden: Some(ConceptoOrdenInput {
                    header: "Cambio de bomba".to_string(),
                    body: "Bomba de drenado nueva".to_string(),
                    base_amount: Decimal::from(250),
                    include_iva: true,
                }),
                ..Default::default()
            }),
        )
        .unwrap();

        let concepto = next.order.concepto_orden.unwrap();
        assert_eq!(concepto.total_with_tax, Decimal::from(290));
        assert_eq!(next.order.total_amount, Decimal::from(290));
    }

    #[test]
    fn test_aprobado_with_repair_date_lands_on_reparando() {
        let aggregate = order_in(OrderStatus::Facturado);
        let before = aggregate.history.len();
        let date = Utc::now() + Duration::days(3);

        let next = run(
            &aggregate,
            OrderCommand::ChangeStatus(ChangeStatusRequest::Aprobado(ApprovalPayload { fecha_reparacion: Some(date) })),
        )
        .unwrap();

        assert_eq!(next.order.status, OrderStatus::Reparando);
        assert_eq!(next.order.fecha_reparacion, Some(date));
        assert_eq!(next.history.len(), before + 1);
        assert_eq!(next.history.last().unwrap().status, OrderStatus::Reparando);
    }

    #[test]
    fn test_aprobado_to_aprobado_with_repair_date_lands_on_reparando() {
        let aggregate = order_in(OrderStatus::Aprobado);
        let before = aggregate.history.len();
        let date = Utc::now() + Duration::days(5);

        let next = run(
            &aggregate,
            OrderCommand::ChangeStatus(ChangeStatusRequest::Aprobado(ApprovalPayload { fecha_reparacion: Some(date) })),
        )
        .unwrap();

        assert_eq!(next.order.status, OrderStatus::Reparando);
        assert_eq!(next.order.fecha_reparacion, Some(date));
        assert_eq!(next.history.len(), before + 1);
        assert_eq!(next.history.last().unwrap().status, OrderStatus::Reparando);
    }

    #[test]
    fn test_aprobado_without_date_stays_aprobado() {
        let next = change(OrderStatus::Facturado, ChangeStatusRequest::Aprobado(ApprovalPayload::default())).unwrap();
        assert_eq!(next.order.status, OrderStatus::Aprobado);
    }

    #[test]
    fn test_no_aprobado_charges_visit_fee_without_touching_total() {
        let mut aggregate = order_in(OrderStatus::Facturado);
        aggregate.order.total_amount = Decimal::from(100);
        aggregate.order.paid_amount = Decimal::from(40);
        aggregate.order.payment_status = PaymentStatus::Partial;

        let next = run(
            &aggregate,
            OrderCommand::ChangeStatus(ChangeStatusRequest::NoAprobado(RejectionPayload {
                razon_no_aprobado: Some("Muy caro".to_string()),
            })),
        )
        .unwrap();

        assert_eq!(next.order.presupuesto_amount, Some(Decimal::from(5)));
        assert_eq!(next.order.total_amount, Decimal::from(100));
        assert_eq!(next.order.payment_status, PaymentStatus::Partial);
        assert_eq!(next.order.razon_no_aprobado.as_deref(), Some("Muy caro"));
        assert!(next.history.last().unwrap().notes.contains("Visit fee"));
    }

    #[test]
    fn test_pendiente_avisar_records_follow_up() {
        let follow_up = Utc::now() + Duration::days(2);
        let next = change(
            OrderStatus::InProgress,
            ChangeStatusRequest::PendienteAvisar(FollowUpPayload {
                presupuesto_amount: Some(Decimal::from(800)),
                fecha_seguimiento: Some(follow_up),
            }),
        )
        .unwrap();

        assert_eq!(next.order.status, OrderStatus::PendienteAvisar);
        assert_eq!(next.order.presupuesto_amount, Some(Decimal::from(800)));
        assert_eq!(next.order.fecha_seguimiento, Some(follow_up));
    }

    #[test]
    fn test_delivery_stamps_date_once() {
        let mut aggregate = order_in(OrderStatus::Completed);
        let earlier = Utc::now() - Duration::days(10);
        aggregate.order.delivered_date = Some(earlier);

        let next = run(&aggregate, OrderCommand::ChangeStatus(ChangeStatusRequest::Delivered)).unwrap();
        assert_eq!(next.order.delivered_date, Some(earlier));

        let fresh = change(OrderStatus::Completed, ChangeStatusRequest::Delivered).unwrap();
        assert!(fresh.order.delivered_date.is_some());
    }

    #[test]
    fn test_cancelled_exits_only_to_pending_and_preorder() {
        assert!(change(OrderStatus::Cancelled, ChangeStatusRequest::Pending(SchedulePayload::default())).is_ok());
        assert!(change(OrderStatus::Cancelled, ChangeStatusRequest::Preorder).is_ok());
        assert!(change(OrderStatus::Cancelled, ChangeStatusRequest::Assigned).is_err());
        assert!(change(OrderStatus::Cancelled, ChangeStatusRequest::Completed).is_err());
    }

    #[test]
    fn test_cancel_via_change_status_requires_notes() {
        let short = change(
            OrderStatus::Reparando,
            ChangeStatusRequest::Cancelled(CancelPayload { cancellation_notes: "corto".to_string() }),
        );
        assert!(matches!(short, Err(OrderError::Validation(_))));

        let next = change(
            OrderStatus::Reparando,
            ChangeStatusRequest::Cancelled(CancelPayload {
                cancellation_notes: "Cliente ya no quiere la reparación".to_string(),
            }),
        )
        .unwrap();
        assert_eq!(next.order.status, OrderStatus::Cancelled);
        assert!(next.history.last().unwrap().notes.ends_with("Cliente ya no quiere la reparación"));
    }
}
