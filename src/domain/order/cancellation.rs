use rust_decimal::Decimal;

use super::aggregate::ServiceOrder;
use super::commands::{CancelPayload, CancellationRequest, ChangeStatusRequest};
use super::errors::OrderError;
use super::events::{CancellationUpdate, OrderEvent, OrderFieldChanges};
use super::state_machine::{OrderStateMachine, Transition};
use super::value_objects::{meets_min_len, CancellationType, OrderStatus, PaymentStatus, MIN_REASON_LEN};
use crate::domain::aggregate::CommandContext;

// ============================================================================
// Cancellation Policy
// ============================================================================
//
// permanent  -> CANCELLED, notes required
// reschedule -> current -> CANCELLED -> PENDING in one step, notes + new date
// revert     -> CANCELLED -> PENDING, cancellation fields cleared
//
// ============================================================================

pub struct CancellationPolicy;

impl CancellationPolicy {
    pub fn cancel_or_reschedule(
        order: &ServiceOrder,
        request: &CancellationRequest,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match request.cancellation_type {
            CancellationType::Permanent => OrderStateMachine::change_status(
                order,
                &ChangeStatusRequest::Cancelled(CancelPayload { cancellation_notes: request.notes.clone() }),
                ctx,
            ),
            CancellationType::Reschedule => Self::reschedule(order, request, ctx),
            CancellationType::Revert => Self::revert(order, ctx),
        }
    }

    /// Guard for any transition into CANCELLED.
    pub(crate) fn permanent_transition(
        order: &ServiceOrder,
        notes: &str,
        ctx: &CommandContext,
    ) -> Result<Transition, OrderError> {
        let notes = Self::validated_notes(notes)?;

        let mut changes = OrderFieldChanges {
            cancellation: Some(CancellationUpdate::Record {
                notes: notes.clone(),
                kind: CancellationType::Permanent,
                date: ctx.now,
            }),
            ..Default::default()
        };
        // nothing collected means nothing is owed any more
        if order.paid_amount <= Decimal::ZERO && order.payment_status != PaymentStatus::Cancelled {
            changes.payment_status = Some(PaymentStatus::Cancelled);
        }

        Ok(Transition::to(OrderStatus::Cancelled).with_note(notes).with_changes(changes))
    }

    fn reschedule(
        order: &ServiceOrder,
        request: &CancellationRequest,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let notes = Self::validated_notes(&request.notes)?;
        let new_date = request
            .new_date
            .ok_or_else(|| OrderError::validation("newDate is required to reschedule"))?;
        if new_date <= ctx.now {
            return Err(OrderError::validation("newDate must be in the future"));
        }

        if order.status != OrderStatus::Cancelled {
            OrderStateMachine::ensure_allowed(order.status, OrderStatus::Cancelled)?;
        }
        OrderStateMachine::ensure_allowed(OrderStatus::Cancelled, OrderStatus::Pending)?;

        let changes = OrderFieldChanges {
            cancellation: Some(CancellationUpdate::Record {
                notes: notes.clone(),
                kind: CancellationType::Reschedule,
                date: ctx.now,
            }),
            rescheduled_from_cancellation: Some(true),
            fecha_agendado: Some(new_date),
            payment_status: Self::rederived_payment_status(order),
            ..Default::default()
        };

        let transition = Transition::to(OrderStatus::Pending)
            .with_note(format!("Rescheduled for {}: {}", new_date.format("%Y-%m-%d"), notes))
            .with_changes(changes);
        Ok(OrderStateMachine::commit(order, transition, ctx))
    }

    fn revert(order: &ServiceOrder, ctx: &CommandContext) -> Result<Vec<OrderEvent>, OrderError> {
        if order.status != OrderStatus::Cancelled {
            return Err(OrderError::StateTransition {
                from: order.status,
                to: OrderStatus::Pending,
            });
        }
        OrderStateMachine::ensure_allowed(OrderStatus::Cancelled, OrderStatus::Pending)?;

        let changes = OrderFieldChanges {
            cancellation: Some(CancellationUpdate::Clear),
            rescheduled_from_cancellation: Some(false),
            payment_status: Self::rederived_payment_status(order),
            ..Default::default()
        };

        let transition = Transition::to(OrderStatus::Pending)
            .with_note("Cancellation reverted")
            .with_changes(changes);
        Ok(OrderStateMachine::commit(order, transition, ctx))
    }

    fn validated_notes(notes: &str) -> Result<String, OrderError> {
        let notes = notes.trim();
        if !meets_min_len(notes) {
            return Err(OrderError::validation(format!(
                "cancellationNotes must have at least {} characters",
                MIN_REASON_LEN
            )));
        }
        Ok(notes.to_string())
    }

    fn rederived_payment_status(order: &ServiceOrder) -> Option<PaymentStatus> {
        let derived = PaymentStatus::derive(order.paid_amount, order.total_amount);
        (derived != order.payment_status).then_some(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::fixtures::*;
    use crate::domain::order::commands::OrderCommand;
    use chrono::{Duration, Utc};

    fn request(kind: CancellationType, notes: &str) -> OrderCommand {
        OrderCommand::CancelOrReschedule(CancellationRequest {
            notes: notes.to_string(),
            cancellation_type: kind,
            new_date: None,
        })
    }

    #[test]
    fn test_permanent_then_revert_round_trip() {
        let aggregate = order_in(OrderStatus::Reparando);
        let history_before = aggregate.history.len();

        let cancelled = run(&aggregate, request(CancellationType::Permanent, "Cliente canceló por costo")).unwrap();
        assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.order.cancellation_type, Some(CancellationType::Permanent));
        assert_eq!(cancelled.order.cancellation_notes.as_deref(), Some("Cliente canceló por costo"));
        assert!(cancelled.order.cancellation_date.is_some());
        assert_eq!(cancelled.order.payment_status, PaymentStatus::Cancelled);

        let reverted = run(&cancelled, request(CancellationType::Revert, "")).unwrap();
        assert_eq!(reverted.order.status, OrderStatus::Pending);
        assert_eq!(reverted.order.cancellation_notes, None);
        assert_eq!(reverted.order.cancellation_type, None);
        assert_eq!(reverted.order.cancellation_date, None);
        assert!(!reverted.order.rescheduled_from_cancellation);
        assert_eq!(reverted.order.payment_status, PaymentStatus::Paid);
        assert_eq!(reverted.history.len(), history_before + 2);
    }

    #[test]
    fn test_permanent_cancel_keeps_partial_payment_status() {
        let mut aggregate = order_in(OrderStatus::Reparando);
        aggregate.order.total_amount = Decimal::from(100);
        aggregate.order.paid_amount = Decimal::from(40);
        aggregate.order.payment_status = PaymentStatus::Partial;

        let cancelled = run(&aggregate, request(CancellationType::Permanent, "Equipo irreparable")).unwrap();
        assert_eq!(cancelled.order.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_short_notes_rejected() {
        let result = run(&order_in(OrderStatus::Pending), request(CancellationType::Permanent, "no quiso"));
        assert!(matches!(result, Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_revert_requires_cancelled() {
        let result = run(&order_in(OrderStatus::Assigned), request(CancellationType::Revert, ""));
        assert_eq!(
            result,
            Err(OrderError::StateTransition {
                from: OrderStatus::Assigned,
                to: OrderStatus::Pending,
            })
        );
    }

    #[test]
    fn test_reschedule_moves_to_pending_with_single_entry() {
        let aggregate = order_in(OrderStatus::Facturado);
        let history_before = aggregate.history.len();
        let new_date = Utc::now() + Duration::days(7);

        let next = run(
            &aggregate,
            OrderCommand::CancelOrReschedule(CancellationRequest {
                notes: "Cliente estará fuera de la ciudad".to_string(),
                cancellation_type: CancellationType::Reschedule,
                new_date: Some(new_date),
            }),
        )
        .unwrap();

        assert_eq!(next.order.status, OrderStatus::Pending);
        assert_eq!(next.order.fecha_agendado, Some(new_date));
        assert!(next.order.rescheduled_from_cancellation);
        assert_eq!(next.order.cancellation_type, Some(CancellationType::Reschedule));
        assert!(next.order.cancellation_notes.is_some());
        assert_eq!(next.history.len(), history_before + 1);
        assert!(next.history.last().unwrap().notes.starts_with("Changed from FACTURADO to PENDING - Rescheduled for"));
    }

    #[test]
    fn test_reschedule_requires_future_date() {
        let aggregate = order_in(OrderStatus::Assigned);

        let missing = run(&aggregate, request(CancellationType::Reschedule, "Cliente pidió otra fecha"));
        assert!(matches!(missing, Err(OrderError::Validation(_))));

        let past = run(
            &aggregate,
            OrderCommand::CancelOrReschedule(CancellationRequest {
                notes: "Cliente pidió otra fecha".to_string(),
                cancellation_type: CancellationType::Reschedule,
                new_date: Some(Utc::now() - Duration::hours(1)),
            }),
        );
        assert!(matches!(past, Err(OrderError::Validation(_))));
    }
}
