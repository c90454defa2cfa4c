use rust_decimal::Decimal;
use uuid::Uuid;

use super::aggregate::{Payment, ServiceOrder};
use super::commands::RecordPaymentRequest;
use super::errors::OrderError;
use super::events::{OrderEvent, PaymentRecorded};
use super::value_objects::PaymentStatus;
use crate::domain::aggregate::CommandContext;

/// Additive payment records; `paidAmount` moves only through here.
pub struct PaymentLedger;

impl PaymentLedger {
    pub fn record_payment(
        order: &ServiceOrder,
        request: &RecordPaymentRequest,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if request.amount <= Decimal::ZERO {
            return Err(OrderError::validation("payment amount must be greater than zero"));
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            service_order_id: order.id,
            amount: request.amount,
            method: request.method,
            reference: trimmed(request.reference.as_deref()),
            notes: trimmed(request.notes.as_deref()),
            created_by: ctx.actor_id,
            created_at: ctx.now,
        };
        let paid_amount = order.paid_amount + request.amount;

        Ok(vec![OrderEvent::PaymentRecorded(PaymentRecorded {
            payment,
            paid_amount,
            payment_status: PaymentStatus::derive(paid_amount, order.total_amount),
        })])
    }

    pub fn balance(order: &ServiceOrder) -> Decimal {
        Self::outstanding(order.total_amount, order.paid_amount)
    }

    pub fn outstanding(total_amount: Decimal, paid_amount: Decimal) -> Decimal {
        (total_amount - paid_amount).max(Decimal::ZERO)
    }
}

fn trimmed(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}
