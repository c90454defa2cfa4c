use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::aggregate::StatusHistoryEntry;
use super::value_objects::OrderStatus;

/// Append-only audit trail of status changes.
pub struct StatusHistoryLog;

impl StatusHistoryLog {
    pub fn record(
        service_order_id: Uuid,
        status: OrderStatus,
        notes: impl Into<String>,
        actor_id: Uuid,
        presupuesto_amount: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> StatusHistoryEntry {
        StatusHistoryEntry {
            id: Uuid::new_v4(),
            service_order_id,
            status,
            notes: notes.into(),
            presupuesto_amount,
            created_by: actor_id,
            timestamp: at,
        }
    }

    pub fn append(history: &mut Vec<StatusHistoryEntry>, entry: StatusHistoryEntry) {
        history.push(entry);
    }

    /// Newest first; for equal timestamps the later append comes first.
    pub fn list(history: &[StatusHistoryEntry]) -> Vec<StatusHistoryEntry> {
        let mut entries: Vec<StatusHistoryEntry> = history.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn transition_note(from: OrderStatus, to: OrderStatus, suffix: Option<&str>) -> String {
        match suffix.map(str::trim).filter(|s| !s.is_empty()) {
            Some(suffix) => format!("Changed from {} to {} - {}", from, to, suffix),
            None => format!("Changed from {} to {}", from, to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_list_is_newest_first_and_stable() {
        let order_id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let t0 = Utc::now();
        let mut history = Vec::new();

        StatusHistoryLog::append(&mut history, StatusHistoryLog::record(order_id, OrderStatus::Preorder, "first", actor, None, t0));
        StatusHistoryLog::append(
            &mut history,
            StatusHistoryLog::record(order_id, OrderStatus::Pending, "second", actor, None, t0 + Duration::seconds(5)),
        );
        StatusHistoryLog::append(
            &mut history,
            StatusHistoryLog::record(order_id, OrderStatus::Assigned, "third", actor, None, t0 + Duration::seconds(5)),
        );

        let notes: Vec<String> = StatusHistoryLog::list(&history).into_iter().map(|e| e.notes).collect();
        assert_eq!(notes, vec!["third", "second", "first"]);
        assert_eq!(history[0].notes, "first");
    }

    #[test]
    fn test_transition_note_suffix() {
        assert_eq!(
            StatusHistoryLog::transition_note(OrderStatus::Pending, OrderStatus::Assigned, None),
            "Changed from PENDING to ASSIGNED"
        );
        assert_eq!(
            StatusHistoryLog::transition_note(OrderStatus::Reparando, OrderStatus::Cancelled, Some("cliente se mudó")),
            "Changed from REPARANDO to CANCELLED - cliente se mudó"
        );
        assert_eq!(
            StatusHistoryLog::transition_note(OrderStatus::Pending, OrderStatus::Preorder, Some("  ")),
            "Changed from PENDING to PREORDER"
        );
    }
}
