use uuid::Uuid;

use super::aggregate::{ServiceOrderAggregate, TechnicianAssignment};
use super::errors::OrderError;
use super::events::{AssignmentNotesUpdated, OrderEvent, TechnicianAssigned, TechnicianDeactivated};
use super::state_machine::{OrderStateMachine, Transition};
use super::value_objects::OrderStatus;
use crate::domain::aggregate::CommandContext;

pub const INITIAL_ASSIGNMENT_NOTE: &str = "initial technical assignment";

// ============================================================================
// Technician Assignment Tracker
// ============================================================================

pub struct TechnicianAssignmentTracker;

impl TechnicianAssignmentTracker {
    pub fn new_assignment(
        service_order_id: Uuid,
        technician_id: Uuid,
        notes: Option<String>,
        ctx: &CommandContext,
    ) -> TechnicianAssignment {
        TechnicianAssignment {
            id: Uuid::new_v4(),
            service_order_id,
            technician_id,
            is_active: true,
            notes,
            created_at: ctx.now,
            updated_at: ctx.now,
        }
    }

    /// Assigning an already-active technician only refreshes the notes. A
    /// PENDING order moves to ASSIGNED with its first technician.
    pub fn assign(
        aggregate: &ServiceOrderAggregate,
        technician_id: Uuid,
        notes: Option<&str>,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        let mut events = Vec::new();

        match aggregate.active_assignment(technician_id) {
            Some(existing) => {
                if notes.is_some() && existing.notes != notes {
                    events.push(OrderEvent::AssignmentNotesUpdated(AssignmentNotesUpdated {
                        assignment_id: existing.id,
                        notes,
                        updated_at: ctx.now,
                    }));
                }
            }
            None => {
                let assignment = Self::new_assignment(aggregate.order.id, technician_id, notes, ctx);
                events.push(OrderEvent::TechnicianAssigned(TechnicianAssigned { assignment }));
            }
        }

        if aggregate.order.status == OrderStatus::Pending {
            OrderStateMachine::ensure_allowed(OrderStatus::Pending, OrderStatus::Assigned)?;
            let transition = Transition::to(OrderStatus::Assigned).with_note(INITIAL_ASSIGNMENT_NOTE);
            events.extend(OrderStateMachine::commit(&aggregate.order, transition, ctx));
        }

        Ok(events)
    }

    pub fn deactivate(
        aggregate: &ServiceOrderAggregate,
        technician_id: Uuid,
        replacement_technician_id: Option<Uuid>,
        ctx: &CommandContext,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if replacement_technician_id == Some(technician_id) {
            return Err(OrderError::validation("replacement technician must differ from the one being deactivated"));
        }

        let active = aggregate.active_assignment(technician_id).ok_or_else(|| {
            OrderError::validation(format!("technician {} has no active assignment on this order", technician_id))
        })?;

        let mut events = vec![OrderEvent::TechnicianDeactivated(TechnicianDeactivated {
            assignment_id: active.id,
            technician_id,
            deactivated_at: ctx.now,
        })];

        if let Some(replacement) = replacement_technician_id {
            events.extend(Self::assign(aggregate, replacement, None, ctx)?);
        }

        Ok(events)
    }

    pub fn active_assignments(aggregate: &ServiceOrderAggregate) -> Vec<&TechnicianAssignment> {
        aggregate.assignments.iter().filter(|a| a.is_active).collect()
    }
}
