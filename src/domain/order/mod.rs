// ============================================================================
// Service Order Domain
// ============================================================================
//
// - Value objects (OrderStatus and its adjacency table, money helpers)
// - Commands and per-target status change requests
// - Events (persisted facts) and notification events (what to say)
// - Policy modules: state machine, payments, warranty, cancellation,
//   technician assignments, status history
// - Aggregate (ServiceOrderAggregate) and its command handler
//
// ============================================================================

pub mod aggregate;
pub mod assignments;
pub mod cancellation;
pub mod command_handler;
pub mod commands;
pub mod errors;
pub mod events;
pub mod history;
pub mod payments;
pub mod response;
pub mod state_machine;
pub mod value_objects;
pub mod warranty;

pub use aggregate::{Payment, ServiceOrder, ServiceOrderAggregate, StatusHistoryEntry, TechnicianAssignment};
pub use assignments::TechnicianAssignmentTracker;
pub use cancellation::CancellationPolicy;
pub use command_handler::OrderCommandHandler;
pub use commands::*;
pub use errors::OrderError;
pub use events::{NotificationEvent, OrderEvent};
pub use history::StatusHistoryLog;
pub use payments::PaymentLedger;
pub use response::OperationResult;
pub use state_machine::OrderStateMachine;
pub use value_objects::*;
pub use warranty::WarrantyPolicy;
