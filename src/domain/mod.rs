// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure decision code: commands are evaluated against a snapshot and answered
// with events. Storage and messaging live outside this module.
//
// ============================================================================

pub mod aggregate;
pub mod order;
