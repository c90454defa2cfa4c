use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against an immutable snapshot (`&self`)
// 2. A valid command yields events describing what changed
// 3. Events are applied to a copy, which is what gets persisted
// 4. A rejected command therefore never leaves partial state behind
//
// ============================================================================

/// Who is acting and at which instant; every command is evaluated against one
/// fixed `now` so compound transitions stamp consistent dates.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub actor_id: Uuid,
    pub now: DateTime<Utc>,
}

impl CommandContext {
    pub fn new(actor_id: Uuid) -> Self {
        Self { actor_id, now: Utc::now() }
    }

    pub fn at(actor_id: Uuid, now: DateTime<Utc>) -> Self {
        Self { actor_id, now }
    }
}

/// Generic aggregate trait
///
/// Type Parameters:
/// - `Event`: what a handled command produced
/// - `Command`: caller intent
/// - `Error`: business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create new aggregate from its creation event
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command, ctx: &CommandContext) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Version of the persisted snapshot this aggregate was loaded from
    fn version(&self) -> i64;

    fn apply_events(&mut self, events: &[Self::Event]) -> Result<(), Self::Error> {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(())
    }
}
