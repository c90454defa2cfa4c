// ============================================================================
// Notifications - what to say to whom, and how it leaves the process
// ============================================================================

pub mod composer;
pub mod dispatcher;

pub use composer::{Audience, MessageComposer, OutboundMessage};
pub use dispatcher::{DispatchReport, LoggingDispatcher, NotificationDispatcher, NotificationError, NotificationRouter};
