//! Per-user conversation state and the dialogue controller
//!
//! The controller consumes transport-agnostic [`Event`]s and produces
//! [`Outcome`]s (texts plus keyboard hints plus an optional best-effort
//! partner notice), so the whole conversational core is testable without
//! Telegram connectivity.

pub mod controller;
pub mod state;
pub mod store;

pub use controller::{
    DialogueController, Event, Keyboard, MenuChoice, Outcome, PartnerNotice, Reply, UserRef,
};
pub use state::ConversationState;
pub use store::DialogueStore;
