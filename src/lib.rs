//! Pimsbot - Telegram bot that pairs PIMS community members for meetings
//!
//! This library provides all the core functionality for the bot: the
//! per-user conversation state machine, the matching engine with its
//! credit accounting, durable profile storage, and the Telegram glue.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, and shared domain types
//! - `storage`: Profiles, pairing history, and redeemed meeting grants
//! - `matching`: Candidate selection and the atomic pairing transaction
//! - `dialogue`: Conversation state machine and the dialogue controller
//! - `telegram`: Telegram bot integration and handlers

pub mod cli;
pub mod core;
pub mod dialogue;
pub mod matching;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, Category, Gender};
pub use dialogue::{DialogueController, Event, MenuChoice, Outcome};
pub use matching::{request_match, MatchOutcome};
pub use storage::{create_pool, get_connection, DbConnection, DbPool, Profile};
