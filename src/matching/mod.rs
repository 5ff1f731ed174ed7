//! Candidate selection and the atomic pairing transaction

pub mod engine;

pub use engine::{request_match, MatchOutcome};
