//! Core utilities, configuration, errors, and shared domain types

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use error::{AppError, AppResult};
pub use logging::init_logger;
pub use types::{Category, Gender};
