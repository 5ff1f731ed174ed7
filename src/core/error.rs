use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent error handling.
/// Uses `thiserror` for automatic error conversion and display formatting.
///
/// Validation problems (empty input, unknown menu choice) are not errors:
/// they are handled locally by re-prompting the user and never reach this
/// enum. Likewise a failed partner notification is logged and dropped by
/// the caller, it does not abort a committed match.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors (storage unavailable / checkout timeout)
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Возвращает `true`, если ошибка означает недоступность хранилища
    /// (пул не выдал соединение за отведённый таймаут).
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, AppError::DatabasePool(_))
    }
}
