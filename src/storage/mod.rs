//! Durable storage: profiles, pairing history, and redeemed meeting grants

pub mod db;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool, Profile};
