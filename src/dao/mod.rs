//! Persistence layer: record models, the SQLite store and storage errors.

/// Save-game record definitions.
pub mod models;
/// SQLite table registry and session management.
pub mod sqlite;
/// Storage abstraction layer for database operations.
pub mod storage;
