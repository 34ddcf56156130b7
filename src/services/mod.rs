//! Service layer composing the SQLite store with the record codec.

/// Blob transform contract applied to stored records.
pub mod codec;
/// Save-game persistence on top of the table registry.
pub mod persistence_service;

pub use persistence_service::PersistenceService;
