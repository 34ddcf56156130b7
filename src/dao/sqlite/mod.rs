//! SQLite-backed table registry with guarded session management.

mod database;
pub mod driver;
mod error;
mod query;
mod registry;
mod report;
mod session;

pub use database::Database;
pub use driver::{ConnectionInfo, is_sqlite3_driver_loaded, load_sqlite3_driver, sqlite3_vacuum};
pub use error::{DatabaseError, DatabaseResult};
pub use query::Dialect;
pub use registry::{TableDescriptor, TableRegistry};
pub use report::{ERROR_TITLE, ErrorReporter, TracingReporter};
pub use session::SessionGuard;
