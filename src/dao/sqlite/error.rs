//! Error types shared by the SQLite table registry and session manager.

use thiserror::Error;

/// Convenient result alias returning [`DatabaseError`] failures.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

pub(crate) const UNKNOWN_ERROR: &str = "GDatabase: unknown error!";
pub(crate) const CONNECTION_NOT_OPENED_ERROR: &str =
    "GDatabase: database connection has not been opened!";

/// Failures that depend on the runtime behavior of the SQL engine or on the session state.
///
/// Contract violations (unregistered table ids, using [`crate::dao::sqlite::Database::sql`]
/// on a closed session) are not represented here; they panic.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// `open_session` was called while a session is already live.
    #[error("GDatabase: database connection is opened already!")]
    SessionAlreadyOpen,
    /// `close_session` was called while no session is live.
    #[error("GDatabase: database connection is closed already!")]
    SessionAlreadyClosed,
    /// The descriptor names a driver that has not been installed.
    #[error("GDatabase: driver `{driver}` has not been loaded")]
    DriverNotLoaded {
        /// Driver name taken from the descriptor.
        driver: String,
    },
    /// A driver with the same name is already registered.
    #[error("GDatabase: driver `{driver}` is installed already")]
    DriverAlreadyInstalled {
        /// Name that was installed twice.
        driver: String,
    },
    /// The connection descriptor could not be parsed.
    #[error("GDatabase: invalid connection string `{connection}`: {reason}")]
    InvalidConnectionString {
        /// Descriptor as given.
        connection: String,
        /// What the parser tripped over.
        reason: &'static str,
    },
    /// The driver failed to open a connection.
    #[error("GDatabase: failed to open database connection!")]
    Open {
        /// Driver failure.
        #[source]
        source: rusqlite::Error,
    },
    /// The driver failed to close the connection.
    #[error("GDatabase: failed to close database connection!")]
    Close {
        /// Driver failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Executing a statement failed.
    #[error("GDatabase: failed to execute `{query}`")]
    Statement {
        /// SQL text that failed.
        query: String,
        /// Driver failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Beginning or committing a transaction failed.
    #[error("GDatabase: transaction failed")]
    Transaction {
        /// Driver failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Anything that could not be classified, such as a panicking driver.
    #[error("{}", UNKNOWN_ERROR)]
    Unknown,
}

impl DatabaseError {
    pub(crate) fn statement(query: &str, source: rusqlite::Error) -> Self {
        DatabaseError::Statement {
            query: query.to_owned(),
            source,
        }
    }
}
