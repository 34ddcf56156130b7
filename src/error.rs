//! Service-level error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::{
    dao::{sqlite::DatabaseError, storage::StorageError},
    services::codec::CodecError,
};

/// Result alias for service layer operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// The directory holding the database file could not be prepared.
    #[error("failed to prepare save directory `{}`", path.display())]
    SaveDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Filesystem failure.
        #[source]
        source: std::io::Error,
    },
    /// A record could not be turned into JSON.
    #[error("failed to serialize record `{record}`")]
    Serialize {
        /// [`Record::NAME`](crate::dao::models::Record::NAME) of the record involved.
        record: &'static str,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// A stored record is not valid JSON for its type.
    #[error("failed to deserialize record `{record}`")]
    Deserialize {
        /// [`Record::NAME`](crate::dao::models::Record::NAME) of the record involved.
        record: &'static str,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
    /// The blob codec rejected a record.
    #[error("blob codec failed for record `{record}`")]
    Codec {
        /// [`Record::NAME`](crate::dao::models::Record::NAME) of the record involved.
        record: &'static str,
        /// Underlying failure.
        #[source]
        source: CodecError,
    },
    /// The save timestamp could not be rendered.
    #[error("failed to format save timestamp")]
    Timestamp(#[from] time::error::Format),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        ServiceError::Unavailable(err.into())
    }
}
