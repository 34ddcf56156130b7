//! Saves, loads and removes records as encoded blobs keyed by record name.

use std::{fs, path::PathBuf, sync::Arc};

use rusqlite::OptionalExtension;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info, warn};

use crate::{
    config::PersistenceConfig,
    dao::{
        models::{GameDataRecord, RECORD_TABLE_FIELDS, Record},
        sqlite::{Database, DatabaseError, sqlite3_vacuum},
    },
    error::{ServiceError, ServiceResult},
    services::codec::BlobCodec,
};

/// Save-game persistence: records are serialized, encoded by the codec and stored one row per
/// record in the SQLite database.
///
/// Every call opens its own session and closes it before returning.
pub struct PersistenceService {
    database: Database,
    database_path: PathBuf,
    codec: Arc<dyn BlobCodec>,
}

impl PersistenceService {
    /// Build the service and register the tables of the built-in records.
    pub fn new(config: &PersistenceConfig, codec: Arc<dyn BlobCodec>) -> Self {
        let database = Database::new(config.database_path(), config.wal_mode());
        let mut service = Self {
            database,
            database_path: config.database_path().to_path_buf(),
            codec,
        };
        service.register_record::<GameDataRecord>();
        service
    }

    /// Register the table backing `R`. Must happen before [`PersistenceService::initialize`].
    pub fn register_record<R: Record>(&mut self) {
        self.database
            .register_table(R::TABLE_ID, R::TABLE_NAME, RECORD_TABLE_FIELDS);
    }

    /// Underlying table registry and session manager.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Mutable access, e.g. to register extra tables before initialization.
    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    /// Create the save directory and every registered record table.
    pub fn initialize(&mut self) -> ServiceResult<()> {
        if let Some(parent) = self
            .database_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|source| ServiceError::SaveDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.database.initialize()?;
        info!(path = %self.database_path.display(), "save database initialized");
        Ok(())
    }

    /// Store `record`, replacing any previous save of the same record.
    pub fn save<R: Record>(&mut self, record: &R) -> ServiceResult<()> {
        let json = serde_json::to_vec(record).map_err(|source| ServiceError::Serialize {
            record: R::NAME,
            source,
        })?;
        let blob = self
            .codec
            .encode(&json)
            .map_err(|source| ServiceError::Codec {
                record: R::NAME,
                source,
            })?;
        let saved_at = OffsetDateTime::now_utc().format(&Rfc3339)?;

        let mut session = self.database.session_guard();
        session.open_session()?;

        {
            let transaction = session
                .sql()
                .unchecked_transaction()
                .map_err(|source| DatabaseError::Transaction { source })?;

            let updated = session.update(
                R::TABLE_ID,
                "Name",
                &R::NAME,
                "Data = ?, SavedAt = ?",
                &[&blob, &saved_at],
            )?;
            if updated == 0 {
                session.insert(
                    R::TABLE_ID,
                    "Name, Data, SavedAt",
                    &[&R::NAME, &blob, &saved_at],
                )?;
            }

            transaction
                .commit()
                .map_err(|source| DatabaseError::Transaction { source })?;
        }

        session.close_session()?;
        debug!(record = R::NAME, bytes = blob.len(), %saved_at, "saved record");
        Ok(())
    }

    /// Load the last saved `R`, if any.
    pub fn load<R: Record>(&mut self) -> ServiceResult<Option<R>> {
        let query = format!(
            "SELECT Data FROM [{}] WHERE Name = ?1;",
            self.database.table_name(R::TABLE_ID)
        );

        let mut session = self.database.session_guard();
        session.open_session()?;
        let blob: Option<Vec<u8>> = session
            .sql()
            .query_row(&query, [R::NAME], |row| row.get(0))
            .optional()
            .map_err(|source| DatabaseError::statement(&query, source))?;
        session.close_session()?;
        drop(session);

        let Some(blob) = blob else {
            debug!(record = R::NAME, "no saved record");
            return Ok(None);
        };

        let json = self
            .codec
            .decode(&blob)
            .map_err(|source| ServiceError::Codec {
                record: R::NAME,
                source,
            })?;
        let record = serde_json::from_slice(&json).map_err(|source| {
            ServiceError::Deserialize {
                record: R::NAME,
                source,
            }
        })?;
        Ok(Some(record))
    }

    /// Delete the saved `R`. Returns whether a save existed.
    pub fn remove<R: Record>(&mut self) -> ServiceResult<bool> {
        let mut session = self.database.session_guard();
        session.open_session()?;
        let removed = session.delete(R::TABLE_ID, "Name", &R::NAME)?;
        session.close_session()?;
        Ok(removed > 0)
    }

    /// Compact the save file. Returns `false` when the file could not be opened.
    pub fn vacuum(&self) -> bool {
        if self.database.is_session_open() {
            warn!("vacuum requested while a session is open; skipping");
            return false;
        }
        sqlite3_vacuum(&self.database_path)
    }
}
