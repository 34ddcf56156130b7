use std::{
    panic::{self, AssertUnwindSafe},
    path::Path,
    sync::Arc,
};

use rusqlite::{Connection, Params, ToSql};
use tracing::{debug, info};

use super::{
    driver::{ConnectionInfo, find_driver},
    error::{CONNECTION_NOT_OPENED_ERROR, DatabaseError, DatabaseResult},
    query::{self, Dialect},
    registry::TableRegistry,
    report::{ERROR_TITLE, ErrorReporter, TracingReporter, describe},
    session::SessionGuard,
};

/// Live connection plus the dialect of the driver that opened it.
struct Session {
    connection: Connection,
    dialect: Dialect,
}

/// SQL table registry and single-session manager.
///
/// Callers address tables through logical ids registered with [`Database::register_table`];
/// every statement is built from the registered physical name. One instance owns at most one
/// live session and performs no locking, so concurrent use must be serialized by the caller.
pub struct Database {
    connection: ConnectionInfo,
    wal_mode: bool,
    session: Option<Session>,
    registry: TableRegistry,
    reporter: Arc<dyn ErrorReporter>,
}

impl Database {
    /// Manage the SQLite file at `path`. No connection is made until a session is opened.
    pub fn new(path: impl AsRef<Path>, wal_mode: bool) -> Self {
        Self::with_connection(ConnectionInfo::sqlite3(path), wal_mode)
    }

    /// Manage the store described by an explicit connection descriptor.
    pub fn with_connection(connection: ConnectionInfo, wal_mode: bool) -> Self {
        Self {
            connection,
            wal_mode,
            session: None,
            registry: TableRegistry::new(),
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Replace the sink that receives failure reports.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Descriptor sessions are opened against.
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Registered tables.
    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// Register `id` as the physical table `name` with column clause `fields`. Last write wins.
    pub fn register_table(&mut self, id: &str, name: &str, fields: &str) {
        self.registry.register(id, name, fields);
    }

    /// Physical name registered for `id`. Panics if `id` is unknown.
    pub fn table_name(&self, id: &str) -> &str {
        self.registry.name(id)
    }

    /// Column clause registered for `id`. Panics if `id` is unknown.
    pub fn table_fields(&self, id: &str) -> &str {
        self.registry.fields(id)
    }

    /// Change the physical name of `id` without touching the database.
    pub fn set_table_name(&mut self, id: &str, name: &str) {
        self.registry.set_name(id, name);
    }

    /// Change the column clause of `id`; only affects later `CREATE TABLE` statements.
    pub fn set_table_fields(&mut self, id: &str, fields: &str) {
        self.registry.set_fields(id, fields);
    }

    /// Whether a session is live.
    pub fn is_session_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open the session using the stored descriptor.
    pub fn open_session(&mut self) -> DatabaseResult<()> {
        let result = self.try_open_session();
        self.reported(result)
    }

    /// Close the live session.
    pub fn close_session(&mut self) -> DatabaseResult<()> {
        let result = self.try_close_session();
        self.reported(result)
    }

    /// Guard that closes the session when it goes out of scope, if it is still open then.
    pub fn session_guard(&mut self) -> SessionGuard<'_> {
        SessionGuard::new(self)
    }

    /// Create every registered table inside one transaction.
    ///
    /// Opens and closes its own session. Either all tables are committed or the transaction is
    /// rolled back and the error returned.
    pub fn initialize(&mut self) -> DatabaseResult<()> {
        let result = {
            let mut session = self.session_guard();
            session.try_initialize()
        };
        self.reported(result)
    }

    /// The live connection, for statements beyond the built-in templates.
    ///
    /// # Panics
    ///
    /// Panics when no session is open.
    pub fn sql(&self) -> &Connection {
        &self.session().connection
    }

    /// Mutable access to the live connection, e.g. to start a checked transaction.
    ///
    /// # Panics
    ///
    /// Panics when no session is open.
    pub fn sql_mut(&mut self) -> &mut Connection {
        if self.session.is_none() {
            self.not_opened();
        }
        match self.session.as_mut() {
            Some(session) => &mut session.connection,
            None => unreachable!(),
        }
    }

    /// Create the table behind `id` if it does not exist yet.
    pub fn create_table(&self, id: &str) -> DatabaseResult<()> {
        let result = self.try_create_table(id);
        self.reported(result)
    }

    /// Drop the table behind `id` if it exists.
    pub fn drop_table(&self, id: &str) -> DatabaseResult<()> {
        let query = query::drop_table(self.registry.name(id));
        let result = self.execute(&query, []).map(|_| ());
        self.reported(result)
    }

    /// Rename the physical table behind `id`. The registry only changes once the statement
    /// succeeds.
    pub fn rename_table(&mut self, id: &str, new_name: &str) -> DatabaseResult<()> {
        let query = query::rename_table(self.registry.name(id), new_name);
        let result = self.execute(&query, []);
        match self.reported(result) {
            Ok(_) => {
                self.registry.set_name(id, new_name);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Insert one row, binding `args` positionally to the columns listed in `fields`.
    pub fn insert(&self, id: &str, fields: &str, args: &[&dyn ToSql]) -> DatabaseResult<usize> {
        let query = query::insert(self.registry.name(id), fields, args.len());
        let result = self.execute(&query, args);
        self.reported(result)
    }

    /// Update the rows where `where_column = where_value`.
    ///
    /// `args` fill the placeholders of `set` in order; `where_value` is bound last.
    pub fn update(
        &self,
        id: &str,
        where_column: &str,
        where_value: &dyn ToSql,
        set: &str,
        args: &[&dyn ToSql],
    ) -> DatabaseResult<usize> {
        let query = query::update(
            self.session().dialect,
            self.registry.name(id),
            set,
            where_column,
        );
        let bound: Vec<&dyn ToSql> = args
            .iter()
            .copied()
            .chain(std::iter::once(where_value))
            .collect();
        let result = self.execute(&query, bound.as_slice());
        self.reported(result)
    }

    /// Delete the rows where `where_column = where_value`.
    pub fn delete(
        &self,
        id: &str,
        where_column: &str,
        where_value: &dyn ToSql,
    ) -> DatabaseResult<usize> {
        let query = query::delete(self.session().dialect, self.registry.name(id), where_column);
        let result = self.execute(&query, [where_value]);
        self.reported(result)
    }

    fn try_open_session(&mut self) -> DatabaseResult<()> {
        if self.session.is_some() {
            return Err(DatabaseError::SessionAlreadyOpen);
        }

        let driver =
            find_driver(self.connection.driver()).ok_or_else(|| DatabaseError::DriverNotLoaded {
                driver: self.connection.driver().to_owned(),
            })?;

        let info = &self.connection;
        let connection = panic::catch_unwind(AssertUnwindSafe(|| (driver.connect)(info)))
            .map_err(|_| DatabaseError::Unknown)?
            .map_err(|source| DatabaseError::Open { source })?;

        if self.wal_mode {
            connection
                .execute_batch(query::WAL_MODE)
                .map_err(|source| DatabaseError::statement(query::WAL_MODE, source))?;
        }

        self.session = Some(Session {
            connection,
            dialect: driver.dialect,
        });
        debug!(connection = %self.connection, "database session opened");
        Ok(())
    }

    fn try_close_session(&mut self) -> DatabaseResult<()> {
        let Some(Session {
            connection,
            dialect,
        }) = self.session.take()
        else {
            return Err(DatabaseError::SessionAlreadyClosed);
        };

        match connection.close() {
            Ok(()) => {
                debug!(connection = %self.connection, "database session closed");
                Ok(())
            }
            Err((connection, source)) => {
                self.session = Some(Session {
                    connection,
                    dialect,
                });
                Err(DatabaseError::Close { source })
            }
        }
    }

    fn try_initialize(&mut self) -> DatabaseResult<()> {
        self.try_open_session()?;

        {
            let transaction = self
                .sql()
                .unchecked_transaction()
                .map_err(|source| DatabaseError::Transaction { source })?;

            for id in self.registry.ids() {
                self.try_create_table(id)?;
            }

            transaction
                .commit()
                .map_err(|source| DatabaseError::Transaction { source })?;
        }

        self.try_close_session()?;
        info!(
            connection = %self.connection,
            tables = self.registry.len(),
            "database schema initialized"
        );
        Ok(())
    }

    fn try_create_table(&self, id: &str) -> DatabaseResult<()> {
        let query = query::create_table(self.registry.name(id), self.registry.fields(id));
        self.execute(&query, []).map(|_| ())
    }

    fn execute(&self, query: &str, params: impl Params) -> DatabaseResult<usize> {
        self.sql()
            .execute(query, params)
            .map_err(|source| DatabaseError::statement(query, source))
    }

    fn session(&self) -> &Session {
        match &self.session {
            Some(session) => session,
            None => self.not_opened(),
        }
    }

    fn not_opened(&self) -> ! {
        self.reporter.report(ERROR_TITLE, CONNECTION_NOT_OPENED_ERROR);
        panic!("{CONNECTION_NOT_OPENED_ERROR}");
    }

    fn reported<T>(&self, result: DatabaseResult<T>) -> DatabaseResult<T> {
        if let Err(err) = &result {
            self.reporter.report(ERROR_TITLE, &describe(err));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;
    use crate::dao::sqlite::driver::{Driver, install_driver, load_sqlite3_driver, sqlite3_vacuum};

    #[derive(Default)]
    struct RecordingReporter {
        reports: Mutex<Vec<String>>,
    }

    impl RecordingReporter {
        fn messages(&self) -> Vec<String> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl ErrorReporter for RecordingReporter {
        fn report(&self, title: &str, message: &str) {
            assert_eq!(title, ERROR_TITLE);
            self.reports.lock().unwrap().push(message.to_owned());
        }
    }

    fn scratch_database(wal_mode: bool) -> (TempDir, Database, Arc<RecordingReporter>) {
        load_sqlite3_driver();
        let dir = tempfile::tempdir().unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let database =
            Database::new(dir.path().join("test.db"), wal_mode).with_reporter(reporter.clone());
        (dir, database, reporter)
    }

    fn table_names(dir: &TempDir) -> Vec<String> {
        let connection = Connection::open(dir.path().join("test.db")).unwrap();
        let mut statement = connection
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        statement
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn register_players(database: &mut Database) {
        database.register_table("players", "Players", "Id TEXT PRIMARY KEY, Score INTEGER");
    }

    #[test]
    fn session_opens_and_closes() {
        let (_dir, mut database, reporter) = scratch_database(false);
        assert!(!database.is_session_open());

        database.open_session().unwrap();
        assert!(database.is_session_open());

        database.close_session().unwrap();
        assert!(!database.is_session_open());
        assert!(reporter.messages().is_empty());
    }

    #[test]
    fn double_open_and_double_close_are_reported_errors() {
        let (_dir, mut database, reporter) = scratch_database(false);

        database.open_session().unwrap();
        assert!(matches!(
            database.open_session(),
            Err(DatabaseError::SessionAlreadyOpen)
        ));
        assert!(database.is_session_open());

        database.close_session().unwrap();
        assert!(matches!(
            database.close_session(),
            Err(DatabaseError::SessionAlreadyClosed)
        ));
        assert!(!database.is_session_open());

        let messages = reporter.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("opened already"));
        assert!(messages[1].contains("closed already"));
    }

    #[test]
    fn guard_closes_a_session_left_open() {
        let (_dir, mut database, _) = scratch_database(false);
        {
            let mut session = database.session_guard();
            session.open_session().unwrap();
            assert!(session.is_session_open());
        }
        assert!(!database.is_session_open());
    }

    #[test]
    fn guard_over_a_closed_session_is_a_no_op() {
        let (_dir, mut database, reporter) = scratch_database(false);
        {
            let session = database.session_guard();
            assert!(!session.is_session_open());
        }
        assert!(!database.is_session_open());
        assert!(reporter.messages().is_empty());
    }

    #[test]
    fn guard_closes_on_early_return() {
        fn bail_out(database: &mut Database) -> DatabaseResult<()> {
            let mut session = database.session_guard();
            session.open_session()?;
            session.open_session()?;
            unreachable!("second open must fail");
        }

        let (_dir, mut database, _) = scratch_database(false);
        assert!(bail_out(&mut database).is_err());
        assert!(!database.is_session_open());
    }

    #[test]
    fn initialize_creates_every_registered_table() {
        let (dir, mut database, _) = scratch_database(true);
        register_players(&mut database);
        database.register_table("saves", "GameData", "Name TEXT PRIMARY KEY, Data BLOB");
        database.register_table("settings", "Settings", "Key TEXT, Value TEXT");

        database.initialize().unwrap();

        assert!(!database.is_session_open());
        assert_eq!(table_names(&dir), vec!["GameData", "Players", "Settings"]);

        // Re-running is harmless thanks to IF NOT EXISTS.
        database.initialize().unwrap();
        assert_eq!(table_names(&dir).len(), 3);
    }

    #[test]
    fn failed_initialize_commits_nothing() {
        let (dir, mut database, reporter) = scratch_database(false);
        register_players(&mut database);
        database.register_table("broken", "Broken", "Id TEXT,,");
        database.register_table("settings", "Settings", "Key TEXT, Value TEXT");

        let err = database.initialize().unwrap_err();
        assert!(matches!(err, DatabaseError::Statement { .. }));
        assert!(!database.is_session_open());
        assert!(table_names(&dir).is_empty());
        assert_eq!(reporter.messages().len(), 1);

        database.set_table_fields("broken", "Id TEXT");
        database.initialize().unwrap();
        assert_eq!(table_names(&dir), vec!["Broken", "Players", "Settings"]);
    }

    #[test]
    fn initialize_with_open_session_fails_and_closes() {
        let (_dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.open_session().unwrap();

        assert!(matches!(
            database.initialize(),
            Err(DatabaseError::SessionAlreadyOpen)
        ));
        assert!(!database.is_session_open());
    }

    #[test]
    fn players_round_trip() {
        let (dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.initialize().unwrap();
        assert_eq!(table_names(&dir), vec!["Players"]);

        let mut session = database.session_guard();
        session.open_session().unwrap();

        let columns: Vec<String> = session
            .sql()
            .prepare("SELECT name FROM pragma_table_info('Players') ORDER BY cid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(columns, vec!["Id", "Score"]);

        let inserted = session.insert("players", "Id, Score", &[&"p1", &"42"]).unwrap();
        assert_eq!(inserted, 1);

        let rows: Vec<(String, i64)> = session
            .sql()
            .prepare("SELECT Id, Score FROM Players")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![("p1".to_owned(), 42)]);
    }

    #[test]
    fn insert_binds_arguments_in_order() {
        let (_dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.initialize().unwrap();
        database.open_session().unwrap();

        database
            .insert("players", "Score, Id", &[&7_i64, &"p2"])
            .unwrap();

        let (id, score): (String, i64) = database
            .sql()
            .query_row("SELECT Id, Score FROM Players", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!((id.as_str(), score), ("p2", 7));
    }

    #[test]
    fn insert_with_mismatched_argument_count_fails() {
        let (_dir, mut database, reporter) = scratch_database(false);
        register_players(&mut database);
        database.initialize().unwrap();
        database.open_session().unwrap();

        let err = database
            .insert("players", "Id, Score", &[&"p1"])
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Statement { .. }));
        assert_eq!(reporter.messages().len(), 1);
    }

    #[test]
    fn update_and_delete_touch_only_matching_rows() {
        let (_dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.initialize().unwrap();
        database.open_session().unwrap();

        database.insert("players", "Id, Score", &[&"p1", &10]).unwrap();
        database.insert("players", "Id, Score", &[&"p2", &20]).unwrap();

        let updated = database
            .update("players", "Id", &"p1", "Score = ?", &[&99])
            .unwrap();
        assert_eq!(updated, 1);
        let missing = database
            .update("players", "Id", &"nobody", "Score = ?", &[&1])
            .unwrap();
        assert_eq!(missing, 0);

        let score = |database: &Database, id: &str| -> Option<i64> {
            database
                .sql()
                .query_row("SELECT Score FROM Players WHERE Id = ?1", [id], |row| {
                    row.get(0)
                })
                .ok()
        };
        assert_eq!(score(&database, "p1"), Some(99));
        assert_eq!(score(&database, "p2"), Some(20));

        assert_eq!(database.delete("players", "Id", &"p2").unwrap(), 1);
        assert_eq!(score(&database, "p2"), None);
        assert_eq!(score(&database, "p1"), Some(99));
    }

    #[test]
    fn rename_updates_the_registry_after_success() {
        let (dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.initialize().unwrap();
        database.open_session().unwrap();

        database.rename_table("players", "Heroes").unwrap();
        assert_eq!(database.table_name("players"), "Heroes");

        database.close_session().unwrap();
        assert_eq!(table_names(&dir), vec!["Heroes"]);
    }

    #[test]
    fn failed_rename_keeps_the_old_name() {
        let (_dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.register_table("saves", "GameData", "Name TEXT");
        database.initialize().unwrap();
        database.open_session().unwrap();

        let err = database.rename_table("players", "GameData").unwrap_err();
        assert!(matches!(err, DatabaseError::Statement { .. }));
        assert_eq!(database.table_name("players"), "Players");
    }

    #[test]
    fn drop_and_create_single_tables() {
        let (dir, mut database, _) = scratch_database(false);
        register_players(&mut database);
        database.open_session().unwrap();

        database.create_table("players").unwrap();
        database.drop_table("players").unwrap();
        database.drop_table("players").unwrap();
        database.close_session().unwrap();

        assert!(table_names(&dir).is_empty());
    }

    #[test]
    fn wal_mode_is_applied_on_open() {
        let (_dir, mut database, _) = scratch_database(true);
        database.open_session().unwrap();

        let mode: String = database
            .sql()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn initialize_under_a_non_utf8_directory() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        load_sqlite3_driver();
        let dir = tempfile::tempdir().unwrap();
        let slot = dir.path().join(OsStr::from_bytes(b"slot\xff"));
        std::fs::create_dir(&slot).unwrap();
        let path = slot.join("save.db");

        let mut database = Database::new(&path, false);
        register_players(&mut database);
        database.initialize().unwrap();

        assert!(path.exists());
        assert!(sqlite3_vacuum(&path));
    }

    #[test]
    fn missing_driver_is_reported() {
        let info = ConnectionInfo::parse("nosuchdriver:db=whatever;").unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let mut database = Database::with_connection(info, false).with_reporter(reporter.clone());

        assert!(matches!(
            database.open_session(),
            Err(DatabaseError::DriverNotLoaded { .. })
        ));
        assert!(!database.is_session_open());
        assert_eq!(reporter.messages().len(), 1);
    }

    #[test]
    fn panicking_driver_maps_to_unknown() {
        fn explode(_: &ConnectionInfo) -> rusqlite::Result<Connection> {
            panic!("driver blew up");
        }

        install_driver(Driver {
            name: "exploding",
            connect: explode,
            dialect: Dialect::default(),
        })
        .unwrap();

        let info = ConnectionInfo::parse("exploding:db=x;").unwrap();
        let reporter = Arc::new(RecordingReporter::default());
        let mut database = Database::with_connection(info, false).with_reporter(reporter.clone());

        assert!(matches!(database.open_session(), Err(DatabaseError::Unknown)));
        assert_eq!(reporter.messages(), vec!["GDatabase: unknown error!".to_owned()]);
    }

    #[test]
    #[should_panic(expected = "database connection has not been opened")]
    fn sql_without_session_panics() {
        let (_dir, database, _) = scratch_database(false);
        database.sql();
    }

    #[test]
    #[should_panic(expected = "ghosts table has not been registered!")]
    fn statements_on_unregistered_ids_panic() {
        let (_dir, mut database, _) = scratch_database(false);
        database.open_session().unwrap();
        let _ = database.insert("ghosts", "Id", &[&"boo"]);
    }
}
