use std::ops::{Deref, DerefMut};

use super::database::Database;

/// Closes the database session on scope exit if it is still open.
///
/// Creating the guard does not open anything; callers open the session through the guard (it
/// derefs to [`Database`]) or before taking it.
pub struct SessionGuard<'a> {
    database: &'a mut Database,
}

impl<'a> SessionGuard<'a> {
    /// Guard `database` without touching its session state.
    pub fn new(database: &'a mut Database) -> Self {
        Self { database }
    }
}

impl Deref for SessionGuard<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.database
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Database {
        self.database
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.database.is_session_open() {
            // Failures are already reported by close_session.
            let _ = self.database.close_session();
        }
    }
}
