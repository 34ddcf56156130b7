//! Fixed SQL templates used by the table registry.
//!
//! Names and clauses are formatted in verbatim. Identifiers are not validated here; a name that
//! breaks the bracket quoting is passed straight through to the driver.

/// SQL features that vary between the engines a driver can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dialect {
    /// Whether `UPDATE`/`DELETE` accept the `ONLY` keyword to skip inherited tables.
    pub table_inheritance: bool,
}

impl Dialect {
    /// Dialect spoken by the bundled SQLite engine.
    pub const SQLITE3: Dialect = Dialect {
        table_inheritance: false,
    };

    fn only(&self) -> &'static str {
        if self.table_inheritance { "ONLY " } else { "" }
    }
}

pub fn create_table(name: &str, fields: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS [{name}] ( {fields} );")
}

pub fn drop_table(name: &str) -> String {
    format!("DROP TABLE IF EXISTS [{name}];")
}

pub fn rename_table(name: &str, new_name: &str) -> String {
    format!("ALTER TABLE [{name}] RENAME TO [{new_name}];")
}

/// Build an insert with one positional placeholder per bound argument.
pub fn insert(name: &str, fields: &str, arg_count: usize) -> String {
    let placeholders = vec!["?"; arg_count].join(", ");
    format!("INSERT INTO [{name}] ( {fields} ) VALUES ( {placeholders} );")
}

pub fn update(dialect: Dialect, name: &str, set: &str, where_column: &str) -> String {
    format!(
        "UPDATE {}[{name}] SET {set} WHERE {where_column} = ?;",
        dialect.only()
    )
}

pub fn delete(dialect: Dialect, name: &str, where_column: &str) -> String {
    format!(
        "DELETE FROM {}[{name}] WHERE {where_column} = ?;",
        dialect.only()
    )
}

pub const VACUUM: &str = "VACUUM;";
pub const WAL_MODE: &str = "PRAGMA journal_mode=WAL;";
