//! Process-wide SQL driver registration and connection descriptors.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{
        LazyLock, Once,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use indexmap::IndexMap;
use rusqlite::Connection;
use tracing::{debug, error, warn};

use super::{
    error::{DatabaseError, DatabaseResult},
    query::{self, Dialect},
};

/// Name under which the bundled SQLite driver is installed.
pub const SQLITE3_DRIVER_NAME: &str = "sqlite3";
/// Descriptor property holding the database file path.
pub const DB_PROPERTY: &str = "db";

/// Opens a connection for a parsed descriptor.
pub type ConnectFn = fn(&ConnectionInfo) -> rusqlite::Result<Connection>;

/// A named backend that sessions can be opened against.
#[derive(Clone, Copy)]
pub struct Driver {
    /// Prefix selecting this driver in a descriptor, e.g. `sqlite3`.
    pub name: &'static str,
    /// Opens a connection for a descriptor naming this driver.
    pub connect: ConnectFn,
    /// SQL variant the statement templates are rendered for.
    pub dialect: Dialect,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name)
            .field("dialect", &self.dialect)
            .finish()
    }
}

static DRIVERS: LazyLock<DashMap<&'static str, Driver>> = LazyLock::new(DashMap::new);
static SQLITE3_DRIVER: DriverSlot = DriverSlot::new();

/// One-shot installation of a built-in driver, remembering whether the install took.
struct DriverSlot {
    once: Once,
    installed: AtomicBool,
}

impl DriverSlot {
    const fn new() -> Self {
        Self {
            once: Once::new(),
            installed: AtomicBool::new(false),
        }
    }

    fn load(&self, driver: Driver) {
        self.once.call_once(|| match install_driver(driver) {
            Ok(()) => self.installed.store(true, Ordering::Release),
            Err(err) => error!(error = %err, driver = driver.name, "failed to install driver"),
        });
    }

    fn is_loaded(&self) -> bool {
        self.once.is_completed() && self.installed.load(Ordering::Acquire)
    }
}

/// Register a driver under its name. A name can only be installed once per process.
pub fn install_driver(driver: Driver) -> DatabaseResult<()> {
    match DRIVERS.entry(driver.name) {
        Entry::Occupied(_) => Err(DatabaseError::DriverAlreadyInstalled {
            driver: driver.name.to_owned(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(driver);
            debug!(driver = driver.name, "installed SQL driver");
            Ok(())
        }
    }
}

/// Look up an installed driver by name.
pub fn find_driver(name: &str) -> Option<Driver> {
    DRIVERS.get(name).map(|entry| *entry.value())
}

/// Install the bundled SQLite driver. Calls after the first one are no-ops.
pub fn load_sqlite3_driver() {
    SQLITE3_DRIVER.load(Driver {
        name: SQLITE3_DRIVER_NAME,
        connect: connect_sqlite3,
        dialect: Dialect::SQLITE3,
    });
}

/// Whether [`load_sqlite3_driver`] ran and actually installed the bundled driver.
pub fn is_sqlite3_driver_loaded() -> bool {
    SQLITE3_DRIVER.is_loaded()
}

fn connect_sqlite3(info: &ConnectionInfo) -> rusqlite::Result<Connection> {
    if let Some(path) = info.path() {
        return Connection::open(path);
    }
    let path = info
        .get(DB_PROPERTY)
        .ok_or_else(|| rusqlite::Error::InvalidPath(PathBuf::new()))?;
    Connection::open(path)
}

/// Compact the database file at `path` over a raw connection, bypassing any managed session.
///
/// Returns `true` when the file could be opened. The outcome of `VACUUM` itself only shows up in
/// the logs.
pub fn sqlite3_vacuum(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match Connection::open(path) {
        Ok(connection) => {
            if let Err(err) = connection.execute_batch(query::VACUUM) {
                warn!(path = %path.display(), error = %err, "VACUUM did not complete");
            } else {
                debug!(path = %path.display(), "vacuumed database");
            }
            true
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to open database for VACUUM");
            false
        }
    }
}

/// Immutable `driver:key=value;` connection descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    raw: String,
    driver: String,
    properties: IndexMap<String, String>,
    path: Option<PathBuf>,
}

impl ConnectionInfo {
    /// Descriptor selecting the sqlite3 driver for the file at `path`.
    ///
    /// The rendered descriptor is lossy for non UTF-8 paths; connections still open the exact
    /// `path` given here.
    pub fn sqlite3(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let display = path.to_string_lossy().into_owned();
        let raw = format!(
            "{SQLITE3_DRIVER_NAME}:{DB_PROPERTY}={};",
            quote_value(&display)
        );
        let mut properties = IndexMap::new();
        properties.insert(DB_PROPERTY.to_owned(), display);
        Self {
            raw,
            driver: SQLITE3_DRIVER_NAME.to_owned(),
            properties,
            path: Some(path.to_path_buf()),
        }
    }

    /// Parse a descriptor such as `sqlite3:db='my saves/game.db';`.
    pub fn parse(connection: &str) -> DatabaseResult<Self> {
        let invalid = |reason| DatabaseError::InvalidConnectionString {
            connection: connection.to_owned(),
            reason,
        };

        let (driver, rest) = connection
            .split_once(':')
            .ok_or_else(|| invalid("missing driver name"))?;
        let driver = driver.trim();
        if driver.is_empty() {
            return Err(invalid("missing driver name"));
        }

        let properties = parse_properties(rest).map_err(invalid)?;

        Ok(Self {
            raw: connection.to_owned(),
            driver: driver.to_owned(),
            properties,
            path: None,
        })
    }

    /// Driver name before the first `:`.
    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Value of the property `key`, unquoted.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Filesystem path this descriptor was built from, if it came from [`ConnectionInfo::sqlite3`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The descriptor text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.contains([';', '\''])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_quotes {
        format!("'{}'", value.replace('\'', "''"))
    } else {
        value.to_owned()
    }
}

fn parse_properties(input: &str) -> Result<IndexMap<String, String>, &'static str> {
    let mut properties = IndexMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars
            .next_if(|c| c.is_whitespace() || *c == ';')
            .is_some()
        {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        loop {
            match chars.next() {
                Some('=') => break,
                Some(';') | None => return Err("property without value"),
                Some(c) => key.push(c),
            }
        }
        let key = key.trim();
        if key.is_empty() {
            return Err("empty property name");
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\'') if chars.next_if_eq(&'\'').is_some() => value.push('\''),
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => return Err("unterminated quoted value"),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            match chars.next() {
                Some(';') | None => {}
                Some(_) => return Err("unexpected text after quoted value"),
            }
        } else {
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
                value.push(c);
            }
            value.truncate(value.trim_end().len());
        }

        properties.insert(key.to_owned(), value);
    }

    Ok(properties)
}
