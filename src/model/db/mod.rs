//! The SQLite database shared by the registry and the ballot box.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;
use rusqlite::Connection;

use crate::error::{Error, Result};

mod errors;
pub use errors::is_unique_violation;

/// How long a write waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS voters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        face_path TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_name TEXT NOT NULL,
        candidate_name TEXT NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_votes_user_name ON votes(user_name);
";

/// A handle on the database. Clones share one connection, and every user
/// must go through [`Store::lock`], so statements never interleave.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if necessary) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening database {}", path.display());
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Open a private database that disappears when the last clone is dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        ensure_schema_exists(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Take exclusive use of the connection.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StoragePoisoned)
    }
}

/// Create the tables and indexes if they don't exist yet.
fn ensure_schema_exists(conn: &Connection) -> Result<()> {
    debug!("Ensuring tables and indexes exist");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
