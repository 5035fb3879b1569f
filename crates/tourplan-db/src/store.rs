use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::migration;
use crate::slots::SessionSlots;

/// Durable client-side storage for one signed-in session.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        migration::apply(&mut conn)?;
        let store = Self { conn };
        tracing::debug!(version = store.schema_version()?, "session store ready");
        Ok(store)
    }

    pub fn slots(&mut self) -> SessionSlots<'_> {
        SessionSlots {
            conn: &mut self.conn,
        }
    }

    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?)
    }
}
