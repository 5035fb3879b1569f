use rusqlite::Connection;

use crate::error::Result;

struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("../migrations/0001_session_slots.sql"),
}];

/// Bring the schema up to the latest version recorded in `user_version`.
pub(crate) fn apply(conn: &mut Connection) -> Result<()> {
    let current: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let latest = latest_version();
    if current > latest {
        tracing::warn!(current, latest, "session store was written by a newer schema");
    }

    let pending = MIGRATIONS.iter().filter(|m| m.version > current);
    for migration in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
        tracing::debug!(version = migration.version, "applied session store migration");
    }

    Ok(())
}

pub(crate) fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}
