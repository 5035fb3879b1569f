use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;

/// The logical slots a signed-in session keeps on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Bearer credential for the planner API.
    Token,
    /// Cosmetic name shown in the greeting.
    DisplayName,
    /// Serialized chat history.
    History,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Token, Slot::DisplayName, Slot::History];

    /// Stable storage key.
    pub fn key(self) -> &'static str {
        match self {
            Slot::Token => "token",
            Slot::DisplayName => "userName",
            Slot::History => "chatMessages",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

pub struct SessionSlots<'db> {
    pub(crate) conn: &'db mut Connection,
}

impl SessionSlots<'_> {
    pub fn get(&self, slot: Slot) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM session_slots WHERE slot = ?1",
                params![slot.key()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or overwrite; last writer wins.
    pub fn set(&mut self, slot: Slot, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO session_slots (slot, value, updated_at_ms)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(slot) DO UPDATE SET
                value = excluded.value,
                updated_at_ms = excluded.updated_at_ms",
            params![slot.key(), value, now_ms()],
        )?;
        Ok(())
    }

    /// Returns whether a value was present.
    pub fn remove(&mut self, slot: Slot) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM session_slots WHERE slot = ?1",
            params![slot.key()],
        )?;
        Ok(removed > 0)
    }

    /// Remove several slots atomically.
    pub fn remove_all(&mut self, slots: &[Slot]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for slot in slots {
            tx.execute(
                "DELETE FROM session_slots WHERE slot = ?1",
                params![slot.key()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.remove_all(&Slot::ALL)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
