//! Shared SQLite connection tuning
//!
//! Applied to every connection before use. Readers additionally switch to
//! `query_only` after calling this.

use rusqlite::Connection;
use std::time::Duration;

/// Apply WAL journaling and read-friendly cache settings
pub fn apply_optimized_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -64_000i64)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}
