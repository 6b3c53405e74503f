// SQLite warehouse: holds the source table and both published datasets.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::Connection;

/// SQLite-backed warehouse holding the append-only `player_game_stats`
/// source table plus the published `player_team_reference` and
/// `player_profile` datasets (and their staging tables while a run is in
/// flight).
pub struct Warehouse {
    conn: Mutex<Connection>,
}

/// Source table name. The ingestion side appends here; both pipelines read
/// it in full on every run.
pub const SOURCE_TABLE: &str = "player_game_stats";

impl Warehouse {
    /// Open (or create) a warehouse at `path` and ensure the source table
    /// exists. Pass `":memory:"` for an ephemeral in-memory warehouse
    /// (useful for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open warehouse at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set warehouse pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS player_game_stats (
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                player_id   INTEGER NOT NULL,
                team_city   TEXT NOT NULL,
                team_name   TEXT NOT NULL,
                team_id     INTEGER NOT NULL,
                season      TEXT NOT NULL,
                game_date   TEXT NOT NULL,
                game_id     TEXT NOT NULL,
                min         REAL,
                pts         REAL NOT NULL,
                reb         REAL NOT NULL,
                ast         REAL NOT NULL,
                stl         REAL NOT NULL,
                blk         REAL NOT NULL,
                tov         REAL NOT NULL,
                pf          REAL NOT NULL,
                fgm         REAL NOT NULL,
                fga         REAL NOT NULL,
                fg3m        REAL NOT NULL,
                fg3a        REAL NOT NULL,
                ftm         REAL NOT NULL,
                fta         REAL NOT NULL,
                plus_minus  REAL NOT NULL,
                snapshot_ts TEXT NOT NULL,
                batch_id    TEXT NOT NULL,
                PRIMARY KEY (player_id, game_id)
            );
            ",
        )
        .context("failed to create source table schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the warehouse connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("warehouse mutex poisoned")
    }

    /// Returns `true` if a table with the given name exists.
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                [name],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to check existence of table {name}"))?;
        Ok(exists)
    }

    /// Return the row count of the given table. Errors if the table does
    /// not exist.
    pub fn row_count(&self, table: &str) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .with_context(|| format!("failed to count rows in {table}"))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: create a fresh in-memory warehouse for each test.
    fn test_warehouse() -> Warehouse {
        Warehouse::open(":memory:").expect("in-memory warehouse should open")
    }

    #[test]
    fn open_creates_source_table() {
        let w = test_warehouse();
        assert!(w.table_exists(SOURCE_TABLE).unwrap());
        assert_eq!(w.row_count(SOURCE_TABLE).unwrap(), 0);
    }

    #[test]
    fn published_tables_absent_until_first_publish() {
        let w = test_warehouse();
        assert!(!w.table_exists("player_team_reference").unwrap());
        assert!(!w.table_exists("player_profile").unwrap());
    }

    #[test]
    fn row_count_errors_for_missing_table() {
        let w = test_warehouse();
        assert!(w.row_count("no_such_table").is_err());
    }
}
