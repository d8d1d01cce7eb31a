//! Durable storage for the sensor and command logs.
//!
//! # Storage layout
//!
//! Two append-only tables are created if missing:
//!
//! | table         | columns                                            |
//! |---------------|----------------------------------------------------|
//! | `sensor_log`  | `timestamp, distance_cm, ax, ay, az, gz`           |
//! | `command_log` | `timestamp, command, source, operator, reason`     |
//!
//! `timestamp` is milliseconds since the Unix epoch at capture time.
//! `source` is `human` or `aspr`.

use std::path::Path;

use rusqlite::{Connection, params};
use thiserror::Error;
use tracing::debug;

use crate::buffer::FlushBatch;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The blocking writer task ended without reporting a result.
    #[error("store writer aborted: {0}")]
    WriterAborted(String),
}

/// Sink for flushed batches.  A batch is written in full or not at all.
pub trait DurableStore: Send {
    fn write_batch(&mut self, batch: &FlushBatch) -> Result<(), StoreError>;
}

/// SQLite-backed [`DurableStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sensor_log (
                timestamp   INTEGER NOT NULL,
                distance_cm REAL,
                ax          REAL NOT NULL,
                ay          REAL NOT NULL,
                az          REAL NOT NULL,
                gz          REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS command_log (
                timestamp INTEGER NOT NULL,
                command   TEXT NOT NULL,
                source    TEXT NOT NULL,
                operator  TEXT,
                reason    TEXT
            );",
        )?;
        Ok(())
    }

    pub fn sensor_count(&self) -> Result<u64, StoreError> {
        self.count("sensor_log")
    }

    pub fn command_count(&self) -> Result<u64, StoreError> {
        self.count("command_log")
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

impl DurableStore for SqliteStore {
    fn write_batch(&mut self, batch: &FlushBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut insert_sensor = tx.prepare_cached(
                "INSERT INTO sensor_log (timestamp, distance_cm, ax, ay, az, gz)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in &batch.sensors {
                insert_sensor.execute(params![r.timestamp_ms, r.distance_cm, r.ax, r.ay, r.az, r.gz])?;
            }
            let mut insert_command = tx.prepare_cached(
                "INSERT INTO command_log (timestamp, command, source, operator, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in &batch.commands {
                insert_command.execute(params![
                    r.timestamp_ms,
                    r.command.as_str(),
                    r.source.as_str(),
                    r.operator,
                    r.reason,
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            sensors = batch.sensors.len(),
            commands = batch.commands.len(),
            "batch persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PersistenceBuffer;
    use rover_types::{CommandSource, MoveCommand, SensorSnapshot};

    type CommandRow = (String, String, Option<String>, Option<String>);

    fn command_rows(store: &SqliteStore) -> Vec<CommandRow> {
        let mut stmt = store
            .conn
            .prepare("SELECT command, source, operator, reason FROM command_log ORDER BY rowid")
            .unwrap();
        let rows = stmt
            .query_map([], |row| -> rusqlite::Result<CommandRow> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        rows
    }

    fn staged_batch() -> FlushBatch {
        let buffer = PersistenceBuffer::default();
        let mut snap = SensorSnapshot::unknown(1_000);
        snap.distance_cm = Some(33.3);
        buffer.push_sensor(&snap);
        buffer.push_sensor(&SensorSnapshot::unknown(1_500));
        buffer.push_command(MoveCommand::Forward, CommandSource::Human, Some("alice".into()), None);
        buffer.push_command(
            MoveCommand::Stop,
            CommandSource::Aspr,
            None,
            Some("too_close: obstacle at 9.0 cm".into()),
        );
        buffer.drain()
    }

    #[test]
    fn batch_lands_in_both_tables() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.write_batch(&staged_batch()).unwrap();
        assert_eq!(store.sensor_count().unwrap(), 2);
        assert_eq!(store.command_count().unwrap(), 2);

        let rows = command_rows(&store);
        let aspr = rows.iter().find(|r| r.1 == "aspr").unwrap();
        assert_eq!(aspr.0, "stop");
        assert_eq!(aspr.2, None);
        assert!(aspr.3.as_deref().unwrap().starts_with("too_close"));
        let human = rows.iter().find(|r| r.1 == "human").unwrap();
        assert_eq!(human.2.as_deref(), Some("alice"));
    }

    #[test]
    fn unknown_distance_is_stored_as_null() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.write_batch(&staged_batch()).unwrap();
        let nulls: i64 = store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sensor_log WHERE distance_cm IS NULL",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.write_batch(&FlushBatch::default()).unwrap();
        assert_eq!(store.sensor_count().unwrap(), 0);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rover.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.write_batch(&staged_batch()).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.sensor_count().unwrap(), 2);
        assert_eq!(store.command_count().unwrap(), 2);
    }
}
