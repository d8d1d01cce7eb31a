//! `rover-memory` – The Flight Recorder.
//!
//! Keeps a durable record of what the rover sensed and what it was told to
//! do, using a local SQLite file.
//!
//! # Modules
//!
//! - [`buffer`] – [`PersistenceBuffer`]: bounded, drop-oldest staging queues
//!   plus the in-memory counters served by the metrics endpoint.
//! - [`store`] – [`SqliteStore`]: the `sensor_log` / `command_log` tables
//!   behind the [`DurableStore`] trait.

pub mod buffer;
pub mod store;

pub use buffer::{
    BufferMetrics, CommandLogRecord, DEFAULT_CAPACITY, FlushBatch, PersistenceBuffer,
    SensorLogRecord,
};
pub use store::{DurableStore, SqliteStore, StoreError};
