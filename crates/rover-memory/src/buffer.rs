//! Bounded in-memory staging for the sensor and command logs.
//!
//! [`PersistenceBuffer`] holds two FIFO queues that drop their oldest record
//! once full, plus the running counters served by the metrics endpoint.
//! Counters move at insertion time, so they report every *accepted* record
//! whether or not it has reached disk yet.
//!
//! Queues and counters share one lock.  [`PersistenceBuffer::drain`] swaps
//! both queues out in a single critical section; the caller performs the
//! durable write with the lock released and hands the batch back through
//! [`PersistenceBuffer::requeue`] if the write fails.
//!
//! # Example
//!
//! ```rust
//! use rover_memory::PersistenceBuffer;
//! use rover_types::SensorSnapshot;
//!
//! let buffer = PersistenceBuffer::new(2);
//! for ts in 0..3 {
//!     buffer.push_sensor(&SensorSnapshot::unknown(ts));
//! }
//! let batch = buffer.drain();
//! assert_eq!(batch.sensors.len(), 2);
//! assert_eq!(batch.sensors[0].timestamp_ms, 1);
//! assert_eq!(buffer.metrics().sensor_records, 3);
//! ```

use std::collections::VecDeque;

use parking_lot::Mutex;
use rover_types::{CommandSource, MoveCommand, SensorSnapshot, now_ms};
use serde::Serialize;
use tracing::debug;

/// Records kept per stream when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the `sensor_log` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorLogRecord {
    pub timestamp_ms: i64,
    pub distance_cm: Option<f64>,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    pub gz: f64,
}

impl From<&SensorSnapshot> for SensorLogRecord {
    fn from(s: &SensorSnapshot) -> Self {
        Self {
            timestamp_ms: s.timestamp_ms,
            distance_cm: s.distance_cm,
            ax: s.accel.ax_g,
            ay: s.accel.ay_g,
            az: s.accel.az_g,
            gz: s.gyro.gz_dps,
        }
    }
}

/// One row of the `command_log` table.  Stamped when the command is
/// accepted, not when it is flushed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandLogRecord {
    pub timestamp_ms: i64,
    pub command: MoveCommand,
    pub source: CommandSource,
    pub operator: Option<String>,
    pub reason: Option<String>,
}

/// Everything swapped out of the buffer by one [`PersistenceBuffer::drain`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushBatch {
    pub sensors: Vec<SensorLogRecord>,
    pub commands: Vec<CommandLogRecord>,
}

impl FlushBatch {
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sensors.len() + self.commands.len()
    }
}

/// In-memory counters, as served by `GET /metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferMetrics {
    pub sensor_records: u64,
    /// Distance of the most recent sensor record, rounded to 0.1 cm.
    pub last_distance: Option<f64>,
    pub total_commands: u64,
    pub aspr_interventions: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// PersistenceBuffer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inner {
    sensors: VecDeque<SensorLogRecord>,
    commands: VecDeque<CommandLogRecord>,
    sensor_records: u64,
    last_distance: Option<f64>,
    total_commands: u64,
    aspr_interventions: u64,
}

/// Drop-oldest staging area shared by the ingest loop, the command handler
/// and the flush job.
#[derive(Debug)]
pub struct PersistenceBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for PersistenceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PersistenceBuffer {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push_sensor(&self, snapshot: &SensorSnapshot) {
        let record = SensorLogRecord::from(snapshot);
        let mut inner = self.inner.lock();
        inner.sensor_records += 1;
        inner.last_distance = record.distance_cm;
        push_bounded(&mut inner.sensors, record, self.capacity);
    }

    /// Stage a command stamped with the current time.
    pub fn push_command(
        &self,
        command: MoveCommand,
        source: CommandSource,
        operator: Option<String>,
        reason: Option<String>,
    ) {
        let record = CommandLogRecord {
            timestamp_ms: now_ms(),
            command,
            source,
            operator,
            reason,
        };
        let mut inner = self.inner.lock();
        inner.total_commands += 1;
        if source == CommandSource::Aspr {
            inner.aspr_interventions += 1;
        }
        push_bounded(&mut inner.commands, record, self.capacity);
    }

    /// Swap both queues for empty ones and return their contents.
    pub fn drain(&self) -> FlushBatch {
        let mut inner = self.inner.lock();
        FlushBatch {
            sensors: std::mem::take(&mut inner.sensors).into(),
            commands: std::mem::take(&mut inner.commands).into(),
        }
    }

    /// Put a batch that failed to persist back in front of anything staged
    /// since.  Counters are not touched; the overflow policy still applies.
    pub fn requeue(&self, batch: FlushBatch) {
        let mut inner = self.inner.lock();
        let dropped_sensors = prepend_bounded(&mut inner.sensors, batch.sensors, self.capacity);
        let dropped_commands = prepend_bounded(&mut inner.commands, batch.commands, self.capacity);
        if dropped_sensors + dropped_commands > 0 {
            debug!(dropped_sensors, dropped_commands, "requeue overflowed buffer");
        }
    }

    pub fn pending(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.sensors.len(), inner.commands.len())
    }

    pub fn metrics(&self) -> BufferMetrics {
        let inner = self.inner.lock();
        BufferMetrics {
            sensor_records: inner.sensor_records,
            last_distance: inner.last_distance.map(|d| (d * 10.0).round() / 10.0),
            total_commands: inner.total_commands,
            aspr_interventions: inner.aspr_interventions,
        }
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) {
    if queue.len() == capacity {
        queue.pop_front();
    }
    queue.push_back(item);
}

/// Returns how many records were dropped to respect `capacity`.
fn prepend_bounded<T>(queue: &mut VecDeque<T>, older: Vec<T>, capacity: usize) -> usize {
    let newer = std::mem::take(queue);
    let mut merged: VecDeque<T> = older.into();
    merged.extend(newer);
    let overflow = merged.len().saturating_sub(capacity);
    merged.drain(..overflow);
    *queue = merged;
    overflow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(ts: i64, distance: Option<f64>) -> SensorSnapshot {
        let mut s = SensorSnapshot::unknown(ts);
        s.distance_cm = distance;
        s
    }

    #[test]
    fn overflow_evicts_oldest_but_counts_everything() {
        let buffer = PersistenceBuffer::new(100);
        for ts in 0..150 {
            buffer.push_sensor(&snapshot(ts, Some(ts as f64)));
        }
        assert_eq!(buffer.pending(), (100, 0));
        assert_eq!(buffer.metrics().sensor_records, 150);

        let batch = buffer.drain();
        assert_eq!(batch.sensors.first().unwrap().timestamp_ms, 50);
        assert_eq!(batch.sensors.last().unwrap().timestamp_ms, 149);
    }

    #[test]
    fn drain_empties_both_queues() {
        let buffer = PersistenceBuffer::default();
        buffer.push_sensor(&snapshot(1, Some(10.0)));
        buffer.push_command(MoveCommand::Forward, CommandSource::Human, Some("alice".into()), None);

        let batch = buffer.drain();
        assert_eq!(batch.len(), 2);
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.metrics().total_commands, 1, "counters survive a drain");
    }

    #[test]
    fn aspr_commands_count_as_interventions() {
        let buffer = PersistenceBuffer::default();
        buffer.push_command(MoveCommand::Left, CommandSource::Human, Some("bob".into()), None);
        buffer.push_command(
            MoveCommand::Stop,
            CommandSource::Aspr,
            None,
            Some("too_close: 9.0 cm".into()),
        );
        let m = buffer.metrics();
        assert_eq!(m.total_commands, 2);
        assert_eq!(m.aspr_interventions, 1);
    }

    #[test]
    fn last_distance_is_rounded_and_tracks_unknown() {
        let buffer = PersistenceBuffer::default();
        assert_eq!(buffer.metrics().last_distance, None);

        buffer.push_sensor(&snapshot(1, Some(42.46)));
        assert_eq!(buffer.metrics().last_distance, Some(42.5));

        buffer.push_sensor(&snapshot(2, None));
        assert_eq!(buffer.metrics().last_distance, None);
    }

    #[test]
    fn requeue_puts_failed_batch_before_newer_records() {
        let buffer = PersistenceBuffer::new(3);
        buffer.push_sensor(&snapshot(1, None));
        buffer.push_sensor(&snapshot(2, None));
        let failed = buffer.drain();

        buffer.push_sensor(&snapshot(3, None));
        buffer.push_sensor(&snapshot(4, None));
        buffer.requeue(failed);

        let order: Vec<i64> = buffer.drain().sensors.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(order, vec![2, 3, 4], "oldest record dropped to fit capacity");
        assert_eq!(buffer.metrics().sensor_records, 4, "requeue does not recount");
    }

    #[test]
    fn command_records_are_stamped_at_insertion() {
        let buffer = PersistenceBuffer::default();
        let before = now_ms();
        buffer.push_command(MoveCommand::Stop, CommandSource::Human, None, None);
        let record = buffer.drain().commands.remove(0);
        assert!(record.timestamp_ms >= before);
    }
}
