//! [`SnapshotCell`] – holder of the latest published sensor snapshot.
//!
//! One writer (the ingest loop) replaces the snapshot wholesale; any number of
//! readers receive their own copy.  Nobody ever holds a reference into the
//! cell, so a reader can never observe a half-written snapshot.

use parking_lot::Mutex;
use rover_types::SensorSnapshot;

#[derive(Debug, Default)]
pub struct SnapshotCell {
    latest: Mutex<Option<SensorSnapshot>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn publish(&self, snapshot: SensorSnapshot) {
        *self.latest.lock() = Some(snapshot);
    }

    /// Copy of the latest snapshot, or `None` before the first poll succeeds.
    pub fn latest(&self) -> Option<SensorSnapshot> {
        *self.latest.lock()
    }
}
