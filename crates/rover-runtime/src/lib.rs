//! `rover-runtime` – The Control Loop
//!
//! Wires the kernel, the rover link and the flight recorder into the
//! background jobs and the command path that `roverd` runs.
//!
//! # Modules
//!
//! - [`snapshot`] – [`SnapshotCell`]: the latest sensor snapshot, replaced
//!   wholesale on publish and copied on read.
//! - [`periodic`] – [`PeriodicJob`], [`StopSignal`], [`spawn_periodic`] and
//!   [`RunningJob`]: fixed-interval background jobs with a stop flag and an
//!   on-stop hook.
//! - [`ingest`] – [`IngestLoop`]: poll, publish, stage, evaluate.
//! - [`flush`] – [`FlushJob`]: drain the buffer into the durable store,
//!   requeueing on failure and flushing once more on stop.
//! - [`teleop`] – [`CommandService`]: arbitration, gate, actuator and
//!   command logging for human drive commands.
//! - [`telemetry`] – [`init_tracing`]: the global `tracing` subscriber with
//!   optional OTLP export.

pub mod flush;
pub mod ingest;
pub mod periodic;
pub mod snapshot;
pub mod telemetry;
pub mod teleop;

pub use flush::FlushJob;
pub use ingest::IngestLoop;
pub use periodic::{PeriodicJob, RunningJob, StopSignal, spawn_periodic};
pub use snapshot::SnapshotCell;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
pub use teleop::{CommandOutcome, CommandService};
