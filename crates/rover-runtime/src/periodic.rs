//! Periodic background jobs with explicit stop signalling.
//!
//! A [`PeriodicJob`] is ticked on a fixed interval by [`spawn_periodic`]
//! until the shared [`StopSignal`] is raised, after which its
//! [`on_stop`][PeriodicJob::on_stop] hook runs once.  A slow tick delays the
//! next one instead of triggering a burst of catch-up ticks.
//!
//! [`RunningJob`] pairs a spawned job with a stop signal of its own, so a
//! caller can stop jobs one at a time in a chosen order.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use async_trait::async_trait;
//! use rover_runtime::periodic::{PeriodicJob, StopSignal, spawn_periodic};
//!
//! struct Heartbeat;
//!
//! #[async_trait]
//! impl PeriodicJob for Heartbeat {
//!     fn name(&self) -> &str { "heartbeat" }
//!     async fn tick(&mut self) { tracing::info!("alive"); }
//! }
//!
//! # async fn run() {
//! let stop = StopSignal::new();
//! let handle = spawn_periodic(Heartbeat, Duration::from_secs(1), stop.clone());
//! stop.raise();
//! handle.await.unwrap();
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Shortest tick period.  Shorter requests, zero included, are raised to it.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[async_trait]
pub trait PeriodicJob: Send + 'static {
    fn name(&self) -> &str;

    async fn tick(&mut self);

    /// Runs once after the stop signal is observed.
    async fn on_stop(&mut self) {}
}

/// Cloneable process-wide stop flag.
#[derive(Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Idempotent.  Callable from any thread, including a signal handler.
    pub fn raise(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_raised(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`raise`][Self::raise] has been called.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` can only end by matching.
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

/// Drive `job` every `period` until `stop` is raised.
///
/// The first tick fires immediately.  A `period` below [`MIN_PERIOD`] is
/// raised to it.
pub fn spawn_periodic<J: PeriodicJob>(
    mut job: J,
    period: Duration,
    stop: StopSignal,
) -> JoinHandle<()> {
    let period = if period < MIN_PERIOD {
        warn!(job = job.name(), ?period, min = ?MIN_PERIOD, "period too short; clamped");
        MIN_PERIOD
    } else {
        period
    };
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(job = job.name(), ?period, "periodic job started");

        loop {
            tokio::select! {
                biased;
                _ = stop.wait() => break,
                _ = ticker.tick() => {
                    if stop.is_raised() {
                        break;
                    }
                    job.tick().await;
                }
            }
        }

        debug!(job = job.name(), "stop signal received");
        job.on_stop().await;
        info!(job = job.name(), "periodic job stopped");
    })
}

/// A spawned [`PeriodicJob`] with its own [`StopSignal`].
pub struct RunningJob {
    name: String,
    stop: StopSignal,
    handle: JoinHandle<()>,
}

impl RunningJob {
    pub fn spawn<J: PeriodicJob>(job: J, period: Duration) -> Self {
        let name = job.name().to_string();
        let stop = StopSignal::new();
        let handle = spawn_periodic(job, period, stop.clone());
        Self { name, stop, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raise this job's signal and wait until its `on_stop` hook has run.
    /// An in-flight tick completes first.
    pub async fn stop(self) {
        self.stop.raise();
        if let Err(e) = self.handle.await {
            warn!(job = %self.name, error = %e, "background job ended abnormally");
        }
    }
}
