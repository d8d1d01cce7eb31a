//! Telemetry ingest loop.
//!
//! Each tick fetches the rover's sensor state and, on success:
//!
//! 1. publishes it to the [`SnapshotCell`],
//! 2. stages a sensor-log record in the [`PersistenceBuffer`],
//! 3. runs the [`SafetyEngine`],
//! 4. stages an `aspr`-sourced `stop` command if the engine issued one.
//!
//! A failed fetch is logged and the loop waits for the next tick.  There is
//! no backoff and no circuit breaker.

use std::sync::Arc;

use async_trait::async_trait;
use rover_hal::SensorSource;
use rover_kernel::SafetyEngine;
use rover_memory::PersistenceBuffer;
use rover_types::{CommandSource, InterventionAction, InterventionEvent, MoveCommand};
use tracing::{instrument, warn};

use crate::periodic::PeriodicJob;
use crate::snapshot::SnapshotCell;

pub struct IngestLoop {
    source: Arc<dyn SensorSource>,
    snapshot: Arc<SnapshotCell>,
    buffer: Arc<PersistenceBuffer>,
    engine: Arc<SafetyEngine>,
}

impl IngestLoop {
    pub fn new(
        source: Arc<dyn SensorSource>,
        snapshot: Arc<SnapshotCell>,
        buffer: Arc<PersistenceBuffer>,
        engine: Arc<SafetyEngine>,
    ) -> Self {
        Self {
            source,
            snapshot,
            buffer,
            engine,
        }
    }

    /// One poll cycle.  Returns the engine's verdict, if any.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> Option<InterventionEvent> {
        let snapshot = match self.source.fetch().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "sensor fetch failed; retrying next period");
                return None;
            }
        };

        self.snapshot.publish(snapshot);
        self.buffer.push_sensor(&snapshot);

        let event = self.engine.evaluate(&snapshot).await?;
        if event.action == InterventionAction::EmergencyStop {
            self.buffer.push_command(
                MoveCommand::Stop,
                CommandSource::Aspr,
                None,
                Some(event.reason()),
            );
        }
        Some(event)
    }
}

#[async_trait]
impl PeriodicJob for IngestLoop {
    fn name(&self) -> &str {
        "ingest"
    }

    async fn tick(&mut self) {
        self.poll_once().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rover_hal::{Actuator, ActuatorReply};
    use rover_kernel::AbsentClassifier;
    use rover_types::{RoverError, SafetyMode, SensorSnapshot, TriggerKind};
    use std::collections::VecDeque;

    /// Replays a scripted sequence of fetch results.
    struct ScriptedSource(Mutex<VecDeque<Result<SensorSnapshot, RoverError>>>);

    impl ScriptedSource {
        fn new(script: Vec<Result<SensorSnapshot, RoverError>>) -> Self {
            Self(Mutex::new(script.into()))
        }
    }

    #[async_trait]
    impl SensorSource for ScriptedSource {
        async fn fetch(&self) -> Result<SensorSnapshot, RoverError> {
            self.0.lock().pop_front().unwrap_or_else(|| {
                Err(RoverError::Transport {
                    endpoint: "script".into(),
                    details: "exhausted".into(),
                })
            })
        }
    }

    #[derive(Default)]
    struct StopRecorder(Mutex<Vec<MoveCommand>>);

    #[async_trait]
    impl Actuator for StopRecorder {
        async fn send(&self, command: MoveCommand) -> Result<ActuatorReply, RoverError> {
            self.0.lock().push(command);
            Ok(ActuatorReply {
                status: 200,
                body: "OK".into(),
            })
        }
    }

    fn at(distance: f64) -> Result<SensorSnapshot, RoverError> {
        let mut s = SensorSnapshot::unknown(1);
        s.distance_cm = Some(distance);
        Ok(s)
    }

    fn harness(
        mode: SafetyMode,
        script: Vec<Result<SensorSnapshot, RoverError>>,
    ) -> (IngestLoop, Arc<SnapshotCell>, Arc<PersistenceBuffer>, Arc<StopRecorder>) {
        let actuator = Arc::new(StopRecorder::default());
        let engine = Arc::new(SafetyEngine::new(
            mode,
            Arc::new(AbsentClassifier),
            actuator.clone(),
        ));
        let snapshot = Arc::new(SnapshotCell::new());
        let buffer = Arc::new(PersistenceBuffer::default());
        let ingest = IngestLoop::new(
            Arc::new(ScriptedSource::new(script)),
            snapshot.clone(),
            buffer.clone(),
            engine,
        );
        (ingest, snapshot, buffer, actuator)
    }

    #[tokio::test]
    async fn safe_reading_is_published_and_staged() {
        let (ingest, snapshot, buffer, actuator) = harness(SafetyMode::Safe, vec![at(80.0)]);
        assert!(ingest.poll_once().await.is_none());

        assert_eq!(snapshot.latest().unwrap().distance_cm, Some(80.0));
        let m = buffer.metrics();
        assert_eq!(m.sensor_records, 1);
        assert_eq!(m.total_commands, 0);
        assert!(actuator.0.lock().is_empty());
    }

    #[tokio::test]
    async fn emergency_stop_is_logged_as_aspr_command() {
        let (ingest, _, buffer, actuator) = harness(SafetyMode::Safe, vec![at(9.0)]);
        let event = ingest.poll_once().await.unwrap();
        assert_eq!(event.trigger, TriggerKind::TooClose);

        assert_eq!(*actuator.0.lock(), vec![MoveCommand::Stop]);
        let m = buffer.metrics();
        assert_eq!(m.aspr_interventions, 1);

        let batch = buffer.drain();
        let cmd = &batch.commands[0];
        assert_eq!(cmd.source, CommandSource::Aspr);
        assert_eq!(cmd.command, MoveCommand::Stop);
        assert!(cmd.reason.as_deref().unwrap().starts_with("too_close: "));
    }

    #[tokio::test]
    async fn learning_mode_outcome_is_not_logged() {
        let (ingest, _, buffer, actuator) = harness(SafetyMode::Learning, vec![at(9.0)]);
        let event = ingest.poll_once().await.unwrap();
        assert_eq!(event.action, InterventionAction::LogOnly);
        assert_eq!(buffer.metrics().total_commands, 0);
        assert!(actuator.0.lock().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_leaves_previous_snapshot() {
        let failure = Err(RoverError::Transport {
            endpoint: "http://rover/sensor".into(),
            details: "timed out".into(),
        });
        let (ingest, snapshot, buffer, _) = harness(SafetyMode::Safe, vec![at(70.0), failure]);
        ingest.poll_once().await;
        assert!(ingest.poll_once().await.is_none());

        assert_eq!(snapshot.latest().unwrap().distance_cm, Some(70.0));
        assert_eq!(buffer.metrics().sensor_records, 1);
    }
}
