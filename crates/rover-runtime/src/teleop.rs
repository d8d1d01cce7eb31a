//! [`CommandService`] – the path a human drive command takes.
//!
//! 1. Arbitration and the command gate, via [`KernelGate::authorize`].  A
//!    non-holder is rejected before any rule is evaluated.
//! 2. The command is forwarded to the [`Actuator`] and its reply passed back
//!    unchanged.
//! 3. Only a forwarded command is staged in the command log.
//!
//! With no snapshot published yet the gate sees
//! [`SensorSnapshot::unknown`], which lets `forward` through.

use std::sync::Arc;

use rover_hal::{Actuator, ActuatorReply};
use rover_kernel::KernelGate;
use rover_memory::PersistenceBuffer;
use rover_types::{CommandSource, MoveCommand, RoverError, SensorSnapshot, now_ms};
use tracing::{info, instrument, warn};

use crate::snapshot::SnapshotCell;

/// Result of [`CommandService::submit`].  Every variant is a normal outcome;
/// the HTTP layer maps each one to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    NoControl,
    Blocked(String),
    Forwarded(ActuatorReply),
    ActuatorFailed(String),
}

pub struct CommandService {
    gate: KernelGate,
    snapshot: Arc<SnapshotCell>,
    actuator: Arc<dyn Actuator>,
    buffer: Arc<PersistenceBuffer>,
}

impl CommandService {
    pub fn new(
        gate: KernelGate,
        snapshot: Arc<SnapshotCell>,
        actuator: Arc<dyn Actuator>,
        buffer: Arc<PersistenceBuffer>,
    ) -> Self {
        Self {
            gate,
            snapshot,
            actuator,
            buffer,
        }
    }

    pub fn gate(&self) -> &KernelGate {
        &self.gate
    }

    #[instrument(skip(self))]
    pub async fn submit(&self, operator: &str, command: MoveCommand) -> CommandOutcome {
        let snapshot = self
            .snapshot
            .latest()
            .unwrap_or_else(|| SensorSnapshot::unknown(now_ms()));

        match self.gate.authorize(operator, command, &snapshot) {
            Ok(()) => {}
            Err(RoverError::Blocked { reason }) => {
                warn!(operator, %reason, "command blocked");
                return CommandOutcome::Blocked(reason);
            }
            Err(e) => {
                warn!(operator, error = %e, "command rejected: operator lacks control");
                return CommandOutcome::NoControl;
            }
        }

        match self.actuator.send(command).await {
            Ok(reply) => {
                self.buffer.push_command(
                    command,
                    CommandSource::Human,
                    Some(operator.to_string()),
                    None,
                );
                info!(operator, status = reply.status, "command forwarded");
                CommandOutcome::Forwarded(reply)
            }
            Err(e) => {
                warn!(operator, error = %e, "actuator unreachable");
                let details = match e {
                    RoverError::Actuator(details) => details,
                    other => other.to_string(),
                };
                CommandOutcome::ActuatorFailed(details)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rover_kernel::{CommandGate, OperatorArbiter};

    #[derive(Default)]
    struct FakeRover {
        sent: Mutex<Vec<MoveCommand>>,
        offline: bool,
    }

    #[async_trait]
    impl Actuator for FakeRover {
        async fn send(&self, command: MoveCommand) -> Result<ActuatorReply, RoverError> {
            if self.offline {
                return Err(RoverError::Actuator("connection refused".into()));
            }
            self.sent.lock().push(command);
            Ok(ActuatorReply {
                status: 200,
                body: format!("OK {command}"),
            })
        }
    }

    struct Rig {
        service: CommandService,
        snapshot: Arc<SnapshotCell>,
        rover: Arc<FakeRover>,
        buffer: Arc<PersistenceBuffer>,
    }

    fn rig(offline: bool) -> Rig {
        let arbiter = Arc::new(OperatorArbiter::new());
        arbiter.take("alice");
        let snapshot = Arc::new(SnapshotCell::new());
        let rover = Arc::new(FakeRover {
            sent: Mutex::new(Vec::new()),
            offline,
        });
        let buffer = Arc::new(PersistenceBuffer::default());
        let service = CommandService::new(
            KernelGate::new(arbiter, CommandGate::default()),
            snapshot.clone(),
            rover.clone(),
            buffer.clone(),
        );
        Rig {
            service,
            snapshot,
            rover,
            buffer,
        }
    }

    fn publish_distance(cell: &SnapshotCell, distance: f64) {
        let mut s = SensorSnapshot::unknown(1);
        s.distance_cm = Some(distance);
        cell.publish(s);
    }

    #[tokio::test]
    async fn holder_command_is_forwarded_and_logged() {
        let rig = rig(false);
        let outcome = rig.service.submit("alice", MoveCommand::Left).await;
        assert_eq!(
            outcome,
            CommandOutcome::Forwarded(ActuatorReply {
                status: 200,
                body: "OK left".into()
            })
        );
        let batch = rig.buffer.drain();
        assert_eq!(batch.commands.len(), 1);
        assert_eq!(batch.commands[0].operator.as_deref(), Some("alice"));
        assert_eq!(batch.commands[0].source, CommandSource::Human);
    }

    #[tokio::test]
    async fn non_holder_never_reaches_the_rover() {
        let rig = rig(false);
        publish_distance(&rig.snapshot, 5.0);
        let outcome = rig.service.submit("mallory", MoveCommand::Forward).await;
        assert_eq!(outcome, CommandOutcome::NoControl);
        assert!(rig.rover.sent.lock().is_empty());
        assert_eq!(rig.buffer.metrics().total_commands, 0);
    }

    #[tokio::test]
    async fn forward_near_obstacle_is_blocked_with_reason() {
        let rig = rig(false);
        publish_distance(&rig.snapshot, 19.9);
        let CommandOutcome::Blocked(reason) = rig.service.submit("alice", MoveCommand::Forward).await
        else {
            panic!("expected a block");
        };
        assert!(reason.contains("19.9"), "{reason}");
        assert!(rig.rover.sent.lock().is_empty());
        assert_eq!(rig.buffer.metrics().total_commands, 0);
    }

    #[tokio::test]
    async fn reverse_near_obstacle_is_allowed() {
        let rig = rig(false);
        publish_distance(&rig.snapshot, 5.0);
        let outcome = rig.service.submit("alice", MoveCommand::Backward).await;
        assert!(matches!(outcome, CommandOutcome::Forwarded(_)));
    }

    #[tokio::test]
    async fn forward_allowed_before_first_snapshot() {
        let rig = rig(false);
        let outcome = rig.service.submit("alice", MoveCommand::Forward).await;
        assert!(matches!(outcome, CommandOutcome::Forwarded(_)));
    }

    #[tokio::test]
    async fn actuator_failure_is_reported_and_not_logged() {
        let rig = rig(true);
        let CommandOutcome::ActuatorFailed(msg) = rig.service.submit("alice", MoveCommand::Stop).await
        else {
            panic!("expected actuator failure");
        };
        assert!(msg.contains("connection refused"));
        assert_eq!(rig.buffer.metrics().total_commands, 0);
    }
}
