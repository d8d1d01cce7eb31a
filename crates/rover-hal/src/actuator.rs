//! Traits for the two directions of the rover link.
//!
//! The rest of the backend only ever talks to [`SensorSource`] and
//! [`Actuator`], so the HTTP link can be swapped for a simulator or a test
//! double without touching the safety logic.

use async_trait::async_trait;
use rover_types::{MoveCommand, RoverError, SensorSnapshot};

/// Status and body returned by the rover firmware for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorReply {
    pub status: u16,
    pub body: String,
}

/// Drives the rover's motors.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Send `command` and return the firmware's reply unchanged.
    ///
    /// # Errors
    ///
    /// [`RoverError::Actuator`] when the rover could not be reached in time.
    async fn send(&self, command: MoveCommand) -> Result<ActuatorReply, RoverError>;
}

/// Produces sensor snapshots on demand.
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Fetch the rover's current sensor state.
    ///
    /// # Errors
    ///
    /// [`RoverError::Transport`] when the rover is unreachable, answers with
    /// a non-success status, or sends an undecodable body.
    async fn fetch(&self) -> Result<SensorSnapshot, RoverError>;
}
