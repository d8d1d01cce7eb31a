//! `rover-types` – shared data model for the rover teleoperation backend.
//!
//! Every other crate speaks in these types: the sensor snapshot published by
//! the ingest loop, the safety-mode switch, the intervention events emitted
//! by the ASPR engine and the drive commands accepted from operators.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Distance substituted for an unknown ultrasonic reading ("assume safe").
pub const UNKNOWN_DISTANCE_CM: f64 = 999.0;

/// Milliseconds since the Unix epoch, used to stamp records at capture time.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

// ────────────────────────────────────────────────────────────────────────────
// Sensor snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Calibrated accelerometer reading in g.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accel {
    pub ax_g: f64,
    pub ay_g: f64,
    pub az_g: f64,
}

impl Default for Accel {
    /// A rover standing level: gravity entirely on the vertical axis.
    fn default() -> Self {
        Self {
            ax_g: 0.0,
            ay_g: 0.0,
            az_g: 1.0,
        }
    }
}

/// Calibrated gyroscope reading in degrees per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Gyro {
    pub gx_dps: f64,
    pub gy_dps: f64,
    pub gz_dps: f64,
}

/// One complete reading of the rover's sensors.
///
/// Published wholesale by the ingest loop; readers always receive a copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    /// Capture time reported by the rover, in ms since the epoch.
    pub timestamp_ms: i64,
    /// Ultrasonic range in cm, `None` when the sensor had no echo.
    pub distance_cm: Option<f64>,
    pub accel: Accel,
    pub gyro: Gyro,
}

impl SensorSnapshot {
    /// A snapshot with no distance reading and a level IMU.
    pub fn unknown(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            distance_cm: None,
            accel: Accel::default(),
            gyro: Gyro::default(),
        }
    }

    /// Distance used by the safety rules: [`UNKNOWN_DISTANCE_CM`] when absent.
    pub fn effective_distance_cm(&self) -> f64 {
        self.distance_cm.unwrap_or(UNKNOWN_DISTANCE_CM)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Safety mode
// ────────────────────────────────────────────────────────────────────────────

/// Runtime mode of the ASPR engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyMode {
    /// Rules are evaluated and explained but no stop is ever issued.
    Learning,
    /// Firing rules issue real emergency stops.
    #[default]
    Safe,
    /// Same engine behaviour as [`SafetyMode::Safe`].
    Autonomous,
}

impl SafetyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyMode::Learning => "learning",
            SafetyMode::Safe => "safe",
            SafetyMode::Autonomous => "autonomous",
        }
    }

    /// `true` when a firing rule must reach the actuator.
    pub fn issues_stops(&self) -> bool {
        !matches!(self, SafetyMode::Learning)
    }
}

impl fmt::Display for SafetyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyMode {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "learning" => Ok(SafetyMode::Learning),
            "safe" => Ok(SafetyMode::Safe),
            "autonomous" => Ok(SafetyMode::Autonomous),
            other => Err(RoverError::InvalidMode(other.to_string())),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Interventions
// ────────────────────────────────────────────────────────────────────────────

/// Which rule of the ASPR engine fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    TiltDanger,
    MlPrediction,
    HighApproachSpeed,
    TooClose,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::TiltDanger => "tilt_danger",
            TriggerKind::MlPrediction => "ml_prediction",
            TriggerKind::HighApproachSpeed => "high_approach_speed",
            TriggerKind::TooClose => "too_close",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine did about a firing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionAction {
    /// A stop was issued to the actuator.
    EmergencyStop,
    /// Learning mode: the would-be stop was only recorded.
    LogOnly,
}

/// The single outcome of an analysis cycle in which a rule fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionEvent {
    pub id: Uuid,
    pub timestamp_ms: i64,
    pub trigger: TriggerKind,
    /// Human-readable explanation shown in the cockpit.
    pub explanation: String,
    /// Classifier confidence in `[0, 1]`, only for [`TriggerKind::MlPrediction`].
    pub confidence: Option<f64>,
    pub action: InterventionAction,
}

impl InterventionEvent {
    pub fn new(
        trigger: TriggerKind,
        explanation: String,
        confidence: Option<f64>,
        action: InterventionAction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms: now_ms(),
            trigger,
            explanation,
            confidence,
            action,
        }
    }

    /// Short machine-readable reason stored in the command log.
    pub fn reason(&self) -> String {
        format!("{}: {}", self.trigger, self.explanation)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Drive commands
// ────────────────────────────────────────────────────────────────────────────

/// Motion commands understood by the rover firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCommand {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl MoveCommand {
    /// Value of the `move` query parameter sent to the actuator.
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveCommand::Forward => "forward",
            MoveCommand::Backward => "backward",
            MoveCommand::Left => "left",
            MoveCommand::Right => "right",
            MoveCommand::Stop => "stop",
        }
    }
}

impl fmt::Display for MoveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveCommand {
    type Err = RoverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(MoveCommand::Forward),
            "backward" => Ok(MoveCommand::Backward),
            "left" => Ok(MoveCommand::Left),
            "right" => Ok(MoveCommand::Right),
            "stop" => Ok(MoveCommand::Stop),
            other => Err(RoverError::InvalidCommand(other.to_string())),
        }
    }
}

/// Who issued a logged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    /// An operator holding the control token.
    Human,
    /// The automatic safety engine.
    Aspr,
}

impl CommandSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandSource::Human => "human",
            CommandSource::Aspr => "aspr",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type spanning transport failures, arbitration and gate rejections.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Transport error talking to {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("Not your control")]
    NotYourControl,

    #[error("Blocked by ASPR: {reason}")]
    Blocked { reason: String },

    #[error("Unknown move command: {0}")]
    InvalidCommand(String),

    #[error("Unknown safety mode: {0}")]
    InvalidMode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_distance_uses_sentinel() {
        let snap = SensorSnapshot::unknown(0);
        assert_eq!(snap.effective_distance_cm(), UNKNOWN_DISTANCE_CM);
        assert!((snap.accel.az_g - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn safety_mode_defaults_to_safe() {
        assert_eq!(SafetyMode::default(), SafetyMode::Safe);
    }

    #[test]
    fn safety_mode_parses_case_insensitively() {
        assert_eq!("Learning".parse::<SafetyMode>().unwrap(), SafetyMode::Learning);
        assert_eq!(" autonomous ".parse::<SafetyMode>().unwrap(), SafetyMode::Autonomous);
        assert!(matches!(
            "reckless".parse::<SafetyMode>(),
            Err(RoverError::InvalidMode(_))
        ));
    }

    #[test]
    fn only_learning_mode_suppresses_stops() {
        assert!(!SafetyMode::Learning.issues_stops());
        assert!(SafetyMode::Safe.issues_stops());
        assert!(SafetyMode::Autonomous.issues_stops());
    }

    #[test]
    fn move_command_rejects_unknown_values() {
        assert_eq!("left".parse::<MoveCommand>().unwrap(), MoveCommand::Left);
        assert!(matches!(
            "jump".parse::<MoveCommand>(),
            Err(RoverError::InvalidCommand(ref v)) if v == "jump"
        ));
    }

    #[test]
    fn trigger_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TriggerKind::HighApproachSpeed).unwrap();
        assert_eq!(json, "\"high_approach_speed\"");
    }

    #[test]
    fn intervention_reason_names_the_trigger() {
        let event = InterventionEvent::new(
            TriggerKind::TooClose,
            "obstacle at 12.0 cm".to_string(),
            None,
            InterventionAction::EmergencyStop,
        );
        assert_eq!(event.reason(), "too_close: obstacle at 12.0 cm");
    }

    #[test]
    fn rover_error_display() {
        let err = RoverError::Blocked {
            reason: "blocked_by_aspr_distance_12.0cm".to_string(),
        };
        assert!(err.to_string().contains("12.0cm"));
        assert_eq!(RoverError::NotYourControl.to_string(), "Not your control");
    }
}
