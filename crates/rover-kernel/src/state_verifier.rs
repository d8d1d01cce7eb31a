//! [`StateVerifier`] – motion-initiation interlock rules.
//!
//! Before a human drive command is forwarded, it is passed through
//! [`StateVerifier::verify`] together with the latest [`SensorSnapshot`].
//! Rules are evaluated in order; the first violation returns
//! [`RoverError::Blocked`] and the command is **not** forwarded.
//!
//! The built-in rules only gate [`MoveCommand::Forward`] and use margins
//! that are stricter than the ASPR engine's own emergency thresholds, so
//! risky motion is refused before the engine would have to abort it:
//! - [`TiltMarginRule`] – refuses forward motion when `az_g` is low.
//! - [`ProximityMarginRule`] – refuses forward motion near an obstacle.

use rover_types::{MoveCommand, RoverError, SensorSnapshot};

/// Forward motion is refused below this vertical acceleration (g).
pub const TILT_MARGIN_AZ_G: f64 = 0.85;

/// Forward motion is refused below this distance (cm).
pub const PROXIMITY_MARGIN_CM: f64 = 20.0;

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single interlock that a command must satisfy given the current sensors.
pub trait Rule: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// `Ok(())` when `command` may proceed, [`RoverError::Blocked`] otherwise.
    /// The reason must embed the offending measurement.
    fn check(&self, command: MoveCommand, snapshot: &SensorSnapshot) -> Result<(), RoverError>;
}

// ────────────────────────────────────────────────────────────────────────────
// StateVerifier
// ────────────────────────────────────────────────────────────────────────────

/// Ordered collection of [`Rule`]s.  Pure: no rule has side effects.
///
/// # Example
///
/// ```
/// use rover_kernel::state_verifier::StateVerifier;
/// use rover_types::{MoveCommand, SensorSnapshot};
///
/// let verifier = StateVerifier::with_default_rules();
/// let mut snap = SensorSnapshot::unknown(0);
/// snap.distance_cm = Some(10.0);
///
/// assert!(verifier.verify(MoveCommand::Forward, &snap).is_err());
/// assert!(verifier.verify(MoveCommand::Backward, &snap).is_ok());
/// ```
#[derive(Default)]
pub struct StateVerifier {
    rules: Vec<Box<dyn Rule>>,
}

impl StateVerifier {
    /// Create an empty verifier with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tilt rule followed by the proximity rule, with default margins.
    pub fn with_default_rules() -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(TiltMarginRule {
            min_az_g: TILT_MARGIN_AZ_G,
        }));
        verifier.add_rule(Box::new(ProximityMarginRule {
            min_distance_cm: PROXIMITY_MARGIN_CM,
        }));
        verifier
    }

    /// Register a new [`Rule`].  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Validate `command` against every registered rule.
    pub fn verify(&self, command: MoveCommand, snapshot: &SensorSnapshot) -> Result<(), RoverError> {
        match self.first_violation(command, snapshot) {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }

    /// Name and error of the first rule that refuses `command`, if any.
    pub fn first_violation(
        &self,
        command: MoveCommand,
        snapshot: &SensorSnapshot,
    ) -> Option<(&str, RoverError)> {
        self.rules.iter().find_map(|rule| {
            rule.check(command, snapshot)
                .err()
                .map(|err| (rule.name(), err))
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Refuses [`MoveCommand::Forward`] while the rover is tilted.
pub struct TiltMarginRule {
    pub min_az_g: f64,
}

impl Rule for TiltMarginRule {
    fn name(&self) -> &str {
        "tilt_margin"
    }

    fn check(&self, command: MoveCommand, snapshot: &SensorSnapshot) -> Result<(), RoverError> {
        let az = snapshot.accel.az_g;
        if command == MoveCommand::Forward && az < self.min_az_g {
            return Err(RoverError::Blocked {
                reason: format!("blocked_by_aspr_tilt_az_{az:.2}g"),
            });
        }
        Ok(())
    }
}

/// Refuses [`MoveCommand::Forward`] when an obstacle is inside the margin.
/// An unknown distance counts as far away.
pub struct ProximityMarginRule {
    pub min_distance_cm: f64,
}

impl Rule for ProximityMarginRule {
    fn name(&self) -> &str {
        "proximity_margin"
    }

    fn check(&self, command: MoveCommand, snapshot: &SensorSnapshot) -> Result<(), RoverError> {
        let distance = snapshot.effective_distance_cm();
        if command == MoveCommand::Forward && distance < self.min_distance_cm {
            return Err(RoverError::Blocked {
                reason: format!("blocked_by_aspr_distance_{distance:.1}cm"),
            });
        }
        Ok(())
    }
}
