//! [`KernelGate`] – single interception point for human drive commands.
//!
//! Before a [`MoveCommand`] from an operator reaches the actuator it must
//! pass through [`KernelGate::authorize`], which enforces two checks in
//! order:
//!
//! 1. **Arbitration** ([`OperatorArbiter`]): the operator must hold the
//!    control token.  Non-holders get [`RoverError::NotYourControl`] and the
//!    command is never evaluated further.
//!
//! 2. **Command safety** ([`CommandGate`]): the command is checked against the
//!    latest [`SensorSnapshot`].  A violation returns [`RoverError::Blocked`].
//!
//! Both checks run while the token lock is held, so ownership cannot change
//! between arbitration and the safety verdict.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rover_kernel::{CommandGate, KernelGate, OperatorArbiter};
//! use rover_types::{MoveCommand, RoverError, SensorSnapshot};
//!
//! let arbiter = Arc::new(OperatorArbiter::new());
//! arbiter.take("alice");
//! let gate = KernelGate::new(Arc::clone(&arbiter), CommandGate::default());
//!
//! let mut snap = SensorSnapshot::unknown(0);
//! snap.distance_cm = Some(80.0);
//! assert!(gate.authorize("alice", MoveCommand::Forward, &snap).is_ok());
//! assert_eq!(
//!     gate.authorize("bob", MoveCommand::Forward, &snap),
//!     Err(RoverError::NotYourControl)
//! );
//! ```

use std::sync::Arc;

use rover_types::{MoveCommand, RoverError, SensorSnapshot};
use serde::Serialize;
use tracing::debug;

use crate::operator_arbiter::OperatorArbiter;
use crate::state_verifier::StateVerifier;

/// Verdict of [`CommandGate::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub blocked: bool,
    pub reason: Option<String>,
    /// Name of the refusing rule.
    pub rule: Option<String>,
}

impl GateDecision {
    fn allowed() -> Self {
        Self {
            blocked: false,
            reason: None,
            rule: None,
        }
    }
}

/// Pure command-safety check against the latest snapshot.
pub struct CommandGate {
    verifier: StateVerifier,
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new(StateVerifier::with_default_rules())
    }
}

impl CommandGate {
    pub fn new(verifier: StateVerifier) -> Self {
        Self { verifier }
    }

    /// Decide whether `command` may be forwarded given `snapshot`.
    pub fn check(&self, command: MoveCommand, snapshot: &SensorSnapshot) -> GateDecision {
        match self.verifier.first_violation(command, snapshot) {
            None => GateDecision::allowed(),
            Some((rule, err)) => GateDecision {
                blocked: true,
                reason: Some(match err {
                    RoverError::Blocked { reason } => reason,
                    other => other.to_string(),
                }),
                rule: Some(rule.to_string()),
            },
        }
    }
}

/// Arbitration followed by the command gate, under one lock.
pub struct KernelGate {
    arbiter: Arc<OperatorArbiter>,
    gate: CommandGate,
}

impl KernelGate {
    pub fn new(arbiter: Arc<OperatorArbiter>, gate: CommandGate) -> Self {
        Self { arbiter, gate }
    }

    /// The arbiter shared with the control endpoints.
    pub fn arbiter(&self) -> &Arc<OperatorArbiter> {
        &self.arbiter
    }

    /// Authorize `operator` to send `command`.
    ///
    /// # Errors
    ///
    /// - [`RoverError::NotYourControl`] – `operator` does not hold the token.
    /// - [`RoverError::Blocked`] – the command gate refused the command.
    pub fn authorize(
        &self,
        operator: &str,
        command: MoveCommand,
        snapshot: &SensorSnapshot,
    ) -> Result<(), RoverError> {
        self.arbiter.while_holding(operator, || {
            let decision = self.gate.check(command, snapshot);
            if decision.blocked {
                let reason = decision.reason.unwrap_or_default();
                let rule = decision.rule.unwrap_or_default();
                debug!(operator, %command, %rule, %reason, "command blocked by gate");
                Err(RoverError::Blocked { reason })
            } else {
                Ok(())
            }
        })
    }
}
