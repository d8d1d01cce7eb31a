//! [`OperatorArbiter`] – the single exclusive drive-control token.
//!
//! Exactly one operator (or nobody) holds the right to drive the rover.
//! [`OperatorArbiter::take`] always succeeds and overwrites the current
//! holder; [`OperatorArbiter::release`] only succeeds for the holder.  Every
//! command path must consult the arbiter before any other validation, and
//! never infer "who is driving" from anywhere else.

use parking_lot::Mutex;
use rover_types::RoverError;
use serde::Serialize;
use tracing::info;

/// Point-in-time view of the control token for one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlStatus {
    pub current_operator: Option<String>,
    pub has_control: bool,
}

/// Holds the name of the operator currently in control.
///
/// # Example
///
/// ```
/// use rover_kernel::operator_arbiter::OperatorArbiter;
///
/// let arbiter = OperatorArbiter::new();
/// arbiter.take("alice");
/// arbiter.take("bob");
///
/// assert!(arbiter.release("alice").is_err());
/// assert_eq!(arbiter.current().as_deref(), Some("bob"));
/// ```
#[derive(Default)]
pub struct OperatorArbiter {
    current: Mutex<Option<String>>,
}

impl OperatorArbiter {
    /// Create an arbiter with nobody in control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give control to `name`.  Last writer wins.
    pub fn take(&self, name: &str) {
        let previous = self.current.lock().replace(name.to_string());
        info!(operator = name, previous = ?previous, "operator took control");
    }

    /// Clear the token if `name` holds it.
    ///
    /// # Errors
    ///
    /// [`RoverError::NotYourControl`] when somebody else (or nobody) holds it;
    /// the token is left untouched.
    pub fn release(&self, name: &str) -> Result<(), RoverError> {
        let mut current = self.current.lock();
        if current.as_deref() == Some(name) {
            *current = None;
            info!(operator = name, "operator released control");
            Ok(())
        } else {
            Err(RoverError::NotYourControl)
        }
    }

    /// Report the current holder and whether it is `name`.
    pub fn status(&self, name: &str) -> ControlStatus {
        let current = self.current.lock().clone();
        let has_control = current.as_deref() == Some(name);
        ControlStatus {
            current_operator: current,
            has_control,
        }
    }

    /// Name of the operator in control, if any.
    pub fn current(&self) -> Option<String> {
        self.current.lock().clone()
    }

    /// Run `f` while holding the token lock, only if `name` is in control.
    ///
    /// Ownership cannot change between the check and the end of `f`, so a
    /// command never passes arbitration on a stale holder.
    pub fn while_holding<T>(
        &self,
        name: &str,
        f: impl FnOnce() -> Result<T, RoverError>,
    ) -> Result<T, RoverError> {
        let current = self.current.lock();
        if current.as_deref() != Some(name) {
            return Err(RoverError::NotYourControl);
        }
        f()
    }
}
