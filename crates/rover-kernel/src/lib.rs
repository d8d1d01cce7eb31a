//! `rover-kernel` – Safety & Arbitration
//!
//! Everything that decides whether the rover may move.  The kernel never
//! talks HTTP and never touches the database; it owns the rules.
//!
//! # Modules
//!
//! - [`operator_arbiter`] – [`OperatorArbiter`]: the single-owner control
//!   lock.  At most one named operator may drive at a time, and only the
//!   holder can release.
//! - [`state_verifier`] – [`StateVerifier`]: the rule engine that checks a
//!   human [`MoveCommand`][rover_types::MoveCommand] against the latest
//!   sensor snapshot ([`TiltMarginRule`], [`ProximityMarginRule`]).
//! - [`kernel_gate`] – [`KernelGate`]: the one interception point every
//!   human command passes through.  Ownership check and physical rules run
//!   under the arbiter lock so a concurrent take-over cannot interleave.
//! - [`approach`] – [`ApproachEstimator`]: closing speed from consecutive
//!   distance samples.
//! - [`classifier`] – [`Classifier`] and the JSON
//!   [`DecisionTreeClassifier`] used as the learned collision predictor.
//! - [`aspr`] – [`SafetyEngine`]: per-snapshot risk analysis and emergency
//!   stops.

pub mod approach;
pub mod aspr;
pub mod classifier;
pub mod kernel_gate;
pub mod operator_arbiter;
pub mod state_verifier;

pub use approach::ApproachEstimator;
pub use aspr::{EngineMetrics, SafetyEngine, SafetyStatus};
pub use classifier::{
    AbsentClassifier, Classifier, ClassifierError, DecisionTreeClassifier, FeatureVector,
    Prediction, load_classifier,
};
pub use kernel_gate::{CommandGate, GateDecision, KernelGate};
pub use operator_arbiter::{ControlStatus, OperatorArbiter};
pub use state_verifier::{ProximityMarginRule, Rule, StateVerifier, TiltMarginRule};
