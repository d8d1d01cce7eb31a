//! [`SafetyEngine`] – the automatic risk-prevention system (ASPR).
//!
//! Every received [`SensorSnapshot`] is analysed once by
//! [`SafetyEngine::evaluate`].  The approach speed is derived first, then the
//! rules run in strict priority order and the first one to fire wins:
//!
//! | # | Rule | Fires when | Trigger |
//! |---|------|-----------|---------|
//! | 1 | Tilt | `az_g < 0.75` | `tilt_danger` |
//! | 2 | Learned model | classifier predicts collision with confidence ≥ 0.7 | `ml_prediction` |
//! | 3 | Approach speed | `distance < 15 + max(0, 0.4·v)` and `v > 7` cm/s | `high_approach_speed` |
//! | 4 | Proximity | `distance < 15` | `too_close` |
//!
//! When nothing fires and the obstacle is more than 50 cm away the active
//! flag is cleared; the gap between 15 and 50 cm keeps the flag from
//! chattering at the trigger boundary.
//!
//! In [`SafetyMode::Learning`] a firing rule is explained and returned as
//! [`InterventionAction::LogOnly`]; nothing is counted and no stop is sent.
//! In the other modes the engine counts the intervention, sends
//! [`MoveCommand::Stop`] to the actuator and returns
//! [`InterventionAction::EmergencyStop`].  A failed stop is logged, never
//! propagated.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rover_hal::Actuator;
use rover_types::{
    InterventionAction, InterventionEvent, MoveCommand, SafetyMode, SensorSnapshot, TriggerKind,
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::approach::ApproachEstimator;
use crate::classifier::{Classifier, FeatureVector};

/// Vertical acceleration (g) below which the rover is about to tip over.
pub const TILT_DANGER_AZ_G: f64 = 0.75;
/// Minimum classifier confidence for the learned-model rule.
pub const ML_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Static danger distance (cm); also the base of the dynamic threshold.
pub const DANGER_DISTANCE_CM: f64 = 15.0;
/// Extra danger distance per cm/s of approach speed (s).
pub const APPROACH_DISTANCE_GAIN_S: f64 = 0.4;
/// Approach speeds at or below this (cm/s) never trigger the speed rule.
pub const MIN_APPROACH_SPEED_CM_S: f64 = 7.0;
/// The active flag re-arms only beyond this distance (cm).
pub const CLEAR_DISTANCE_CM: f64 = 50.0;
/// Default bound on the emergency-stop request.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

const NO_INTERVENTION_EXPLANATION: &str = "No intervention so far";

/// Metrics exposed to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub active: bool,
    pub interventions: u64,
    pub mode: SafetyMode,
    pub model_loaded: bool,
}

/// Explanation snapshot for the cockpit.  All fields come from one critical
/// section, so `interventions` and `explanation` always agree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyStatus {
    pub explanation: String,
    pub trigger: Option<TriggerKind>,
    pub active: bool,
    pub interventions: u64,
    pub mode: SafetyMode,
    pub model_loaded: bool,
}

/// A rule that fired during one analysis cycle.
#[derive(Debug, Clone, PartialEq)]
struct Finding {
    trigger: TriggerKind,
    explanation: String,
    confidence: Option<f64>,
}

struct EngineState {
    mode: SafetyMode,
    active: bool,
    interventions: u64,
    explanation: String,
    trigger: Option<TriggerKind>,
    approach: ApproachEstimator,
}

/// The ASPR engine.  Construct once at startup and share behind an [`Arc`].
pub struct SafetyEngine {
    state: Mutex<EngineState>,
    classifier: Arc<dyn Classifier>,
    actuator: Arc<dyn Actuator>,
    stop_timeout: Duration,
}

impl SafetyEngine {
    pub fn new(
        mode: SafetyMode,
        classifier: Arc<dyn Classifier>,
        actuator: Arc<dyn Actuator>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState {
                mode,
                active: false,
                interventions: 0,
                explanation: NO_INTERVENTION_EXPLANATION.to_string(),
                trigger: None,
                approach: ApproachEstimator::new(),
            }),
            classifier,
            actuator,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Override the bound on the emergency-stop request (builder-style).
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn mode(&self) -> SafetyMode {
        self.state.lock().mode
    }

    pub fn set_mode(&self, mode: SafetyMode) {
        let previous = std::mem::replace(&mut self.state.lock().mode, mode);
        info!(%previous, %mode, "ASPR mode changed");
    }

    pub fn metrics(&self) -> EngineMetrics {
        let state = self.state.lock();
        EngineMetrics {
            active: state.active,
            interventions: state.interventions,
            mode: state.mode,
            model_loaded: self.classifier.is_loaded(),
        }
    }

    pub fn status(&self) -> SafetyStatus {
        let state = self.state.lock();
        SafetyStatus {
            explanation: state.explanation.clone(),
            trigger: state.trigger,
            active: state.active,
            interventions: state.interventions,
            mode: state.mode,
            model_loaded: self.classifier.is_loaded(),
        }
    }

    /// Analyse `snapshot` against the wall clock.
    pub async fn evaluate(&self, snapshot: &SensorSnapshot) -> Option<InterventionEvent> {
        let now_s = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.evaluate_at(snapshot, now_s).await
    }

    /// Analyse `snapshot` as if received at `now_s` seconds.
    #[instrument(skip(self, snapshot), fields(distance_cm = ?snapshot.distance_cm, az_g = snapshot.accel.az_g))]
    pub async fn evaluate_at(
        &self,
        snapshot: &SensorSnapshot,
        now_s: f64,
    ) -> Option<InterventionEvent> {
        let event = self.analyse(snapshot, now_s)?;

        if event.action == InterventionAction::EmergencyStop {
            self.send_stop().await;
        }
        Some(event)
    }

    /// One analysis cycle under the state lock.
    fn analyse(&self, snapshot: &SensorSnapshot, now_s: f64) -> Option<InterventionEvent> {
        let mut state = self.state.lock();

        // Updated exactly once, before any rule, so all rules see one speed.
        let approach_speed = state.approach.update(snapshot.distance_cm, now_s);
        let distance = snapshot.effective_distance_cm();

        let Some(finding) = self.first_firing_rule(snapshot, distance, approach_speed) else {
            if distance > CLEAR_DISTANCE_CM {
                state.active = false;
            }
            return None;
        };

        state.explanation = finding.explanation.clone();
        state.trigger = Some(finding.trigger);

        let action = if state.mode.issues_stops() {
            state.active = true;
            state.interventions += 1;
            warn!(
                trigger = %finding.trigger,
                explanation = %finding.explanation,
                interventions = state.interventions,
                "ASPR emergency stop"
            );
            InterventionAction::EmergencyStop
        } else {
            info!(
                trigger = %finding.trigger,
                explanation = %finding.explanation,
                "ASPR learning mode: would stop"
            );
            InterventionAction::LogOnly
        };

        Some(InterventionEvent::new(
            finding.trigger,
            finding.explanation,
            finding.confidence,
            action,
        ))
    }

    fn first_firing_rule(
        &self,
        snapshot: &SensorSnapshot,
        distance: f64,
        approach_speed: f64,
    ) -> Option<Finding> {
        let az = snapshot.accel.az_g;
        if az < TILT_DANGER_AZ_G {
            return Some(Finding {
                trigger: TriggerKind::TiltDanger,
                explanation: format!(
                    "Tilt danger: vertical acceleration {az:.2} g is below {TILT_DANGER_AZ_G:.2} g"
                ),
                confidence: None,
            });
        }

        let features: FeatureVector = [distance, approach_speed, az, snapshot.gyro.gz_dps];
        match self.classifier.predict(&features) {
            Ok(p) if p.collision && p.confidence >= ML_CONFIDENCE_THRESHOLD => {
                return Some(Finding {
                    trigger: TriggerKind::MlPrediction,
                    explanation: format!(
                        "Model predicts a collision ({:.0}% confidence) at {distance:.1} cm, closing at {approach_speed:.1} cm/s",
                        p.confidence * 100.0
                    ),
                    confidence: Some(p.confidence),
                });
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "classifier inference failed; skipping model rule"),
        }

        let dynamic_threshold =
            DANGER_DISTANCE_CM + (approach_speed * APPROACH_DISTANCE_GAIN_S).max(0.0);
        if distance < dynamic_threshold && approach_speed > MIN_APPROACH_SPEED_CM_S {
            return Some(Finding {
                trigger: TriggerKind::HighApproachSpeed,
                explanation: format!(
                    "Closing at {approach_speed:.1} cm/s with obstacle at {distance:.1} cm, inside dynamic threshold {dynamic_threshold:.1} cm"
                ),
                confidence: None,
            });
        }

        if distance < DANGER_DISTANCE_CM {
            return Some(Finding {
                trigger: TriggerKind::TooClose,
                explanation: format!(
                    "Obstacle at {distance:.1} cm is closer than {DANGER_DISTANCE_CM:.0} cm"
                ),
                confidence: None,
            });
        }

        None
    }

    async fn send_stop(&self) {
        match tokio::time::timeout(self.stop_timeout, self.actuator.send(MoveCommand::Stop)).await
        {
            Ok(Ok(reply)) => info!(status = reply.status, "emergency stop delivered"),
            Ok(Err(e)) => error!(error = %e, "failed to send emergency stop"),
            Err(_) => error!(timeout = ?self.stop_timeout, "emergency stop timed out"),
        }
    }
}
