//! Closing-speed estimation from consecutive ultrasonic samples.

/// Samples closer together than this (seconds) give no speed signal.
pub const MIN_SAMPLE_INTERVAL_S: f64 = 0.05;

/// Derives the approach speed towards the obstacle in front of the rover.
///
/// One estimator exists per vehicle and lives inside the safety engine; a
/// fresh estimator has no history and always reads zero on its first sample.
///
/// # Example
///
/// ```
/// use rover_kernel::approach::ApproachEstimator;
///
/// let mut est = ApproachEstimator::new();
/// assert_eq!(est.update(Some(100.0), 10.0), 0.0);
/// assert!((est.update(Some(40.0), 10.5) - 120.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ApproachEstimator {
    last_distance: Option<f64>,
    last_timestamp: Option<f64>,
}

impl ApproachEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a distance sample taken at `now_s` (seconds) and return the
    /// signed approach speed in cm/s: positive when closing, negative when
    /// retreating.
    ///
    /// Returns `0.0` when either sample is unknown or the samples are less
    /// than [`MIN_SAMPLE_INTERVAL_S`] apart.  The stored sample is replaced
    /// in every case.
    pub fn update(&mut self, distance_cm: Option<f64>, now_s: f64) -> f64 {
        let speed = match (self.last_distance, distance_cm, self.last_timestamp) {
            (Some(previous), Some(current), Some(then)) => {
                let dt = now_s - then;
                if dt >= MIN_SAMPLE_INTERVAL_S {
                    (previous - current) / dt
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        self.last_distance = distance_cm;
        self.last_timestamp = Some(now_s);
        speed
    }
}
