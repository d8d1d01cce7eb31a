//! Wire format of the rover's `/sensor` endpoint.
//!
//! ```json
//! {
//!   "timestamp": 1718000000000,
//!   "ultrasonic": { "distance_cm": 42.5 },
//!   "imu": { "calibrated": { "ax_g": 0.01, "ay_g": 0.0, "az_g": 0.99,
//!                            "gx_dps": 0.1, "gy_dps": -0.2, "gz_dps": 3.0 } }
//! }
//! ```
//!
//! Every field may be absent.  [`SensorReport::into_snapshot`] fills the gaps:
//! missing timestamp → capture time, missing distance → unknown, missing
//! `az_g` → 1.0 g, any other missing axis → 0.0.

use rover_types::{Accel, Gyro, SensorSnapshot};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorReport {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub ultrasonic: Option<UltrasonicReport>,
    #[serde(default)]
    pub imu: Option<ImuReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UltrasonicReport {
    #[serde(default)]
    pub distance_cm: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImuReport {
    #[serde(default)]
    pub calibrated: Option<CalibratedImu>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalibratedImu {
    pub ax_g: Option<f64>,
    pub ay_g: Option<f64>,
    pub az_g: Option<f64>,
    pub gx_dps: Option<f64>,
    pub gy_dps: Option<f64>,
    pub gz_dps: Option<f64>,
}

impl SensorReport {
    /// Build a snapshot, stamping it with `captured_at_ms` when the rover did
    /// not send a timestamp.
    pub fn into_snapshot(self, captured_at_ms: i64) -> SensorSnapshot {
        let distance_cm = self.ultrasonic.and_then(|u| u.distance_cm);
        let imu = self.imu.and_then(|i| i.calibrated).unwrap_or_default();
        let level = Accel::default();
        SensorSnapshot {
            timestamp_ms: self.timestamp.unwrap_or(captured_at_ms),
            distance_cm,
            accel: Accel {
                ax_g: imu.ax_g.unwrap_or(level.ax_g),
                ay_g: imu.ay_g.unwrap_or(level.ay_g),
                az_g: imu.az_g.unwrap_or(level.az_g),
            },
            gyro: Gyro {
                gx_dps: imu.gx_dps.unwrap_or(0.0),
                gy_dps: imu.gy_dps.unwrap_or(0.0),
                gz_dps: imu.gz_dps.unwrap_or(0.0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SensorSnapshot {
        serde_json::from_str::<SensorReport>(json)
            .unwrap()
            .into_snapshot(7)
    }

    #[test]
    fn full_report_maps_every_field() {
        let snap = parse(
            r#"{"timestamp": 1000,
                "ultrasonic": {"distance_cm": 42.5},
                "imu": {"raw": {"ax": 12}, "calibrated": {"ax_g": 0.1, "ay_g": -0.1, "az_g": 0.9,
                        "gx_dps": 1.0, "gy_dps": 2.0, "gz_dps": 3.0}}}"#,
        );
        assert_eq!(snap.timestamp_ms, 1000);
        assert_eq!(snap.distance_cm, Some(42.5));
        assert!((snap.accel.az_g - 0.9).abs() < 1e-12);
        assert!((snap.gyro.gz_dps - 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_report_defaults_to_unknown_level_snapshot() {
        let snap = parse("{}");
        assert_eq!(snap, SensorSnapshot::unknown(7));
    }

    #[test]
    fn null_distance_is_unknown() {
        let snap = parse(r#"{"ultrasonic": {"distance_cm": null}}"#);
        assert_eq!(snap.distance_cm, None);
    }

    #[test]
    fn missing_az_defaults_to_level() {
        let snap = parse(r#"{"imu": {"calibrated": {"gz_dps": -12.5}}}"#);
        assert!((snap.accel.az_g - 1.0).abs() < 1e-12);
        assert!((snap.gyro.gz_dps + 12.5).abs() < 1e-12);
    }
}
