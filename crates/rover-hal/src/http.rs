//! [`HttpRoverLink`] – the rover firmware's HTTP API.
//!
//! * `GET {sensor_url}` → JSON [`SensorReport`].
//! * `GET {command_url}?move=<forward|backward|left|right|stop>` → plain text.
//!
//! Every request carries its own timeout so a dead link can never stall the
//! ingest loop or a command handler.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rover_types::{MoveCommand, RoverError, SensorSnapshot, now_ms};
use tracing::{debug, instrument};

use crate::actuator::{Actuator, ActuatorReply, SensorSource};
use crate::report::SensorReport;

/// Endpoints and timeouts of the rover link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub sensor_url: String,
    pub command_url: String,
    pub fetch_timeout: Duration,
    pub command_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            sensor_url: "http://127.0.0.1:5000/sensor".to_string(),
            command_url: "http://127.0.0.1:5000/cmd".to_string(),
            fetch_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// Async HTTP client for the rover.  Construct once and share.
pub struct HttpRoverLink {
    config: LinkConfig,
    client: Client,
}

impl HttpRoverLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn transport_error(&self, endpoint: &str, err: impl std::fmt::Display) -> RoverError {
        RoverError::Transport {
            endpoint: endpoint.to_string(),
            details: err.to_string(),
        }
    }
}

#[async_trait]
impl SensorSource for HttpRoverLink {
    #[instrument(skip(self), fields(url = %self.config.sensor_url))]
    async fn fetch(&self) -> Result<SensorSnapshot, RoverError> {
        let url = &self.config.sensor_url;
        let response = self
            .client
            .get(url)
            .timeout(self.config.fetch_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?
            .error_for_status()
            .map_err(|e| self.transport_error(url, e))?;
        let report: SensorReport = response
            .json()
            .await
            .map_err(|e| self.transport_error(url, e))?;
        let snapshot = report.into_snapshot(now_ms());
        debug!(distance_cm = ?snapshot.distance_cm, az_g = snapshot.accel.az_g, "sensor fetched");
        Ok(snapshot)
    }
}

#[async_trait]
impl Actuator for HttpRoverLink {
    #[instrument(skip(self), fields(url = %self.config.command_url))]
    async fn send(&self, command: MoveCommand) -> Result<ActuatorReply, RoverError> {
        let response = self
            .client
            .get(&self.config.command_url)
            .query(&[("move", command.as_str())])
            .timeout(self.config.command_timeout)
            .send()
            .await
            .map_err(|e| RoverError::Actuator(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RoverError::Actuator(e.to_string()))?;
        debug!(status, "actuator replied");
        Ok(ActuatorReply { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_link() -> HttpRoverLink {
        // Port 1 on loopback refuses connections immediately.
        HttpRoverLink::new(LinkConfig {
            sensor_url: "http://127.0.0.1:1/sensor".into(),
            command_url: "http://127.0.0.1:1/cmd".into(),
            fetch_timeout: Duration::from_millis(500),
            command_timeout: Duration::from_millis(500),
        })
    }

    #[test]
    fn default_config_points_at_local_rover() {
        let cfg = LinkConfig::default();
        assert!(cfg.sensor_url.ends_with("/sensor"));
        assert!(cfg.command_url.ends_with("/cmd"));
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unreachable_sensor_is_a_transport_error() {
        let link = unreachable_link();
        let err = link.fetch().await.unwrap_err();
        assert!(matches!(err, RoverError::Transport { ref endpoint, .. } if endpoint.contains("/sensor")));
    }

    #[tokio::test]
    async fn unreachable_actuator_is_an_actuator_error() {
        let link = unreachable_link();
        let err = link.send(MoveCommand::Stop).await.unwrap_err();
        assert!(matches!(err, RoverError::Actuator(_)));
    }
}
