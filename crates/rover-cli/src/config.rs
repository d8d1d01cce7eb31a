//! Daemon configuration – reads `~/.rover/config.toml` (or `$ROVER_CONFIG`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rover_hal::LinkConfig;
use rover_types::SafetyMode;
use serde::{Deserialize, Serialize};

/// Everything `roverd` needs to start.  Every field has a default, so an
/// empty or missing file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    /// Rover sensor endpoint (JSON report).
    pub sensor_url: String,
    /// Rover motor endpoint (`?move=`).
    pub command_url: String,
    /// Port of the cockpit API.
    pub listen_port: u16,
    pub poll_interval_ms: u64,
    pub flush_interval_ms: u64,
    pub fetch_timeout_ms: u64,
    pub command_timeout_ms: u64,
    /// Bound on the emergency-stop request issued by the safety engine.
    pub stop_timeout_ms: u64,
    pub database_path: PathBuf,
    /// Decision-tree artifact.  Absent → rule-only safety engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    pub safety_mode: SafetyMode,
    /// Records kept per persistence queue between flushes.
    pub buffer_capacity: usize,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            sensor_url: "http://127.0.0.1:5000/sensor".to_string(),
            command_url: "http://127.0.0.1:5000/cmd".to_string(),
            listen_port: 8080,
            poll_interval_ms: 500,
            flush_interval_ms: 2000,
            fetch_timeout_ms: 2000,
            command_timeout_ms: 2000,
            stop_timeout_ms: 1000,
            database_path: PathBuf::from("rover.db"),
            model_path: None,
            safety_mode: SafetyMode::Safe,
            buffer_capacity: 100,
        }
    }
}

impl RoverConfig {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            sensor_url: self.sensor_url.clone(),
            command_url: self.command_url.clone(),
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// `$ROVER_CONFIG` if set, else `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(explicit) = std::env::var("ROVER_CONFIG") {
        return PathBuf::from(explicit);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load from [`config_path`] and apply environment overrides.
pub fn load() -> Result<RoverConfig, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<RoverConfig, String> {
    let mut cfg = read_file(path)?;
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// File contents only, no environment.  A missing file yields the
/// defaults; a malformed one is an error.
pub(crate) fn read_file(path: &Path) -> Result<RoverConfig, String> {
    if !path.exists() {
        return Ok(RoverConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw).map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_SENSOR_URL` | `sensor_url` |
/// | `ROVER_COMMAND_URL` | `command_url` |
/// | `ROVER_LISTEN_PORT` | `listen_port` |
/// | `ROVER_DATABASE_PATH` | `database_path` |
/// | `ROVER_MODEL_PATH` | `model_path` |
/// | `ROVER_SAFETY_MODE` | `safety_mode` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut RoverConfig) {
    if let Ok(v) = std::env::var("ROVER_SENSOR_URL") {
        cfg.sensor_url = v;
    }
    if let Ok(v) = std::env::var("ROVER_COMMAND_URL") {
        cfg.command_url = v;
    }
    if let Ok(v) = std::env::var("ROVER_LISTEN_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.listen_port = port;
    }
    if let Ok(v) = std::env::var("ROVER_DATABASE_PATH") {
        cfg.database_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("ROVER_MODEL_PATH") {
        cfg.model_path = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("ROVER_SAFETY_MODE")
        && let Ok(mode) = v.parse::<SafetyMode>()
    {
        cfg.safety_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_local_rover() {
        let cfg = RoverConfig::default();
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.flush_interval(), Duration::from_secs(2));
        assert_eq!(cfg.stop_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.safety_mode, SafetyMode::Safe);
        assert_eq!(cfg.buffer_capacity, 100);
        assert!(cfg.model_path.is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "sensor_url = \"http://10.0.0.7:5000/sensor\"\nsafety_mode = \"learning\"\nmodel_path = \"aspr.json\"\n",
        )
        .expect("write");

        let cfg = read_file(&path).expect("load ok");
        assert_eq!(cfg.sensor_url, "http://10.0.0.7:5000/sensor");
        assert_eq!(cfg.safety_mode, SafetyMode::Learning);
        assert_eq!(cfg.model_path, Some(PathBuf::from("aspr.json")));
        assert_eq!(cfg.command_url, "http://127.0.0.1:5000/cmd");
        assert_eq!(cfg.flush_interval_ms, 2000);
    }

    #[test]
    fn roundtrip_through_toml() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        let mut cfg = RoverConfig::default();
        cfg.listen_port = 9000;
        cfg.safety_mode = SafetyMode::Autonomous;
        std::fs::write(&path, toml::to_string_pretty(&cfg).expect("serialize")).expect("write");

        let loaded = read_file(&path).expect("load ok");
        assert_eq!(loaded.listen_port, 9000);
        assert_eq!(loaded.safety_mode, SafetyMode::Autonomous);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen_port = \"eighty\"").expect("write");
        assert!(read_file(&path).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = read_file(&dir.path().join("absent.toml")).expect("no error");
        assert_eq!(cfg.database_path, PathBuf::from("rover.db"));
    }

    #[test]
    fn config_path_points_to_rover_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".rover"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn link_config_carries_timeouts() {
        let mut cfg = RoverConfig::default();
        cfg.fetch_timeout_ms = 750;
        let link = cfg.link_config();
        assert_eq!(link.fetch_timeout, Duration::from_millis(750));
        assert_eq!(link.command_timeout, Duration::from_secs(2));
        assert_eq!(link.sensor_url, cfg.sensor_url);
    }

    #[test]
    fn apply_env_overrides_changes_sensor_url() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROVER_SENSOR_URL", "http://rover.local/sensor") };
        let mut cfg = RoverConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.sensor_url, "http://rover.local/sensor");
        unsafe { std::env::remove_var("ROVER_SENSOR_URL") };
    }

    #[test]
    fn apply_env_overrides_changes_listen_port() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROVER_LISTEN_PORT", "8181") };
        let mut cfg = RoverConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.listen_port, 8181);
        unsafe { std::env::remove_var("ROVER_LISTEN_PORT") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_mode() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROVER_SAFETY_MODE", "reckless") };
        let mut cfg = RoverConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.safety_mode, SafetyMode::Safe);
        unsafe { std::env::remove_var("ROVER_SAFETY_MODE") };
    }

    #[test]
    fn apply_env_overrides_sets_model_path() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("ROVER_MODEL_PATH", "/opt/rover/aspr.json") };
        let mut cfg = RoverConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.model_path, Some(PathBuf::from("/opt/rover/aspr.json")));
        unsafe { std::env::remove_var("ROVER_MODEL_PATH") };
    }
}
