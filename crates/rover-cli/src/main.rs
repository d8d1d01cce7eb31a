//! `roverd` – rover teleoperation daemon
//!
//! 1. Loads `~/.rover/config.toml` (or `$ROVER_CONFIG`) plus `ROVER_*`
//!    overrides.
//! 2. Builds the rover link, the safety engine, the flight recorder and the
//!    command path.
//! 3. Runs the ingest loop, the flush job and the cockpit API until
//!    **Ctrl-C** (or SIGTERM), then flushes once more and exits.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use parking_lot::Mutex;
use tracing::{error, info, warn};

use rover_cockpit::{AppState, CockpitServer};
use rover_hal::HttpRoverLink;
use rover_kernel::{CommandGate, KernelGate, OperatorArbiter, SafetyEngine, load_classifier};
use rover_memory::{PersistenceBuffer, SqliteStore};
use rover_runtime::{
    CommandService, FlushJob, IngestLoop, RunningJob, SnapshotCell, StopSignal, init_tracing,
};

use crate::config::RoverConfig;

fn main() -> ExitCode {
    // Tracing comes up before the Tokio runtime; the OTLP exporter is
    // synchronous for that reason.
    let _guard = init_tracing("roverd");

    print_banner();

    let cfg = match config::load() {
        Ok(cfg) => {
            println!(
                "  Config: {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = RoverConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    print_summary(&cfg);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cfg)) {
        Ok(()) => {
            println!("{}", "  ✓ roverd stopped cleanly.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "roverd failed");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the background jobs and the cockpit share.
struct Components {
    link: Arc<HttpRoverLink>,
    engine: Arc<SafetyEngine>,
    buffer: Arc<PersistenceBuffer>,
    snapshot: Arc<SnapshotCell>,
    arbiter: Arc<OperatorArbiter>,
    commands: Arc<CommandService>,
}

impl Components {
    fn assemble(cfg: &RoverConfig) -> Self {
        let link = Arc::new(HttpRoverLink::new(cfg.link_config()));
        let classifier = load_classifier(cfg.model_path.as_deref());
        let engine = Arc::new(
            SafetyEngine::new(cfg.safety_mode, classifier, link.clone())
                .with_stop_timeout(cfg.stop_timeout()),
        );
        let buffer = Arc::new(PersistenceBuffer::new(cfg.buffer_capacity));
        let snapshot = Arc::new(SnapshotCell::new());
        let arbiter = Arc::new(OperatorArbiter::new());
        let commands = Arc::new(CommandService::new(
            KernelGate::new(arbiter.clone(), CommandGate::default()),
            snapshot.clone(),
            link.clone(),
            buffer.clone(),
        ));
        Self {
            link,
            engine,
            buffer,
            snapshot,
            arbiter,
            commands,
        }
    }

    fn app_state(&self) -> AppState {
        AppState {
            commands: self.commands.clone(),
            arbiter: self.arbiter.clone(),
            engine: self.engine.clone(),
            buffer: self.buffer.clone(),
            snapshot: self.snapshot.clone(),
        }
    }
}

async fn run(cfg: RoverConfig) -> Result<(), String> {
    let stop = StopSignal::new();
    install_ctrlc(stop.clone());

    let store = SqliteStore::open(&cfg.database_path).map_err(|e| {
        format!(
            "cannot open database at {}: {}",
            cfg.database_path.display(),
            e
        )
    })?;
    let parts = Components::assemble(&cfg);

    let ingest = RunningJob::spawn(
        IngestLoop::new(
            parts.link.clone(),
            parts.snapshot.clone(),
            parts.buffer.clone(),
            parts.engine.clone(),
        ),
        cfg.poll_interval(),
    );
    let flush = RunningJob::spawn(
        FlushJob::new(parts.buffer.clone(), Arc::new(Mutex::new(store))),
        cfg.flush_interval(),
    );

    info!(
        port = cfg.listen_port,
        mode = %cfg.safety_mode,
        model_loaded = parts.engine.metrics().model_loaded,
        "roverd running"
    );

    // Returns after graceful shutdown has drained in-flight requests, or on
    // bind failure.
    let served = CockpitServer::new(parts.app_state())
        .with_port(cfg.listen_port)
        .run(stop.clone())
        .await;

    // Everything that stages records stops before the final flush.
    ingest.stop().await;
    flush.stop().await;

    served.map_err(|e| e.to_string())
}

fn install_ctrlc(stop: StopSignal) {
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Shutdown requested – stopping jobs and flushing buffers …"
                .yellow()
                .bold()
        );
        stop.raise();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; shutdown will not flush buffers");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   _______  _____ _____/ /"#.bold().cyan());
    println!("{}", r#"  / __/ _ \ |/ / -_) __/ _  / "#.bold().cyan());
    println!("{}", r#" /_/  \___/___/\__/_/  \_,_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "roverd".bold(),
        env!("CARGO_PKG_VERSION").dimmed()
    );
    println!("  Safety-gated rover teleoperation");
    println!();
}

fn print_summary(cfg: &RoverConfig) {
    println!("  Sensor:   {}", cfg.sensor_url.dimmed());
    println!("  Commands: {}", cfg.command_url.dimmed());
    println!("  Database: {}", cfg.database_path.display().to_string().dimmed());
    let model = cfg
        .model_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "none (rule-only)".to_string());
    println!("  Model:    {}", model.dimmed());
    println!("  ASPR:     {}", cfg.safety_mode.to_string().bold());
    println!(
        "  Cockpit:  {}",
        format!("http://0.0.0.0:{}", cfg.listen_port).bold()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_types::SafetyMode;

    #[test]
    fn assemble_honours_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut cfg = RoverConfig::default();
        cfg.safety_mode = SafetyMode::Learning;
        cfg.model_path = Some(dir.path().join("missing-model.json"));
        cfg.buffer_capacity = 7;

        let parts = Components::assemble(&cfg);
        let metrics = parts.engine.metrics();
        assert_eq!(metrics.mode, SafetyMode::Learning);
        assert!(!metrics.model_loaded, "unreadable artifact falls back to rules");
        assert_eq!(parts.buffer.capacity(), 7);
        assert_eq!(parts.link.config().sensor_url, cfg.sensor_url);
        assert!(parts.arbiter.current().is_none());
    }

    #[tokio::test]
    async fn app_state_shares_components() {
        let parts = Components::assemble(&RoverConfig::default());
        let state = parts.app_state();
        state.arbiter.take("alice");
        assert_eq!(parts.arbiter.current().as_deref(), Some("alice"));
        assert!(parts.commands.gate().arbiter().status("alice").has_control);
    }
}
