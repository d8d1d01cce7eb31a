//! `rover-cockpit` – The Operator API
//!
//! An axum HTTP server (default port `8080`) exposing the teleoperation
//! surface of the rover:
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | GET | `/cmd?move=&operator=` | actuator reply, or `403 NO_CONTROL_RIGHTS`, `403 BLOCKED_BY_ASPR: <reason>`, `400 INVALID_MOVE: <move>`, `500 actuator error: <details>` |
//! | GET | `/control?operator=` | `{current_operator, has_control}` |
//! | POST | `/take_control` `{name}` | `{status: "success", operator}` |
//! | POST | `/release_control` `{name}` | `{status: "released"}` or `403 {status: "error", message}` |
//! | GET | `/metrics` | `{sensor_records, last_distance, total_commands, aspr_interventions}` |
//! | GET | `/aspr_status` | `{explanation, trigger, active, interventions, mode, model_loaded}` |
//! | GET | `/aspr_metrics` | `{active, interventions, mode, model_loaded}` |
//! | POST | `/aspr_mode` `{mode}` | `{mode}` or `400` |
//! | GET | `/sensor` | latest snapshot or `{"error": "no_data"}` |
//!
//! Missing `move` means `stop`; missing operator names mean `"Anonymous"`.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rover_cockpit::{AppState, CockpitServer};
//! use rover_runtime::StopSignal;
//!
//! async fn serve(state: AppState, stop: StopSignal) {
//!     if let Err(e) = CockpitServer::new(state).with_port(8080).run(stop).await {
//!         tracing::error!(error = %e, "cockpit stopped");
//!     }
//! }
//! ```

pub mod server;

pub use server::{ANONYMOUS_OPERATOR, AppState, CockpitError, CockpitServer, DEFAULT_PORT, router};
