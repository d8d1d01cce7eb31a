//! `rover-hal` – the link between the backend and the rover firmware.
//!
//! # Modules
//!
//! - [`actuator`] – the [`Actuator`] and [`SensorSource`] traits every link
//!   implementation provides.
//! - [`report`] – [`SensorReport`], the JSON shape of the rover's sensor
//!   endpoint, and its conversion into a [`SensorSnapshot`][rover_types::SensorSnapshot].
//! - [`http`] – [`HttpRoverLink`], the reqwest-based implementation with
//!   bounded per-request timeouts.

pub mod actuator;
pub mod http;
pub mod report;

pub use actuator::{Actuator, ActuatorReply, SensorSource};
pub use http::{HttpRoverLink, LinkConfig};
pub use report::SensorReport;
