#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Host-side control of a CAN-attached linear actuator (hardware-agnostic).
//!
//! All hardware interaction goes through `linact_traits::SerialChannel` and
//! `linact_traits::Switch`.
//!
//! ## Architecture
//!
//! - **Codec**: ASCII-hex framing of the serial-to-CAN bridge (`codec`)
//! - **Profiles**: linear and S-curve velocity ramps (`profile`)
//! - **Transport**: one frame in flight over a serial channel (`link`, `worker`)
//! - **Control**: accelerate / cruise / decelerate with stall recovery (`executor`)
//! - **Homing**: drive to the home switch with its own stall policy (`homing`)
//! - **State machine**: home → extend → retract with a safety interlock (`machine`)
//!
//! Position convention: home is the larger coordinate (500 by default);
//! extending moves toward smaller positions.

pub mod codec;
pub mod config;
pub mod conversions;
pub mod error;
pub mod executor;
pub mod homing;
pub mod hw_error;
pub mod link;
pub mod machine;
pub mod mocks;
pub mod profile;
pub mod query;
pub mod session;
pub mod status;
pub mod switches;
pub mod util;
pub mod worker;

pub use codec::{ActuatorSample, CommandFrame, FrameParseError};
pub use config::{
    HomingConfig, MachineConfig, MotionPhaseConfig, MotionProfiles, PositionWindow, SensedConfig,
    Timing,
};
pub use error::{ActuatorError, BuildError, Result};
pub use executor::ControlLoop;
pub use homing::HomingSequencer;
pub use link::Link;
pub use machine::{Controller, ControllerBuilder};
pub use profile::Direction;
pub use session::Session;
pub use status::{HomingOutcome, OperationalState, PhaseOutcome};
pub use switches::{SwitchState, Switches};
pub use worker::{BridgeWorker, WorkerChannel};
