//! Device backends for the actuator: a simulated bridge and switches that
//! always build, and serial/GPIO backends behind the `hardware` feature.
pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod serial;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use sim::{SimParams, SimulatedBridge, SimulatedSwitch, SwitchHandle};

#[cfg(feature = "hardware")]
pub use serial::SerialBridge;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::GpioSwitch;
