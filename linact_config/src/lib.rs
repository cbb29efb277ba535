#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the linear actuator controller.
//!
//! `Config` and its sections are deserialized from TOML and checked with
//! `Config::validate`. Every section is optional; omitted sections take the
//! reference tuning of the rig (home reference 500, ±50 window, 1.2 ms loop).
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Serial {
    /// Bridge device, e.g. /dev/fdcanusb or /dev/ttyACM0
    pub port: String,
    pub baud: u32,
    /// Per-read timeout; a timed-out read yields no bytes
    pub read_timeout_ms: u64,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            port: "/dev/fdcanusb".into(),
            baud: 115_200,
            read_timeout_ms: 10,
        }
    }
}

/// BCM pin numbers of the four switch inputs.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Pins {
    pub home_limit: u8,
    pub extend_limit: u8,
    pub activate: u8,
    pub safety: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            home_limit: 17,
            extend_limit: 27,
            activate: 22,
            safety: 23,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Switches {
    /// Treat a line pulled low as asserted
    pub active_low: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self { active_low: true }
    }
}

/// Stall detection for one direction of travel.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct StallCfg {
    pub stall_torque_threshold: f32,
    /// Cruise ticks ignored before torque is compared
    pub stall_warmup_ticks: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Motion {
    /// Cruise speed in position units per control tick
    pub max_speed: f32,
    pub accel_steps: u32,
    pub decel_steps: u32,
    /// Forward cruise stops once position drops to this value
    pub cruise_end_position: f32,
    /// Reverse cruise stops once position rises to this value
    pub cruise_reverse_end_position: f32,
    pub recovery_ticks: u32,
    /// Velocity magnitude of the post-stall recovery burst
    pub recovery_speed: f32,
    pub forward: StallCfg,
    pub reverse: StallCfg,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            max_speed: 0.055,
            accel_steps: 50,
            decel_steps: 20,
            cruise_end_position: 480.0,
            cruise_reverse_end_position: 520.0,
            recovery_ticks: 250,
            recovery_speed: 2.5,
            forward: StallCfg {
                stall_torque_threshold: 0.20,
                stall_warmup_ticks: 23,
            },
            reverse: StallCfg {
                stall_torque_threshold: 0.40,
                stall_warmup_ticks: 7,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Homing {
    /// Velocity toward the home switch (velocity mode)
    pub velocity: f32,
    pub stall_torque_threshold: f32,
    pub stall_warmup_ticks: u32,
    pub recovery_ticks: u32,
    /// Give up after this many ticks (0 = never)
    pub max_ticks: u32,
}

impl Default for Homing {
    fn default() -> Self {
        Self {
            velocity: 4.5,
            stall_torque_threshold: 0.13,
            stall_warmup_ticks: 20,
            recovery_ticks: 100,
            max_ticks: 0,
        }
    }
}

/// Velocity-mode S-curve acceleration and constant-velocity tracking.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Sensed {
    /// Samples further than this from the goal are ignored
    pub plausible_band: f32,
    pub accel_torque_limit: f32,
    pub maintain_torque_limit: f32,
    /// Velocity hold gives up after this many ticks (0 = never)
    pub max_ticks: u32,
}

impl Default for Sensed {
    fn default() -> Self {
        Self {
            plausible_band: 15.0,
            accel_torque_limit: 0.5,
            maintain_torque_limit: 0.8,
            max_ticks: 10_000,
        }
    }
}

/// Nominal position window used to reject corrupted feedback.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Window {
    pub home_reference: f32,
    pub half_width: f32,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            home_reference: 500.0,
            half_width: 50.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Timing {
    /// Wait between a motion write and its read-back
    pub control_period_us: u64,
    /// Wait between a bare query and its read-back
    pub query_period_us: u64,
    /// Duration represented by one hold tick
    pub hold_period_us: u64,
    /// Wait before draining the reply of a simple or write-only command
    pub write_only_settle_us: u64,
    /// Hold after homing and after extending
    pub settle_hold_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            control_period_us: 1200,
            query_period_us: 900,
            hold_period_us: 1025,
            write_only_settle_us: 100,
            settle_hold_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Machine {
    /// Enter ExtendError when extension ends without the extend switch asserted
    pub require_extend_limit: bool,
    pub extend_error_delay_ms: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            require_extend_limit: false,
            extend_error_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub serial: Serial,
    pub pins: Pins,
    pub switches: Switches,
    pub motion: Motion,
    pub homing: Homing,
    pub sensed: Sensed,
    pub window: Window,
    pub timing: Timing,
    pub machine: Machine,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.port.trim().is_empty() {
            eyre::bail!("serial.port must not be empty");
        }
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }

        // Motion
        let m = &self.motion;
        if !positive(m.max_speed) {
            eyre::bail!("motion.max_speed must be finite and > 0");
        }
        if m.accel_steps == 0 {
            eyre::bail!("motion.accel_steps must be >= 1");
        }
        if m.decel_steps == 0 {
            eyre::bail!("motion.decel_steps must be >= 1");
        }
        if !positive(m.recovery_speed) {
            eyre::bail!("motion.recovery_speed must be finite and > 0");
        }
        for (name, stall) in [("forward", &m.forward), ("reverse", &m.reverse)] {
            if !positive(stall.stall_torque_threshold) {
                eyre::bail!("motion.{name}.stall_torque_threshold must be finite and > 0");
            }
        }

        // Window and cruise geometry
        let w = &self.window;
        if !w.home_reference.is_finite() {
            eyre::bail!("window.home_reference must be finite");
        }
        if !positive(w.half_width) {
            eyre::bail!("window.half_width must be finite and > 0");
        }
        if m.cruise_end_position.is_nan() || m.cruise_end_position >= w.home_reference {
            eyre::bail!("motion.cruise_end_position must be below window.home_reference");
        }
        if m.cruise_reverse_end_position.is_nan()
            || m.cruise_reverse_end_position <= w.home_reference
        {
            eyre::bail!(
                "motion.cruise_reverse_end_position must be above window.home_reference"
            );
        }
        let lo = w.home_reference - w.half_width;
        let hi = w.home_reference + w.half_width;
        if m.cruise_end_position <= lo || m.cruise_reverse_end_position >= hi {
            eyre::bail!("window must contain both cruise end positions");
        }

        // Homing
        if !positive(self.homing.velocity) {
            eyre::bail!("homing.velocity must be finite and > 0");
        }
        if !positive(self.homing.stall_torque_threshold) {
            eyre::bail!("homing.stall_torque_threshold must be finite and > 0");
        }

        // Sensed
        if !positive(self.sensed.plausible_band) {
            eyre::bail!("sensed.plausible_band must be finite and > 0");
        }
        if !positive(self.sensed.accel_torque_limit) || !positive(self.sensed.maintain_torque_limit)
        {
            eyre::bail!("sensed torque limits must be finite and > 0");
        }

        // Timing
        if self.timing.control_period_us == 0 {
            eyre::bail!("timing.control_period_us must be >= 1");
        }
        if self.timing.query_period_us == 0 {
            eyre::bail!("timing.query_period_us must be >= 1");
        }
        if self.timing.hold_period_us == 0 {
            eyre::bail!("timing.hold_period_us must be >= 1");
        }
        if self.timing.control_period_us > 1_000_000 {
            eyre::bail!("timing.control_period_us is unreasonably large (>1s)");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_reference_tuning() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.window.home_reference, 500.0);
        assert_eq!(cfg.motion.forward.stall_warmup_ticks, 23);
        assert_eq!(cfg.motion.reverse.stall_torque_threshold, 0.40);
        assert_eq!(cfg.timing.control_period_us, 1200);
        assert!(!cfg.machine.require_extend_limit);
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg = load_toml("[motion]\nmax_speed = 0.04\n").unwrap();
        assert_eq!(cfg.motion.max_speed, 0.04);
        assert_eq!(cfg.motion.accel_steps, 50);
    }
}
