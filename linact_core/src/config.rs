//! Runtime configuration for the control loop, homing and state machine.
//!
//! These are separate from the TOML schema in `linact_config`; see
//! `conversions` for the mapping. Defaults are the rig's reference tuning.
use std::time::Duration;

use crate::profile::Direction;

/// Tuning for one direction of travel. Positions are in controller units,
/// speeds in position units per control tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPhaseConfig {
    /// Cruise speed magnitude.
    pub max_speed: f32,
    /// Acceleration ticks from rest to `max_speed`.
    pub accel_steps: u32,
    /// Deceleration ticks from `max_speed` to rest.
    pub decel_steps: u32,
    /// Forward cruise ends once position falls to this value.
    pub cruise_end_position: f32,
    /// Reverse cruise ends once position rises to this value.
    pub cruise_reverse_end_position: f32,
    /// Torque at or above this during cruise is a stall.
    pub stall_torque_threshold: f32,
    /// Cruise ticks before torque is compared; rejects the start-up transient.
    pub stall_warmup_ticks: u32,
    /// Length of the post-stall recovery burst.
    pub recovery_ticks: u32,
    /// Velocity magnitude of the recovery burst.
    pub recovery_speed: f32,
}

impl MotionPhaseConfig {
    pub fn cruise_end(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Forward => self.cruise_end_position,
            Direction::Reverse => self.cruise_reverse_end_position,
        }
    }
}

/// Forward and reverse tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfiles {
    pub forward: MotionPhaseConfig,
    pub reverse: MotionPhaseConfig,
}

impl MotionProfiles {
    pub fn for_direction(&self, direction: Direction) -> &MotionPhaseConfig {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }
}

impl Default for MotionProfiles {
    fn default() -> Self {
        let forward = MotionPhaseConfig {
            max_speed: 0.055,
            accel_steps: 50,
            decel_steps: 20,
            cruise_end_position: 480.0,
            cruise_reverse_end_position: 520.0,
            stall_torque_threshold: 0.20,
            stall_warmup_ticks: 23,
            recovery_ticks: 250,
            recovery_speed: 2.5,
        };
        let reverse = MotionPhaseConfig {
            stall_torque_threshold: 0.40,
            stall_warmup_ticks: 7,
            ..forward.clone()
        };
        Self { forward, reverse }
    }
}

/// Homing sequencer tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomingConfig {
    /// Velocity toward home (positive).
    pub velocity: f32,
    pub stall_torque_threshold: f32,
    pub stall_warmup_ticks: u32,
    /// Ticks backing away from the obstruction at `-velocity`.
    pub recovery_ticks: u32,
    /// 0 = unbounded.
    pub max_ticks: u32,
}

impl Default for HomingConfig {
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
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensedConfig {
    /// Samples further than this from the goal are implausible and ignored.
    pub plausible_band: f32,
    pub accel_torque_limit: f32,
    pub maintain_torque_limit: f32,
    /// Upper bound on velocity-hold ticks; 0 = unbounded.
    pub max_ticks: u32,
}

impl Default for SensedConfig {
    fn default() -> Self {
        Self {
            plausible_band: 15.0,
            accel_torque_limit: 0.5,
            maintain_torque_limit: 0.8,
            max_ticks: 10_000,
        }
    }
}

/// Nominal feedback window around the home reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionWindow {
    pub home_reference: f32,
    pub half_width: f32,
}

impl PositionWindow {
    /// NaN is never contained.
    pub fn contains(&self, position: f32) -> bool {
        (position - self.home_reference).abs() <= self.half_width
    }
}

impl Default for PositionWindow {
    fn default() -> Self {
        Self {
            home_reference: 500.0,
            half_width: 50.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait between a motion write and its read-back.
    pub control_period: Duration,
    /// Wait between a bare query and its read-back.
    pub query_period: Duration,
    /// Time represented by one hold tick.
    pub hold_period: Duration,
    /// Wait before draining the acknowledgement of simple and write-only frames.
    pub write_only_settle: Duration,
    /// Hold after homing and after extending.
    pub settle_hold: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            control_period: Duration::from_micros(1200),
            query_period: Duration::from_micros(900),
            hold_period: Duration::from_micros(1025),
            write_only_settle: Duration::from_micros(100),
            settle_hold: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Route a forward profile that ends without the extend switch to ExtendError.
    pub require_extend_limit: bool,
    pub extend_error_delay: Duration,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            require_extend_limit: false,
            extend_error_delay: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_nan_and_outliers() {
        let w = PositionWindow::default();
        assert!(w.contains(450.0));
        assert!(w.contains(549.9));
        assert!(!w.contains(551.0));
        assert!(!w.contains(f32::NAN));
        assert!(!w.contains(f32::INFINITY));
    }

    #[test]
    fn reverse_defaults_differ_only_in_stall() {
        let p = MotionProfiles::default();
        assert_eq!(p.reverse.max_speed, p.forward.max_speed);
        assert_eq!(p.reverse.stall_warmup_ticks, 7);
        assert_eq!(p.forward.cruise_end(Direction::Forward), 480.0);
        assert_eq!(p.reverse.cruise_end(Direction::Reverse), 520.0);
    }
}
