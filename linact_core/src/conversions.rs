//! `From` implementations bridging `linact_config` types to `linact_core` types.
//!
//! These keep field-by-field mapping out of the CLI.

use std::time::Duration;

use crate::config::{
    HomingConfig, MachineConfig, MotionPhaseConfig, MotionProfiles, PositionWindow, SensedConfig,
    Timing,
};

// ── Motion ───────────────────────────────────────────────────────────────────

fn phase(m: &linact_config::Motion, stall: &linact_config::StallCfg) -> MotionPhaseConfig {
    MotionPhaseConfig {
        max_speed: m.max_speed,
        accel_steps: m.accel_steps,
        decel_steps: m.decel_steps,
        cruise_end_position: m.cruise_end_position,
        cruise_reverse_end_position: m.cruise_reverse_end_position,
        stall_torque_threshold: stall.stall_torque_threshold,
        stall_warmup_ticks: stall.stall_warmup_ticks,
        recovery_ticks: m.recovery_ticks,
        recovery_speed: m.recovery_speed,
    }
}

impl From<&linact_config::Motion> for MotionProfiles {
    fn from(m: &linact_config::Motion) -> Self {
        Self {
            forward: phase(m, &m.forward),
            reverse: phase(m, &m.reverse),
        }
    }
}

// ── Homing ───────────────────────────────────────────────────────────────────

impl From<&linact_config::Homing> for HomingConfig {
    fn from(h: &linact_config::Homing) -> Self {
        Self {
            velocity: h.velocity,
            stall_torque_threshold: h.stall_torque_threshold,
            stall_warmup_ticks: h.stall_warmup_ticks,
            recovery_ticks: h.recovery_ticks,
            max_ticks: h.max_ticks,
        }
    }
}

// ── Sensed ───────────────────────────────────────────────────────────────────

impl From<&linact_config::Sensed> for SensedConfig {
    fn from(s: &linact_config::Sensed) -> Self {
        Self {
            plausible_band: s.plausible_band,
            accel_torque_limit: s.accel_torque_limit,
            maintain_torque_limit: s.maintain_torque_limit,
            max_ticks: s.max_ticks,
        }
    }
}

// ── Window ───────────────────────────────────────────────────────────────────

impl From<&linact_config::Window> for PositionWindow {
    fn from(w: &linact_config::Window) -> Self {
        Self {
            home_reference: w.home_reference,
            half_width: w.half_width,
        }
    }
}

// ── Timing ───────────────────────────────────────────────────────────────────

impl From<&linact_config::Timing> for Timing {
    fn from(t: &linact_config::Timing) -> Self {
        Self {
            control_period: Duration::from_micros(t.control_period_us),
            query_period: Duration::from_micros(t.query_period_us),
            hold_period: Duration::from_micros(t.hold_period_us),
            write_only_settle: Duration::from_micros(t.write_only_settle_us),
            settle_hold: Duration::from_millis(t.settle_hold_ms),
        }
    }
}

// ── Machine ──────────────────────────────────────────────────────────────────

impl From<&linact_config::Machine> for MachineConfig {
    fn from(m: &linact_config::Machine) -> Self {
        Self {
            require_extend_limit: m.require_extend_limit,
            extend_error_delay: Duration::from_millis(m.extend_error_delay_ms),
        }
    }
}
