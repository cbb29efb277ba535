//! Control loop executor: accelerate, cruise and decelerate in either
//! direction, plus hold and velocity-mode helpers.
//!
//! Every motion tick is one `write_and_query` with the next commanded
//! position, one control period of sleep, one read. Feedback goes through the
//! session's window gate before any decision looks at it.
use eyre::WrapErr;
use linact_traits::SerialChannel;
use tracing::{debug, info, trace, warn};

use crate::codec::{self, ActuatorSample};
use crate::config::{MotionProfiles, PositionWindow, SensedConfig, Timing};
use crate::error::{ActuatorError, Result};
use crate::link::Link;
use crate::profile::{self, Direction};
use crate::session::Session;
use crate::status::PhaseOutcome;
use crate::switches::Switches;
use crate::util::ticks_for;

#[derive(Debug, Clone)]
pub struct ControlLoop {
    pub profiles: MotionProfiles,
    pub sensed: SensedConfig,
    pub window: PositionWindow,
    pub timing: Timing,
}

impl ControlLoop {
    pub fn new(
        profiles: MotionProfiles,
        sensed: SensedConfig,
        window: PositionWindow,
        timing: Timing,
    ) -> Self {
        Self {
            profiles,
            sensed,
            window,
            timing,
        }
    }

    /// Set the cruise speed of both directions. Phases run to completion
    /// inside one call, so this can only land between phases.
    pub fn change_max_speed(&mut self, speed: f32) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(eyre::Report::new(ActuatorError::Config(format!(
                "max speed must be finite and > 0, got {speed}"
            ))));
        }
        self.profiles.forward.max_speed = speed;
        self.profiles.reverse.max_speed = speed;
        info!(speed, "max speed changed");
        Ok(())
    }

    /// Command `position`, read back, gate. Returns the sample only if it
    /// passed the window gate.
    fn motion_tick<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        position: f32,
    ) -> Result<Option<ActuatorSample>> {
        let sample = link.exchange(
            &codec::write_and_query(Some(position), None),
            self.timing.control_period,
        )?;
        session.commanded_position = position;
        let Some(s) = sample else {
            return Ok(None);
        };
        trace!(
            commanded = position,
            position = s.position,
            torque = s.torque,
            "tick"
        );
        Ok(session.accept(&s, &self.window).then_some(s))
    }

    /// Linear ramp from rest to cruise speed; exactly `accel_steps` ticks,
    /// no stall check.
    pub fn accelerate<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        direction: Direction,
    ) -> Result<()> {
        let cfg = self.profiles.for_direction(direction);
        let steps = cfg.accel_steps.max(1) as usize;
        let delta = direction.sign() * cfg.max_speed / steps as f32;
        let ramp = profile::linear_ramp(session.current_position, delta, steps);
        for &p in ramp.positions.iter().skip(1) {
            self.motion_tick(link, session, p)
                .wrap_err("acceleration tick")?;
        }
        debug!(?direction, steps, position = session.current_position, "acceleration done");
        Ok(())
    }

    /// Constant speed until the cruise end position is reached. After the
    /// warm-up ticks, torque at or above the threshold is a stall: the
    /// recovery burst runs and the phase returns `Obstructed`.
    pub fn cruise<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        direction: Direction,
    ) -> Result<PhaseOutcome> {
        let cfg = self.profiles.for_direction(direction);
        let velocity = direction.sign() * cfg.max_speed;
        let end = cfg.cruise_end(direction);
        let mut tick: u32 = 0;
        while !direction.reached(session.current_position, end) {
            let next = session.commanded_position + velocity;
            if !self.window.contains(next) {
                warn!(next, "cruise would command outside the nominal window; stopping early");
                break;
            }
            let sample = self
                .motion_tick(link, session, next)
                .wrap_err("cruise tick")?;
            if let Some(s) = sample
                && tick >= cfg.stall_warmup_ticks
                && s.torque >= cfg.stall_torque_threshold
            {
                warn!(
                    ?direction,
                    tick,
                    torque = s.torque,
                    threshold = cfg.stall_torque_threshold,
                    position = s.position,
                    "stall detected"
                );
                self.recover(link, session, direction)?;
                return Ok(PhaseOutcome::Obstructed);
            }
            tick = tick.saturating_add(1);
        }
        debug!(?direction, ticks = tick, position = session.current_position, "cruise done");
        Ok(PhaseOutcome::Completed)
    }

    /// Ramp back to rest over `decel_steps`, ending early when the limit
    /// switch ahead asserts (extend for forward, home for reverse). The
    /// first tick still moves at cruise speed and the ramp ends once the
    /// next speed would be zero, so no zero-velocity tick is sent.
    /// Returns the final accepted position.
    pub fn decelerate<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        switches: &mut Switches,
        direction: Direction,
    ) -> Result<f32> {
        let cfg = self.profiles.for_direction(direction);
        let steps = cfg.decel_steps.max(1);
        let per_step = cfg.max_speed / steps as f32;
        for i in 0..steps {
            let limit = match direction {
                Direction::Forward => switches.extend_limit(),
                Direction::Reverse => switches.home_limit(),
            };
            if limit.is_asserted() {
                debug!(?direction, step = i, "limit switch asserted during deceleration");
                break;
            }
            let speed = cfg.max_speed - per_step * i as f32;
            let next = session.commanded_position + direction.sign() * speed;
            self.motion_tick(link, session, next)
                .wrap_err("deceleration tick")?;
        }
        debug!(?direction, position = session.current_position, "deceleration done");
        Ok(session.current_position)
    }

    /// Stop, rezero to the home reference, then back away from the jam
    /// for `recovery_ticks` in velocity mode. Ends stopped and re-zeroed so
    /// a following hold does not drive back into the obstruction.
    fn recover<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        direction: Direction,
    ) -> Result<()> {
        let cfg = self.profiles.for_direction(direction);
        let home = self.window.home_reference;
        link.stop().wrap_err("stall stop")?;
        link.rezero(home).wrap_err("stall rezero")?;
        session.reset_to(home);

        let velocity = direction.opposite().sign() * cfg.recovery_speed;
        let frame = codec::write_and_query(None, Some(velocity));
        for _ in 0..cfg.recovery_ticks {
            if let Some(s) = link.exchange(&frame, self.timing.control_period)? {
                session.record_recovery(&s, &self.window);
            }
        }

        link.stop().wrap_err("recovery stop")?;
        link.rezero(home).wrap_err("recovery rezero")?;
        session.reset_to(home);
        info!(ticks = cfg.recovery_ticks, velocity, "recovery burst done");
        Ok(())
    }

    /// Accelerate, cruise, decelerate. A stall skips deceleration and
    /// marks the session obstructed.
    pub fn run_profile<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        switches: &mut Switches,
        direction: Direction,
    ) -> Result<PhaseOutcome> {
        info!(?direction, from = session.current_position, "profile start");
        session.last_phase_end = None;
        self.accelerate(link, session, direction)?;
        if self.cruise(link, session, direction)? == PhaseOutcome::Obstructed {
            session.obstructed = true;
            return Ok(PhaseOutcome::Obstructed);
        }
        let end = self.decelerate(link, session, switches, direction)?;
        session.last_phase_end = Some(end);
        info!(?direction, end, "profile complete");
        Ok(PhaseOutcome::Completed)
    }

    // ── hold helpers ────────────────────────────────────────────────────────

    /// One tick commanding `position` at zero velocity; feedback is discarded.
    pub fn hold_position<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        position: f32,
    ) -> Result<()> {
        link.exchange(
            &codec::write_and_query(Some(position), Some(0.0)),
            self.timing.hold_period,
        )?;
        session.commanded_position = position;
        Ok(())
    }

    pub fn hold_position_for<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        position: f32,
        duration: std::time::Duration,
    ) -> Result<()> {
        for _ in 0..ticks_for(duration, self.timing.hold_period) {
            self.hold_position(link, session, position)?;
        }
        Ok(())
    }

    /// Zero velocity, position left as is.
    pub fn hold_unchanged<C: SerialChannel>(&self, link: &mut Link<C>) -> Result<()> {
        link.exchange(
            &codec::write_and_query(None, Some(0.0)),
            self.timing.hold_period,
        )?;
        Ok(())
    }

    pub fn hold_unchanged_for<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        duration: std::time::Duration,
    ) -> Result<()> {
        for _ in 0..ticks_for(duration, self.timing.hold_period) {
            self.hold_unchanged(link)?;
        }
        Ok(())
    }

    /// Write-only variant of `hold_unchanged_for`; nothing is read back
    /// beyond draining the acknowledgement.
    pub fn hold_unchanged_blind<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        duration: std::time::Duration,
    ) -> Result<()> {
        let rest = self
            .timing
            .hold_period
            .saturating_sub(self.timing.write_only_settle);
        for _ in 0..ticks_for(duration, self.timing.hold_period) {
            link.write_only(None, Some(0.0))?;
            link.clock().sleep(rest);
        }
        Ok(())
    }

    // ── velocity mode ───────────────────────────────────────────────────────

    fn plausible(&self, s: &ActuatorSample, goal: f32) -> bool {
        (s.position - goal).abs() <= self.sensed.plausible_band
    }

    /// Follow the S-curve from `start_velocity` toward `end_velocity` in
    /// velocity mode. Stops early on torque at or above the accel limit or
    /// on the extend switch. Returns the last commanded velocity.
    #[allow(clippy::too_many_arguments)]
    pub fn sensed_acceleration<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        switches: &mut Switches,
        start_velocity: f32,
        end_velocity: f32,
        points: usize,
        goal_position: f32,
    ) -> Result<f32> {
        let curve = profile::s_curve(start_velocity, end_velocity, points);
        let mut last = start_velocity;
        for &v in &curve {
            last = v;
            let sample = link.exchange(
                &codec::write_and_query(None, Some(v)),
                self.timing.control_period,
            )?;
            if let Some(s) = sample
                && self.plausible(&s, goal_position)
                && session.accept(&s, &self.window)
                && s.torque >= self.sensed.accel_torque_limit
            {
                warn!(torque = s.torque, velocity = v, "torque limit during sensed acceleration");
                break;
            }
            if switches.extend_limit().is_asserted() {
                debug!(velocity = v, "extend limit during sensed acceleration");
                break;
            }
        }
        Ok(last)
    }

    /// Hold `velocity` until the goal is reached or passed, torque reaches
    /// the maintain limit, the extend switch asserts, or `max_ticks` run
    /// out. Torque is compared for every in-window sample, plausible or not,
    /// so a goal the actuator cannot reach still ends on the jam. Returns
    /// the final accepted position.
    pub fn maintain_velocity<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        switches: &mut Switches,
        velocity: f32,
        goal_position: f32,
    ) -> Result<f32> {
        let direction = if velocity < 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let frame = codec::write_and_query(None, Some(velocity));
        let mut ticks: u32 = 0;
        loop {
            if self.sensed.max_ticks != 0 && ticks >= self.sensed.max_ticks {
                warn!(
                    ticks,
                    goal = goal_position,
                    position = session.current_position,
                    "velocity hold ran out of ticks"
                );
                break;
            }
            ticks = ticks.saturating_add(1);
            let sample = link.exchange(&frame, self.timing.control_period)?;
            if let Some(s) = sample {
                let over_limit = s.torque >= self.sensed.maintain_torque_limit;
                if self.plausible(&s, goal_position) && session.accept(&s, &self.window) {
                    if over_limit {
                        warn!(torque = s.torque, "torque limit while maintaining velocity");
                        break;
                    }
                    if direction.reached(s.position, goal_position) {
                        break;
                    }
                } else if over_limit && self.window.contains(s.position) {
                    warn!(
                        torque = s.torque,
                        position = s.position,
                        goal = goal_position,
                        "torque limit short of the goal"
                    );
                    break;
                }
            }
            if switches.extend_limit().is_asserted() {
                break;
            }
        }
        debug!(ticks, position = session.current_position, "velocity hold done");
        Ok(session.current_position)
    }
}

impl Default for ControlLoop {
    fn default() -> Self {
        Self::new(
            MotionProfiles::default(),
            SensedConfig::default(),
            PositionWindow::default(),
            Timing::default(),
        )
    }
}
