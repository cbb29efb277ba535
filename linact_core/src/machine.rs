//! Operational state machine and the `Controller` that owns the session.
//!
//! One `tick` evaluates the safety interlock first, then at most one
//! transition. Homing, extending and sheathing run to completion inside
//! their tick, so the safety switch is only observed between phases.
use std::marker::PhantomData;
use std::sync::Arc;

use eyre::WrapErr;
use linact_traits::{Clock, MonotonicClock, SerialChannel};
use tracing::{info, warn};

use crate::codec::ActuatorSample;
use crate::config::{
    HomingConfig, MachineConfig, MotionProfiles, PositionWindow, SensedConfig, Timing,
};
use crate::error::{BuildError, Result};
use crate::executor::ControlLoop;
use crate::homing::HomingSequencer;
use crate::link::Link;
use crate::profile::Direction;
use crate::query;
use crate::session::Session;
use crate::status::{HomingOutcome, OperationalState, PhaseOutcome};
use crate::switches::Switches;

pub struct Controller<C> {
    link: Link<C>,
    switches: Switches,
    control: ControlLoop,
    homing: HomingSequencer,
    machine: MachineConfig,
    session: Session,
}

impl<C> std::fmt::Debug for Controller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.session.state)
            .field("commanded", &self.session.commanded_position)
            .field("current", &self.session.current_position)
            .field("obstructed", &self.session.obstructed)
            .finish_non_exhaustive()
    }
}

impl<C: SerialChannel> Controller<C> {
    /// Start building a Controller.
    pub fn builder() -> ControllerBuilder<C, Missing, Missing> {
        ControllerBuilder::default()
    }

    pub fn state(&self) -> OperationalState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn link(&self) -> &Link<C> {
        &self.link
    }

    pub fn switches_mut(&mut self) -> &mut Switches {
        &mut self.switches
    }

    /// Takes effect from the next phase.
    pub fn change_max_speed(&mut self, speed: f32) -> Result<()> {
        self.control.change_max_speed(speed)
    }

    fn set_state(&mut self, next: OperationalState) {
        if self.session.state != next {
            info!(from = %self.session.state, to = %next, "state transition");
            self.session.state = next;
        }
    }

    /// Hold the last commanded position for one tick.
    pub fn hold(&mut self) -> Result<()> {
        let position = self.session.commanded_position;
        self.control
            .hold_position(&mut self.link, &mut self.session, position)
    }

    /// One zero-velocity tick that leaves the position unchanged.
    pub fn hold_unchanged(&mut self) -> Result<()> {
        self.control.hold_unchanged(&mut self.link)
    }

    fn settle(&mut self) -> Result<()> {
        let position = self.session.commanded_position;
        let duration = self.control.timing.settle_hold;
        self.control
            .hold_position_for(&mut self.link, &mut self.session, position, duration)
    }

    /// One homing attempt; a successful one is followed by the settle hold.
    pub fn home(&mut self) -> Result<HomingOutcome> {
        let outcome = self
            .homing
            .run(&mut self.link, &mut self.session, &mut self.switches)?;
        if outcome.is_homed() {
            self.settle()?;
        }
        Ok(outcome)
    }

    /// Forward profile from a re-zeroed home reference, settle hold, rezero.
    pub fn extend(&mut self) -> Result<PhaseOutcome> {
        let home = self.control.window.home_reference;
        self.link.rezero(home).wrap_err("rezero before extend")?;
        self.session.reset_to(home);
        let outcome = self.control.run_profile(
            &mut self.link,
            &mut self.session,
            &mut self.switches,
            Direction::Forward,
        )?;
        self.settle()?;
        self.link.rezero(home).wrap_err("rezero after extend")?;
        self.session.reset_to(home);
        Ok(outcome)
    }

    /// Reverse profile from a re-zeroed home reference.
    pub fn retract(&mut self) -> Result<PhaseOutcome> {
        let home = self.control.window.home_reference;
        self.link.rezero(home).wrap_err("rezero before retract")?;
        self.session.reset_to(home);
        self.control.run_profile(
            &mut self.link,
            &mut self.session,
            &mut self.switches,
            Direction::Reverse,
        )
    }

    /// Bounded query; `None` when no in-window sample arrived.
    pub fn query(&mut self) -> Result<Option<ActuatorSample>> {
        query::valid_query(
            &mut self.link,
            &self.control.window,
            self.control.timing.query_period,
        )
    }

    /// Query until an in-window sample arrives.
    pub fn query_blocking(&mut self) -> Result<ActuatorSample> {
        query::triple_query(
            &mut self.link,
            &self.control.window,
            self.control.timing.query_period,
        )
    }

    pub fn stop(&mut self) -> Result<()> {
        self.link.stop()
    }

    pub fn brake(&mut self) -> Result<()> {
        self.link.brake()
    }

    /// Redefine the origin so the current position reads `position`.
    pub fn rezero(&mut self, position: f32) -> Result<()> {
        self.link.rezero(position)?;
        self.session.reset_to(position);
        Ok(())
    }

    /// Velocity-mode S-curve toward `end_velocity`, then hold it until
    /// `goal_position`. Returns the final accepted position.
    pub fn sensed_move(
        &mut self,
        start_velocity: f32,
        end_velocity: f32,
        points: usize,
        goal_position: f32,
    ) -> Result<f32> {
        let reached = self.control.sensed_acceleration(
            &mut self.link,
            &mut self.session,
            &mut self.switches,
            start_velocity,
            end_velocity,
            points,
            goal_position,
        )?;
        let position = self.control.maintain_velocity(
            &mut self.link,
            &mut self.session,
            &mut self.switches,
            reached,
            goal_position,
        )?;
        self.link.stop()?;
        Ok(position)
    }

    /// Evaluate one transition. Safety first: an open interlock pre-empts
    /// every state and holds position; closing it returns to `Initial`.
    pub fn tick(&mut self) -> Result<OperationalState> {
        if !self.switches.safety_ok() {
            if self.session.state != OperationalState::SafetyLockout {
                warn!(from = %self.session.state, "safety interlock open");
                self.set_state(OperationalState::SafetyLockout);
            }
            self.hold()?;
            return Ok(self.session.state);
        }

        match self.session.state {
            OperationalState::SafetyLockout => {
                info!("safety interlock closed");
                self.set_state(OperationalState::Initial);
            }
            OperationalState::Initial => {
                let next = if self.switches.home_limit().is_asserted() {
                    OperationalState::Homing
                } else {
                    OperationalState::WaitingToHome
                };
                self.set_state(next);
            }
            OperationalState::WaitingToHome => {
                if self.switches.activate().is_asserted()
                    || self.switches.home_limit().is_asserted()
                {
                    self.set_state(OperationalState::Homing);
                } else {
                    self.hold()?;
                }
            }
            OperationalState::Homing => {
                let next = match self.home()? {
                    HomingOutcome::Homed => OperationalState::Homed,
                    HomingOutcome::Obstructed | HomingOutcome::TimedOut => {
                        OperationalState::WaitingToHome
                    }
                };
                self.set_state(next);
            }
            OperationalState::Homed => self.set_state(OperationalState::WaitingToExtend),
            OperationalState::WaitingToExtend => {
                if self.switches.activate().is_asserted() {
                    self.set_state(OperationalState::Extending);
                } else {
                    self.hold()?;
                }
            }
            OperationalState::Extending => {
                self.session.obstructed = false;
                self.extend()?;
                let next = if self.machine.require_extend_limit
                    && !self.switches.extend_limit().is_asserted()
                {
                    warn!("extension ended without the extend limit switch");
                    OperationalState::ExtendError
                } else {
                    OperationalState::Extended
                };
                self.set_state(next);
            }
            OperationalState::Extended => {
                if self.switches.activate().is_asserted() {
                    self.set_state(OperationalState::Sheathing);
                } else {
                    self.hold()?;
                }
            }
            OperationalState::Sheathing => {
                self.retract()?;
                let next = if self.session.obstructed {
                    OperationalState::WaitingToHome
                } else {
                    OperationalState::Homing
                };
                self.set_state(next);
            }
            OperationalState::ExtendError => {
                self.link.clock().sleep(self.machine.extend_error_delay);
                self.set_state(OperationalState::Initial);
            }
        }
        Ok(self.session.state)
    }

    /// Tick until `should_stop` returns true or `max_ticks` ticks ran.
    /// Returns the number of ticks executed.
    pub fn run(&mut self, mut should_stop: impl FnMut() -> bool, max_ticks: Option<u64>) -> Result<u64> {
        let mut ticks = 0u64;
        while !should_stop() && max_ticks.is_none_or(|m| ticks < m) {
            self.tick()?;
            ticks += 1;
        }
        Ok(ticks)
    }

    /// Best-effort stop for shutdown paths.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.link.stop() {
            warn!(error = %e, "stop on shutdown failed");
        }
    }
}

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

/// Builder for `Controller`. Configuration is validated on `build()`.
pub struct ControllerBuilder<C, Ch, Sw> {
    channel: Option<C>,
    switches: Option<Switches>,
    profiles: Option<MotionProfiles>,
    sensed: Option<SensedConfig>,
    window: Option<PositionWindow>,
    timing: Option<Timing>,
    homing: Option<HomingConfig>,
    machine: Option<MachineConfig>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _ch: PhantomData<Ch>,
    _sw: PhantomData<Sw>,
}

impl<C> Default for ControllerBuilder<C, Missing, Missing> {
    fn default() -> Self {
        Self {
            channel: None,
            switches: None,
            profiles: None,
            sensed: None,
            window: None,
            timing: None,
            homing: None,
            machine: None,
            clock: None,
            _ch: PhantomData,
            _sw: PhantomData,
        }
    }
}

impl<C, Ch, Sw> ControllerBuilder<C, Ch, Sw> {
    fn retype<Ch2, Sw2>(self) -> ControllerBuilder<C, Ch2, Sw2> {
        ControllerBuilder {
            channel: self.channel,
            switches: self.switches,
            profiles: self.profiles,
            sensed: self.sensed,
            window: self.window,
            timing: self.timing,
            homing: self.homing,
            machine: self.machine,
            clock: self.clock,
            _ch: PhantomData,
            _sw: PhantomData,
        }
    }

    pub fn with_profiles(mut self, profiles: MotionProfiles) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn with_sensed(mut self, sensed: SensedConfig) -> Self {
        self.sensed = Some(sensed);
        self
    }

    pub fn with_window(mut self, window: PositionWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_homing(mut self, homing: HomingConfig) -> Self {
        self.homing = Some(homing);
        self
    }

    pub fn with_machine(mut self, machine: MachineConfig) -> Self {
        self.machine = Some(machine);
        self
    }

    /// Apply every section of a loaded config file.
    pub fn with_config(self, cfg: &linact_config::Config) -> Self {
        self.with_profiles(MotionProfiles::from(&cfg.motion))
            .with_sensed(SensedConfig::from(&cfg.sensed))
            .with_window(PositionWindow::from(&cfg.window))
            .with_timing(Timing::from(&cfg.timing))
            .with_homing(HomingConfig::from(&cfg.homing))
            .with_machine(MachineConfig::from(&cfg.machine))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl<C: SerialChannel, Ch, Sw> ControllerBuilder<C, Ch, Sw> {
    /// Fallible build available in any type-state; returns a typed
    /// `BuildError` for missing pieces or inconsistent tuning.
    pub fn try_build(self) -> Result<Controller<C>> {
        let channel = self
            .channel
            .ok_or_else(|| eyre::Report::new(BuildError::MissingChannel))?;
        let switches = self
            .switches
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSwitches))?;
        let profiles = self.profiles.unwrap_or_default();
        let sensed = self.sensed.unwrap_or_default();
        let window = self.window.unwrap_or_default();
        let timing = self.timing.unwrap_or_default();
        let homing = self.homing.unwrap_or_default();
        let machine = self.machine.unwrap_or_default();
        let clock: Arc<dyn Clock + Send + Sync> =
            self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        validate(&profiles, &window, &timing, &homing)?;

        let link = Link::new(channel, clock).with_settle(timing.write_only_settle);
        Ok(Controller {
            link,
            switches,
            control: ControlLoop::new(profiles, sensed, window, timing),
            homing: HomingSequencer::new(homing, window, timing),
            machine,
            session: Session::new(window.home_reference),
        })
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate(
    profiles: &MotionProfiles,
    window: &PositionWindow,
    timing: &Timing,
    homing: &HomingConfig,
) -> Result<()> {
    if !(window.half_width.is_finite() && window.half_width > 0.0) {
        return Err(invalid("window half width must be > 0"));
    }
    for p in [&profiles.forward, &profiles.reverse] {
        if !(p.max_speed.is_finite() && p.max_speed > 0.0) {
            return Err(invalid("max speed must be finite and > 0"));
        }
        if p.accel_steps == 0 || p.decel_steps == 0 {
            return Err(invalid("accel/decel steps must be >= 1"));
        }
        if !window.contains(p.cruise_end_position) || !window.contains(p.cruise_reverse_end_position)
        {
            return Err(invalid("cruise end positions must lie inside the window"));
        }
        if !(p.stall_torque_threshold.is_finite() && p.stall_torque_threshold > 0.0) {
            return Err(invalid("stall torque threshold must be > 0"));
        }
    }
    if !(homing.velocity.is_finite() && homing.velocity > 0.0) {
        return Err(invalid("homing velocity must be > 0"));
    }
    if timing.control_period.is_zero() || timing.hold_period.is_zero() {
        return Err(invalid("control and hold periods must be non-zero"));
    }
    Ok(())
}

impl<C, Sw> ControllerBuilder<C, Missing, Sw> {
    pub fn with_channel(mut self, channel: C) -> ControllerBuilder<C, Set, Sw> {
        self.channel = Some(channel);
        self.retype()
    }
}

impl<C, Ch> ControllerBuilder<C, Ch, Missing> {
    pub fn with_switches(mut self, switches: Switches) -> ControllerBuilder<C, Ch, Set> {
        self.switches = Some(switches);
        self.retype()
    }
}

impl<C: SerialChannel> ControllerBuilder<C, Set, Set> {
    /// Validate and build. Only available once channel and switches are set.
    pub fn build(self) -> Result<Controller<C>> {
        self.try_build()
    }
}
