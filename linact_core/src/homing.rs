//! Homing sequencer: drive toward the home switch in velocity mode.
use eyre::WrapErr;
use linact_traits::SerialChannel;
use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{HomingConfig, PositionWindow, Timing};
use crate::error::Result;
use crate::link::Link;
use crate::session::Session;
use crate::status::HomingOutcome;
use crate::switches::Switches;

#[derive(Debug, Clone, Copy)]
pub struct HomingSequencer {
    pub cfg: HomingConfig,
    pub window: PositionWindow,
    pub timing: Timing,
}

impl HomingSequencer {
    pub fn new(cfg: HomingConfig, window: PositionWindow, timing: Timing) -> Self {
        Self {
            cfg,
            window,
            timing,
        }
    }

    /// Run one homing attempt.
    ///
    /// The home switch is checked before every tick. On a torque stall after
    /// the warm-up, the actuator backs away (unless already at the extend
    /// limit), is re-zeroed, and the attempt reports `Obstructed`.
    pub fn run<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        switches: &mut Switches,
    ) -> Result<HomingOutcome> {
        let home = self.window.home_reference;
        info!(velocity = self.cfg.velocity, "homing start");
        link.rezero(home).wrap_err("homing rezero")?;
        session.reset_to(home);

        let toward_home = codec::write_and_query(None, Some(self.cfg.velocity));
        let mut tick: u32 = 0;
        loop {
            if switches.home_limit().is_asserted() {
                link.rezero(home).wrap_err("rezero at home switch")?;
                session.reset_to(home);
                info!(ticks = tick, "homed");
                return Ok(HomingOutcome::Homed);
            }
            if self.cfg.max_ticks > 0 && tick >= self.cfg.max_ticks {
                link.stop().wrap_err("homing timeout stop")?;
                warn!(ticks = tick, "homing gave up before reaching the home switch");
                return Ok(HomingOutcome::TimedOut);
            }

            let sample = link
                .exchange(&toward_home, self.timing.control_period)
                .wrap_err("homing tick")?;
            if let Some(s) = sample
                && session.accept(&s, &self.window)
            {
                session.commanded_position = session.current_position;
                if tick >= self.cfg.stall_warmup_ticks && s.torque >= self.cfg.stall_torque_threshold {
                    warn!(tick, torque = s.torque, "homing obstructed");
                    self.back_off(link, session, switches)?;
                    return Ok(HomingOutcome::Obstructed);
                }
            }
            tick = tick.saturating_add(1);
        }
    }

    fn back_off<C: SerialChannel>(
        &self,
        link: &mut Link<C>,
        session: &mut Session,
        switches: &mut Switches,
    ) -> Result<()> {
        if switches.extend_limit().is_asserted() {
            debug!("already at extend limit; skipping back-off");
        } else {
            let away = codec::write_and_query(None, Some(-self.cfg.velocity));
            for _ in 0..self.cfg.recovery_ticks {
                if let Some(s) = link.exchange(&away, self.timing.control_period)? {
                    session.accept(&s, &self.window);
                }
            }
        }
        link.stop().wrap_err("homing recovery stop")?;
        let home = self.window.home_reference;
        link.rezero(home).wrap_err("homing recovery rezero")?;
        session.reset_to(home);
        Ok(())
    }
}
