//! Mutable working state of a run.
use crate::codec::ActuatorSample;
use crate::config::PositionWindow;
use crate::status::OperationalState;

/// Owned by the `Controller`; phases borrow it mutably.
#[derive(Debug, Clone)]
pub struct Session {
    /// Last position actually transmitted.
    pub commanded_position: f32,
    /// Last feedback position that passed the window gate.
    pub current_position: f32,
    torque_trace: Vec<f32>,
    pub state: OperationalState,
    /// Set when a stall fired during the current extend/sheath cycle.
    pub obstructed: bool,
    /// Last accepted feedback position when the most recent profile
    /// finished decelerating, before any rezero.
    pub last_phase_end: Option<f32>,
    discarded: u64,
}

impl Session {
    pub fn new(home_reference: f32) -> Self {
        Self {
            commanded_position: home_reference,
            current_position: home_reference,
            torque_trace: Vec::new(),
            state: OperationalState::Initial,
            obstructed: false,
            last_phase_end: None,
            discarded: 0,
        }
    }

    /// Window gate: an in-window sample updates `current_position` and
    /// appends its torque; anything else leaves both untouched.
    pub fn accept(&mut self, sample: &ActuatorSample, window: &PositionWindow) -> bool {
        if window.contains(sample.position) {
            self.current_position = sample.position;
            self.torque_trace.push(sample.torque);
            true
        } else {
            self.discarded = self.discarded.saturating_add(1);
            false
        }
    }

    /// Recovery-burst sample: its torque is always traced, the position
    /// only when it passes the window gate.
    pub fn record_recovery(&mut self, sample: &ActuatorSample, window: &PositionWindow) {
        self.torque_trace.push(sample.torque);
        if window.contains(sample.position) {
            self.current_position = sample.position;
        } else {
            self.discarded = self.discarded.saturating_add(1);
        }
    }

    /// Both positions to `position`, e.g. after a rezero.
    pub fn reset_to(&mut self, position: f32) {
        self.commanded_position = position;
        self.current_position = position;
    }

    pub fn torque_trace(&self) -> &[f32] {
        &self.torque_trace
    }

    /// Out-of-window samples dropped so far.
    pub fn discarded_samples(&self) -> u64 {
        self.discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(position: f32, torque: f32) -> ActuatorSample {
        ActuatorSample {
            position,
            velocity: 0.0,
            torque,
        }
    }

    #[test]
    fn out_of_window_sample_leaves_state_stale() {
        let w = PositionWindow::default();
        let mut s = Session::new(500.0);
        assert!(s.accept(&sample(490.0, 0.1), &w));
        assert!(!s.accept(&sample(1.0e9, 0.9), &w));
        assert!(!s.accept(&sample(f32::NAN, 0.9), &w));
        assert_eq!(s.current_position, 490.0);
        assert_eq!(s.torque_trace(), &[0.1]);
        assert_eq!(s.discarded_samples(), 2);
    }

    #[test]
    fn recovery_torque_is_traced_even_out_of_window() {
        let w = PositionWindow::default();
        let mut s = Session::new(500.0);
        s.record_recovery(&sample(501.0, 0.3), &w);
        s.record_recovery(&sample(-7.0e6, 0.4), &w);
        assert_eq!(s.torque_trace(), &[0.3, 0.4]);
        assert_eq!(s.current_position, 501.0);
        assert_eq!(s.discarded_samples(), 1);
    }
}
