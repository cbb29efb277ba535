//! The four switch inputs, read fresh on every use.
use linact_traits::Switch;
use tracing::warn;

/// Tri-state reading of one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Asserted,
    Released,
    /// The read itself failed.
    Fault,
}

impl SwitchState {
    /// A fault never counts as asserted.
    pub fn is_asserted(self) -> bool {
        matches!(self, Self::Asserted)
    }
}

pub fn read_switch(switch: &mut dyn Switch, name: &'static str) -> SwitchState {
    match switch.read() {
        Ok(true) => SwitchState::Asserted,
        Ok(false) => SwitchState::Released,
        Err(e) => {
            warn!(switch = name, error = %e, "switch read failed");
            SwitchState::Fault
        }
    }
}

pub struct Switches {
    pub home_limit: Box<dyn Switch>,
    pub extend_limit: Box<dyn Switch>,
    pub activate: Box<dyn Switch>,
    /// Interlock; asserted means safe to move.
    pub safety: Box<dyn Switch>,
}

impl Switches {
    pub fn new(
        home_limit: impl Switch + 'static,
        extend_limit: impl Switch + 'static,
        activate: impl Switch + 'static,
        safety: impl Switch + 'static,
    ) -> Self {
        Self {
            home_limit: Box::new(home_limit),
            extend_limit: Box::new(extend_limit),
            activate: Box::new(activate),
            safety: Box::new(safety),
        }
    }

    pub fn home_limit(&mut self) -> SwitchState {
        read_switch(self.home_limit.as_mut(), "home_limit")
    }

    pub fn extend_limit(&mut self) -> SwitchState {
        read_switch(self.extend_limit.as_mut(), "extend_limit")
    }

    pub fn activate(&mut self) -> SwitchState {
        read_switch(self.activate.as_mut(), "activate")
    }

    pub fn safety(&mut self) -> SwitchState {
        read_switch(self.safety.as_mut(), "safety")
    }

    /// Safe only when the interlock reads asserted; a fault is not safe.
    pub fn safety_ok(&mut self) -> bool {
        self.safety().is_asserted()
    }
}

impl std::fmt::Debug for Switches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switches").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{FailingSwitch, FlagSwitch};

    #[test]
    fn fault_is_not_safe() {
        let mut sw = Switches::new(
            FlagSwitch::new(false),
            FlagSwitch::new(false),
            FlagSwitch::new(false),
            FailingSwitch,
        );
        assert_eq!(sw.safety(), SwitchState::Fault);
        assert!(!sw.safety_ok());
    }
}
