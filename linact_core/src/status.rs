use std::fmt;

/// Operational state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationalState {
    #[default]
    Initial,
    WaitingToHome,
    Homing,
    Homed,
    WaitingToExtend,
    Extending,
    Extended,
    Sheathing,
    ExtendError,
    SafetyLockout,
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::WaitingToHome => "waiting_to_home",
            Self::Homing => "homing",
            Self::Homed => "homed",
            Self::WaitingToExtend => "waiting_to_extend",
            Self::Extending => "extending",
            Self::Extended => "extended",
            Self::Sheathing => "sheathing",
            Self::ExtendError => "extend_error",
            Self::SafetyLockout => "safety_lockout",
        };
        f.write_str(s)
    }
}

/// Result of a cruise phase or a full profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// A stall fired; the recovery burst has already run.
    Obstructed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingOutcome {
    Homed,
    /// Torque stall before the home switch; recovery has already run.
    Obstructed,
    /// Tick budget exhausted.
    TimedOut,
}

impl HomingOutcome {
    pub fn is_homed(self) -> bool {
        matches!(self, Self::Homed)
    }
}
