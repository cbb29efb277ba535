//! Maps `Box<dyn Error>` from trait boundaries to typed `ActuatorError`.
//!
//! The traits in `linact_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `linact_hardware::HwError` downcasting.

use crate::error::ActuatorError;

/// Map a trait-boundary error to a typed `ActuatorError`.
///
/// Already-typed errors pass through, known hardware errors are downcast,
/// anything else falls back to string heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ActuatorError {
    if let Some(typed) = e.downcast_ref::<ActuatorError>() {
        return typed.clone();
    }

    #[cfg(feature = "hardware-errors")]
    {
        use linact_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Gpio(msg) => ActuatorError::Hardware(msg.clone()),
                HwError::Timeout => ActuatorError::Hardware(hw.to_string()),
                HwError::Serial(_) | HwError::Io(_) | HwError::Closed => {
                    ActuatorError::Io(hw.to_string())
                }
            };
        }
    }

    if e.downcast_ref::<std::io::Error>().is_some() {
        return ActuatorError::Io(e.to_string());
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("serial") || lower.contains("i/o") || lower.contains("broken pipe") {
        ActuatorError::Io(s)
    } else {
        ActuatorError::Hardware(s)
    }
}
