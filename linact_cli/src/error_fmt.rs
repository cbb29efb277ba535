//! Human-readable error descriptions, stable exit codes and structured JSON errors.

use linact_core::error::{ActuatorError, BuildError};
use linact_core::{FrameParseError, HomingOutcome};
use linact_hardware::error::HwError;

/// Failures decided by the CLI itself rather than bubbled up from a crate.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("homing did not reach the home switch ({0:?})")]
    HomingFailed(HomingOutcome),
    #[error("{phase} stopped on an obstruction")]
    Obstructed { phase: &'static str },
    #[error("no valid sample after {0} queries")]
    NoSample(u32),
}

/// First error of type `T` anywhere in the chain.
fn find<T: std::error::Error + Send + Sync + 'static>(err: &eyre::Report) -> Option<&T> {
    err.downcast_ref::<T>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<T>()))
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = find::<CommandError>(err) {
        return match ce {
            CommandError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `linact self-check`."
            ),
            CommandError::HomingFailed(HomingOutcome::TimedOut) => {
                "What happened: Homing ran out of ticks before the home switch asserted.\nLikely causes: homing.max_ticks too low, homing velocity too small, or a dead home-limit switch.\nHow to fix: Check the home-limit wiring and raise homing.max_ticks (0 = unbounded).".to_string()
            }
            CommandError::HomingFailed(_) => {
                "What happened: Homing stalled before the home switch asserted.\nLikely causes: Something blocks the travel toward home, or the home-limit switch never closes.\nHow to fix: Clear the path, check the home-limit switch, then run `linact home` again.".to_string()
            }
            CommandError::Obstructed { phase } => format!(
                "What happened: The {phase} motion detected a torque stall and backed off.\nLikely causes: A mechanical obstruction, or a stall threshold set too low for the load.\nHow to fix: Clear the obstruction, or raise motion.forward/reverse.stall_torque_threshold."
            ),
            CommandError::NoSample(n) => format!(
                "What happened: None of {n} queries returned a usable sample.\nLikely causes: The actuator is unpowered, the CAN side is disconnected, or the reported position lies outside the window.\nHow to fix: Power-cycle the actuator, check the bridge, and review [window]."
            ),
        };
    }

    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::MissingChannel => {
                "What happened: No serial channel was provided to the controller.\nLikely causes: The bridge failed to open or was not wired into the builder.\nHow to fix: Ensure the bridge opens and is passed via with_channel(...).".to_string()
            }
            BuildError::MissingSwitches => {
                "What happened: No switch inputs were provided to the controller.\nLikely causes: GPIO setup failed or was skipped.\nHow to fix: Ensure the four switches are created and passed via with_switches(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Inconsistent motion or window values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ae) = find::<ActuatorError>(err) {
        return match ae {
            ActuatorError::Io(msg) => format!(
                "What happened: Serial I/O with the bridge failed ({msg}).\nLikely causes: Adapter unplugged, wrong serial.port, or another process holds the port.\nHow to fix: Check the cable and serial.port, then retry."
            ),
            ActuatorError::Hardware(msg) => format!(
                "What happened: A hardware input failed ({msg}).\nLikely causes: Wrong [pins] values or missing GPIO permissions.\nHow to fix: Fix [pins] and ensure access to the GPIO device."
            ),
            ActuatorError::Config(msg) => format!(
                "What happened: Invalid setting ({msg}).\nLikely causes: A value outside its allowed range.\nHow to fix: Correct the value and rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(hw) = find::<HwError>(err) {
        return format!(
            "What happened: Device setup failed ({hw}).\nLikely causes: Wrong serial.port or [pins], or insufficient permissions.\nHow to fix: Fix the config; ensure the user may open the serial port (dialout group) and GPIO."
        );
    }

    if let Some(fe) = find::<FrameParseError>(err) {
        return format!(
            "What happened: A bridge reply could not be decoded ({fe}).\nLikely causes: Noise on the line or a bridge firmware mismatch.\nHow to fix: Retry; if persistent, check the bridge firmware."
        );
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 1 generic, 2 serial I/O, 3 configuration, 4 homing failed, 5 obstruction.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match find::<CommandError>(err) {
        Some(CommandError::Config(_)) => return 3,
        Some(CommandError::HomingFailed(_)) => return 4,
        Some(CommandError::Obstructed { .. }) => return 5,
        Some(CommandError::NoSample(_)) => return 2,
        None => {}
    }
    if find::<BuildError>(err).is_some() {
        return 3;
    }
    match find::<ActuatorError>(err) {
        Some(ActuatorError::Config(_)) => return 3,
        Some(ActuatorError::Io(_) | ActuatorError::Hardware(_)) => return 2,
        _ => {}
    }
    if find::<HwError>(err).is_some() {
        return 2;
    }
    1
}

/// Stable machine-readable name for the failure class.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        2 => "SerialIo",
        3 => "Config",
        4 => "HomingFailed",
        5 => "Obstructed",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match find::<CommandError>(err) {
        Some(CommandError::HomingFailed(outcome)) => Some(json!({ "outcome": format!("{outcome:?}") })),
        Some(CommandError::Obstructed { phase }) => Some(json!({ "phase": phase })),
        Some(CommandError::NoSample(n)) => Some(json!({ "attempts": n })),
        _ => None,
    };
    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(d) = details {
        obj["details"] = d;
    }
    obj.to_string()
}
