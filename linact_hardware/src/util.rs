use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Poll `read` until it reports `level` or `timeout` expires. Read errors
/// are returned immediately.
pub fn wait_for_level(
    mut read: impl FnMut() -> Result<bool>,
    level: bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while read()? != level {
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
