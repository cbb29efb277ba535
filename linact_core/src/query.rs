//! Bare position/velocity/torque queries.
use linact_traits::SerialChannel;
use tracing::debug;

use crate::codec::{self, ActuatorSample};
use crate::config::PositionWindow;
use crate::error::Result;
use crate::link::Link;

/// Attempts made by `valid_query` before giving up.
pub const VALID_QUERY_ATTEMPTS: u32 = 5;

/// Up to `VALID_QUERY_ATTEMPTS` queries; the first in-window sample wins.
/// `Ok(None)` when every attempt was garbled or out of window.
pub fn valid_query<C: SerialChannel>(
    link: &mut Link<C>,
    window: &PositionWindow,
    query_period: std::time::Duration,
) -> Result<Option<ActuatorSample>> {
    for attempt in 1..=VALID_QUERY_ATTEMPTS {
        if let Some(s) = link.exchange(&codec::query_only(), query_period)?
            && window.contains(s.position)
        {
            return Ok(Some(s));
        }
        debug!(attempt, "query produced no valid sample");
    }
    Ok(None)
}

/// Three queries, then the first in-window sample among them; repeats
/// until one qualifies. Blocks for as long as feedback stays invalid.
pub fn triple_query<C: SerialChannel>(
    link: &mut Link<C>,
    window: &PositionWindow,
    query_period: std::time::Duration,
) -> Result<ActuatorSample> {
    let frame = codec::query_only();
    loop {
        let mut batch = [None; 3];
        for slot in &mut batch {
            *slot = link.exchange(&frame, query_period)?;
        }
        if let Some(s) = batch
            .into_iter()
            .flatten()
            .find(|s| window.contains(s.position))
        {
            return Ok(s);
        }
        debug!("triple query produced no valid sample, retrying");
    }
}
