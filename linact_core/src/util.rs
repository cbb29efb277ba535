//! Common time/period helpers for linact_core.
use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Number of ticks of `period` needed to cover `duration`, rounded up.
/// A zero period counts as 1 µs.
#[inline]
pub fn ticks_for(duration: Duration, period: Duration) -> u64 {
    let d = duration.as_micros();
    let p = period.as_micros().max(1);
    (d.div_ceil(p)).min(u128::from(u64::MAX)) as u64
}

/// Loop rate in Hz for a control period.
#[inline]
pub fn rate_hz(period: Duration) -> f64 {
    let us = period.as_micros().max(1) as f64;
    MICROS_PER_SEC as f64 / us
}
