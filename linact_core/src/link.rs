//! One-frame-in-flight transport over a `SerialChannel`.
//!
//! Every write is paired with exactly one read before the next write:
//! `exchange` reads the query reply, `send` and `write_only` drain the
//! bridge's acknowledgement.
use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use linact_traits::{Clock, SerialChannel};
use tracing::trace;

use crate::codec::{self, ActuatorSample, CommandFrame};
use crate::error::Result;
use crate::hw_error::map_hw_error;

pub const RX_BUFFER_LEN: usize = 256;

pub struct Link<C> {
    channel: C,
    clock: Arc<dyn Clock + Send + Sync>,
    buf: [u8; RX_BUFFER_LEN],
    settle: Duration,
    frames: u64,
    parse_failures: u64,
}

impl<C: SerialChannel> Link<C> {
    pub fn new(channel: C, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            channel,
            clock,
            buf: [0; RX_BUFFER_LEN],
            settle: Duration::from_micros(100),
            frames: 0,
            parse_failures: 0,
        }
    }

    /// Wait before draining acknowledgements of `send`/`write_only`.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Frames written so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames
    }

    /// Replies that failed to decode.
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures
    }

    fn write(&mut self, frame: &CommandFrame) -> Result<()> {
        trace!(frame = %frame, "tx");
        self.channel
            .write(frame.as_bytes())
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("writing `{frame}`"))?;
        self.frames = self.frames.saturating_add(1);
        Ok(())
    }

    fn read_once(&mut self) -> Result<usize> {
        self.channel
            .read(&mut self.buf)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("reading bridge reply")
    }

    /// Write `frame`, sleep `wait`, read once and decode. A reply that does
    /// not decode is `Ok(None)`: the tick simply has no sample.
    pub fn exchange(&mut self, frame: &CommandFrame, wait: Duration) -> Result<Option<ActuatorSample>> {
        self.write(frame)?;
        self.clock.sleep(wait);
        let n = self.read_once()?;
        match codec::decode_reply(&self.buf[..n]) {
            Ok(sample) => {
                trace!(
                    position = sample.position,
                    velocity = sample.velocity,
                    torque = sample.torque,
                    "rx"
                );
                Ok(Some(sample))
            }
            Err(e) => {
                self.parse_failures = self.parse_failures.saturating_add(1);
                trace!(error = %e, len = n, "reply discarded");
                Ok(None)
            }
        }
    }

    /// Simple command (stop, brake, rezero); the acknowledgement is drained.
    pub fn send(&mut self, frame: &CommandFrame) -> Result<()> {
        self.write(frame)?;
        self.clock.sleep(self.settle);
        self.read_once()?;
        Ok(())
    }

    /// Write-only motion command; whatever the bridge replies is discarded.
    pub fn write_only(&mut self, position: Option<f32>, velocity: Option<f32>) -> Result<()> {
        self.send(&codec::write_only(position, velocity))
    }

    /// Drain stale bytes.
    pub fn clear(&mut self) -> Result<usize> {
        self.read_once()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.send(&codec::stop())
    }

    pub fn brake(&mut self) -> Result<()> {
        self.send(&codec::brake())
    }

    pub fn rezero(&mut self, position: f32) -> Result<()> {
        self.send(&codec::rezero(position))
    }

    /// Give the channel back, e.g. to reopen it elsewhere.
    pub fn into_inner(self) -> C {
        self.channel
    }
}
