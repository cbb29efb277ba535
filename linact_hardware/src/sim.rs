//! In-process stand-in for the serial-to-CAN bridge and the actuator behind it.
//!
//! The simulator parses `can send` lines the way the bridge does, applies the
//! commanded position/velocity to a one-dimensional actuator with two hard
//! stops, and queues the bridge's ASCII reply for the next `read`. Limit
//! switches are derived from the physical position, so rezeroing the
//! controller never moves them.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use linact_traits::{SerialChannel, Switch};
use tracing::trace;

use crate::error::HwError;

const ACK: &str = "OK\r\n";
// Reply to a 3-register float32 read starting at register 0x01.
const REPLY_HEADER: &str = "rcv 100 230301";
const WRITE_PREFIX: &str = "01000a0c0220";
const QUERY_SUFFIX: &str = "1c0301";
const REZERO_PREFIX: &str = "0db102";
const STOP_PAYLOAD: &str = "010000";
const BRAKE_PAYLOAD: &str = "01000f";

/// Mechanical and fault-injection parameters of the simulated actuator.
/// Positions are physical coordinates; "home" is the larger value.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub start_position: f32,
    /// Hard stop beyond the home switch.
    pub home_stop: f32,
    /// Hard stop beyond the extend switch.
    pub extend_stop: f32,
    /// Home-limit switch asserts at or above this position.
    pub home_switch_at: f32,
    /// Extend-limit switch asserts at or below this position.
    pub extend_switch_at: f32,
    /// Seconds of motion represented by one velocity-mode command.
    pub tick_s: f32,
    pub idle_torque: f32,
    pub moving_torque: f32,
    pub jam_torque: f32,
    /// Obstacle that blocks extension past this physical position.
    pub jam_at: Option<f32>,
    /// Corrupt every n-th query reply (non-hex position field).
    pub garble_every: Option<u32>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            start_position: 500.0,
            home_stop: 500.3,
            extend_stop: 470.0,
            home_switch_at: 500.0,
            extend_switch_at: 479.6,
            tick_s: 0.0012,
            idle_torque: 0.01,
            moving_torque: 0.05,
            jam_torque: 0.9,
            jam_at: None,
            garble_every: None,
        }
    }
}

#[derive(Debug)]
struct SimState {
    params: SimParams,
    physical: f32,
    // reported = physical + offset
    offset: f32,
    velocity: f32,
    torque: f32,
    pending: VecDeque<u8>,
    frames: u32,
    query_replies: u32,
    overlapped_writes: u32,
    history: Vec<String>,
}

impl SimState {
    fn reported(&self) -> f32 {
        self.physical + self.offset
    }

    fn apply(&mut self, position: f32, velocity: f32) {
        let before = self.physical;
        let wanted = if position.is_finite() {
            position - self.offset
        } else if velocity.is_finite() {
            before + velocity * self.params.tick_s
        } else {
            before
        };
        let mut target = wanted.clamp(self.params.extend_stop, self.params.home_stop);
        let mut jammed = target != wanted;
        if let Some(j) = self.params.jam_at
            && before >= j
            && target < j
        {
            target = j;
            jammed = true;
        }
        self.velocity = if velocity.is_finite() {
            velocity
        } else {
            (target - before) / self.params.tick_s
        };
        self.torque = if jammed {
            self.params.jam_torque
        } else if (target - before).abs() > 1e-6 {
            self.params.moving_torque
        } else {
            self.params.idle_torque
        };
        self.physical = target;
    }

    fn handle_line(&mut self, line: &str) {
        self.frames = self.frames.wrapping_add(1);
        self.history.push(line.to_string());
        let mut parts = line.split_whitespace();
        let (Some("can"), Some("send"), Some(id), Some(payload)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            self.queue("ERR unknown command\r\n");
            return;
        };
        match id {
            "0001" => {
                if payload == STOP_PAYLOAD || payload == BRAKE_PAYLOAD {
                    self.velocity = 0.0;
                    self.torque = self.params.idle_torque;
                } else if let Some(hex) = payload.strip_prefix(REZERO_PREFIX)
                    && let Some(p) = parse_f32(hex)
                {
                    self.offset = p - self.physical;
                }
                self.queue(ACK);
            }
            "01" => {
                if let Some((p, v)) = parse_pair(payload) {
                    self.apply(p, v);
                }
                self.queue(ACK);
            }
            "8001" => {
                if payload != QUERY_SUFFIX
                    && let Some((p, v)) = parse_pair(payload)
                {
                    self.apply(p, v);
                }
                self.query_replies = self.query_replies.wrapping_add(1);
                let garble = self
                    .params
                    .garble_every
                    .is_some_and(|n| n > 0 && self.query_replies % n == 0);
                let pos_hex = if garble {
                    "zzzzzzzz".to_string()
                } else {
                    hex_f32(self.reported())
                };
                let reply = format!(
                    "{ACK}{REPLY_HEADER}{pos_hex}{}{}\r\n",
                    hex_f32(self.velocity),
                    hex_f32(self.torque)
                );
                self.queue(&reply);
            }
            _ => self.queue("ERR unknown id\r\n"),
        }
    }

    fn queue(&mut self, s: &str) {
        self.pending.extend(s.bytes());
    }
}

fn hex_f32(v: f32) -> String {
    v.to_le_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_f32(hex: &str) -> Option<f32> {
    let field = hex.get(..8)?;
    let bits = u32::from_str_radix(field, 16).ok()?;
    Some(f32::from_bits(bits.swap_bytes()))
}

fn parse_pair(payload: &str) -> Option<(f32, f32)> {
    let floats = payload.strip_prefix(WRITE_PREFIX)?;
    Some((parse_f32(floats.get(..8)?)?, parse_f32(floats.get(8..16)?)?))
}

/// Simulated bridge. Cloning yields another handle onto the same actuator.
#[derive(Debug, Clone)]
pub struct SimulatedBridge {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new(SimParams::default())
    }
}

impl SimulatedBridge {
    pub fn new(params: SimParams) -> Self {
        let physical = params.start_position;
        Self {
            state: Arc::new(Mutex::new(SimState {
                params,
                physical,
                offset: 0.0,
                velocity: 0.0,
                torque: 0.0,
                pending: VecDeque::new(),
                frames: 0,
                query_replies: 0,
                overlapped_writes: 0,
                history: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, HwError> {
        self.state
            .lock()
            .map_err(|_| HwError::Serial("simulator state poisoned".into()))
    }

    /// Physical position (unaffected by rezero).
    pub fn physical_position(&self) -> f32 {
        self.lock().map(|s| s.physical).unwrap_or(f32::NAN)
    }

    /// Position as the controller would report it.
    pub fn reported_position(&self) -> f32 {
        self.lock().map(|s| s.reported()).unwrap_or(f32::NAN)
    }

    /// Number of frames written so far.
    pub fn frames(&self) -> u32 {
        self.lock().map(|s| s.frames).unwrap_or(0)
    }

    /// Writes issued while a previous reply was still undrained.
    pub fn overlapped_writes(&self) -> u32 {
        self.lock().map(|s| s.overlapped_writes).unwrap_or(0)
    }

    /// Every line received, newline stripped.
    pub fn history(&self) -> Vec<String> {
        self.lock().map(|s| s.history.clone()).unwrap_or_default()
    }

    /// Move or remove the obstacle.
    pub fn set_jam(&self, jam_at: Option<f32>) {
        if let Ok(mut s) = self.lock() {
            s.params.jam_at = jam_at;
        }
    }

    pub fn home_limit(&self) -> SimulatedSwitch {
        SimulatedSwitch {
            source: Source::HomeLimit(self.state.clone()),
        }
    }

    pub fn extend_limit(&self) -> SimulatedSwitch {
        SimulatedSwitch {
            source: Source::ExtendLimit(self.state.clone()),
        }
    }
}

impl SerialChannel for SimulatedBridge {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.lock()?;
        if !s.pending.is_empty() {
            s.overlapped_writes = s.overlapped_writes.saturating_add(1);
            tracing::warn!(pending = s.pending.len(), "write with undrained reply");
        }
        let text = std::str::from_utf8(bytes).map_err(|e| HwError::Serial(e.to_string()))?;
        for line in text.split('\n').filter(|l| !l.trim().is_empty()) {
            trace!(line, "sim rx");
            s.handle_line(line.trim_end());
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let mut s = self.lock()?;
        let n = buf.len().min(s.pending.len());
        for (dst, src) in buf.iter_mut().zip(s.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

#[derive(Debug)]
enum Source {
    Manual(Arc<AtomicBool>),
    HomeLimit(Arc<Mutex<SimState>>),
    ExtendLimit(Arc<Mutex<SimState>>),
    /// Asserted on every `every`-th read.
    Pulsed { every: u32, reads: u32 },
    Faulty,
}

/// Simulated digital input.
#[derive(Debug)]
pub struct SimulatedSwitch {
    source: Source,
}

/// Remote control for a manual `SimulatedSwitch`.
#[derive(Debug, Clone)]
pub struct SwitchHandle(Arc<AtomicBool>);

impl SwitchHandle {
    pub fn set(&self, asserted: bool) {
        self.0.store(asserted, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl SimulatedSwitch {
    pub fn manual(asserted: bool) -> (Self, SwitchHandle) {
        let flag = Arc::new(AtomicBool::new(asserted));
        (
            Self {
                source: Source::Manual(flag.clone()),
            },
            SwitchHandle(flag),
        )
    }

    pub fn pulsed(every: u32) -> Self {
        Self {
            source: Source::Pulsed {
                every: every.max(1),
                reads: 0,
            },
        }
    }

    pub fn faulty() -> Self {
        Self {
            source: Source::Faulty,
        }
    }
}

impl Switch for SimulatedSwitch {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        match &mut self.source {
            Source::Manual(flag) => Ok(flag.load(Ordering::Relaxed)),
            Source::HomeLimit(state) => {
                let s = state
                    .lock()
                    .map_err(|_| HwError::Gpio("simulator state poisoned".into()))?;
                Ok(s.physical >= s.params.home_switch_at)
            }
            Source::ExtendLimit(state) => {
                let s = state
                    .lock()
                    .map_err(|_| HwError::Gpio("simulator state poisoned".into()))?;
                Ok(s.physical <= s.params.extend_switch_at)
            }
            Source::Pulsed { every, reads } => {
                *reads = reads.wrapping_add(1);
                Ok(*reads % *every == 0)
            }
            Source::Faulty => Err(Box::new(HwError::Gpio("line read failed".into()))),
        }
    }
}
