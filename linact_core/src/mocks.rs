//! Test and helper mocks for linact_core.
//!
//! `ScriptedChannel` behaves like the bridge at the framing level: every
//! `8001` frame is answered with the next scripted reply (or the fallback),
//! every other frame with `OK\r\n`. Clones share state, so a test can keep
//! one handle for inspection after moving another into a `Link`.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use linact_traits::{SerialChannel, Switch};

use crate::codec::{self, ActuatorSample};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canned reply to one query frame.
#[derive(Debug, Clone)]
pub enum Reply {
    Sample(ActuatorSample),
    Raw(Vec<u8>),
    /// Nothing arrives (read returns 0 bytes).
    Silent,
}

impl Reply {
    pub fn sample(position: f32, velocity: f32, torque: f32) -> Self {
        Self::Sample(ActuatorSample {
            position,
            velocity,
            torque,
        })
    }

    fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Sample(s) => format!(
                "OK\r\nrcv 100 230301{}{}{}\r\n",
                codec::encode_f32(s.position),
                codec::encode_f32(s.velocity),
                codec::encode_f32(s.torque)
            )
            .into_bytes(),
            Self::Raw(b) => b.clone(),
            Self::Silent => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<Reply>,
    fallback: Option<Reply>,
    pending: Vec<u8>,
    written: Vec<String>,
    queries: usize,
    overlapped: u32,
    fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reply used once the script is exhausted (default: silence).
    pub fn with_fallback(self, reply: Reply) -> Self {
        self.lock().fallback = Some(reply);
        self
    }

    pub fn push(&self, reply: Reply) {
        self.lock().script.push_back(reply);
    }

    pub fn push_many(&self, replies: impl IntoIterator<Item = Reply>) {
        self.lock().script.extend(replies);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Lines written so far, newline stripped.
    pub fn written(&self) -> Vec<String> {
        self.lock().written.clone()
    }

    /// Number of `8001` frames written.
    pub fn queries(&self) -> usize {
        self.lock().queries
    }

    pub fn pending_bytes(&self) -> usize {
        self.lock().pending.len()
    }

    /// Writes issued while a previous reply was still unread.
    pub fn overlapped_writes(&self) -> u32 {
        self.lock().overlapped
    }
}

impl SerialChannel for ScriptedChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut g = self.lock();
        if g.fail_writes {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        if !g.pending.is_empty() {
            g.overlapped = g.overlapped.saturating_add(1);
        }
        let line = String::from_utf8_lossy(bytes).trim_end().to_string();
        let reply = if line.starts_with("can send 8001 ") {
            g.queries += 1;
            let next = g.script.pop_front().or_else(|| g.fallback.clone());
            next.map_or_else(Vec::new, |r| r.bytes())
        } else {
            b"OK\r\n".to_vec()
        };
        g.pending = reply;
        g.written.push(line);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let mut g = self.lock();
        let n = buf.len().min(g.pending.len());
        buf[..n].copy_from_slice(&g.pending[..n]);
        g.pending.drain(..n);
        Ok(n)
    }
}

/// Switch backed by a shared flag.
#[derive(Debug, Clone, Default)]
pub struct FlagSwitch {
    flag: Arc<AtomicBool>,
}

impl FlagSwitch {
    pub fn new(asserted: bool) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(asserted)),
        }
    }

    pub fn set(&self, asserted: bool) {
        self.flag.store(asserted, Ordering::Relaxed);
    }

    pub fn handle(&self) -> Arc<AtomicBool> {
        self.flag.clone()
    }
}

impl Switch for FlagSwitch {
    fn read(&mut self) -> Result<bool, BoxError> {
        Ok(self.flag.load(Ordering::Relaxed))
    }
}

/// Switch driven by a closure, for scripted sequences.
pub struct FnSwitch<F>(pub F);

impl<F> Switch for FnSwitch<F>
where
    F: FnMut() -> Result<bool, BoxError>,
{
    fn read(&mut self) -> Result<bool, BoxError> {
        (self.0)()
    }
}

/// Switch whose every read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSwitch;

impl Switch for FailingSwitch {
    fn read(&mut self) -> Result<bool, BoxError> {
        Err(Box::new(std::io::Error::other("switch read failed")))
    }
}
