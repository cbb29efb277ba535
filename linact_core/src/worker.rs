//! Serial I/O on its own thread.
//!
//! `BridgeWorker::spawn` moves a channel onto a dedicated thread and returns
//! a `WorkerChannel` that implements `SerialChannel` by forwarding requests
//! over single-slot queues. The one-frame-in-flight rule is enforced here:
//! a second `write` before the matching `read` is a protocol error.
//!
//! The worker thread is shut down and joined when the `WorkerChannel` drops.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use linact_traits::SerialChannel;

use crate::error::ActuatorError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

enum Request {
    Write(Vec<u8>),
    Read(usize),
}

enum Response {
    Written,
    Data(Vec<u8>),
    Failed(BoxError),
}

pub struct BridgeWorker {
    tx: Option<xch::Sender<Request>>,
    rx: xch::Receiver<Response>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl BridgeWorker {
    pub fn spawn<C: SerialChannel + Send + 'static>(mut channel: C) -> WorkerChannel {
        let (req_tx, req_rx) = xch::bounded::<Request>(1);
        let (resp_tx, resp_rx) = xch::bounded::<Response>(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            // Exits when the request sender is dropped.
            for req in req_rx.iter() {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                let resp = match req {
                    Request::Write(bytes) => match channel.write(&bytes) {
                        Ok(()) => Response::Written,
                        Err(e) => Response::Failed(e),
                    },
                    Request::Read(len) => {
                        let mut buf = vec![0u8; len];
                        match channel.read(&mut buf) {
                            Ok(n) => {
                                buf.truncate(n);
                                Response::Data(buf)
                            }
                            Err(e) => Response::Failed(e),
                        }
                    }
                };
                if resp_tx.send(resp).is_err() {
                    tracing::debug!("bridge worker consumer disconnected, exiting thread");
                    break;
                }
            }
            tracing::trace!("bridge worker thread exiting cleanly");
        });

        WorkerChannel {
            worker: Self {
                tx: Some(req_tx),
                rx: resp_rx,
                shutdown,
                join_handle: Some(join_handle),
            },
            awaiting_read: false,
        }
    }

    fn call(&self, req: Request) -> Result<Response, BoxError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ActuatorError::Io("bridge worker stopped".into()))?;
        tx.send(req)
            .map_err(|_| ActuatorError::Io("bridge worker thread gone".into()))?;
        let resp = self
            .rx
            .recv()
            .map_err(|_| ActuatorError::Io("bridge worker thread gone".into()))?;
        Ok(resp)
    }
}

impl Drop for BridgeWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Disconnect the request queue so a blocked `iter()` returns.
        self.tx.take();
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("bridge worker joined"),
                Err(e) => tracing::warn!(?e, "bridge worker panicked during shutdown"),
            }
        }
    }
}

/// `SerialChannel` front end of a `BridgeWorker`.
pub struct WorkerChannel {
    worker: BridgeWorker,
    awaiting_read: bool,
}

impl SerialChannel for WorkerChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        if self.awaiting_read {
            return Err(Box::new(ActuatorError::Protocol(
                "write issued before the previous reply was read".into(),
            )));
        }
        match self.worker.call(Request::Write(bytes.to_vec()))? {
            Response::Written => {
                self.awaiting_read = true;
                Ok(())
            }
            Response::Failed(e) => Err(e),
            Response::Data(_) => Err(Box::new(ActuatorError::Protocol(
                "unexpected data response to write".into(),
            ))),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        self.awaiting_read = false;
        match self.worker.call(Request::Read(buf.len()))? {
            Response::Data(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Response::Failed(e) => Err(e),
            Response::Written => Err(Box::new(ActuatorError::Protocol(
                "unexpected write response to read".into(),
            ))),
        }
    }
}
