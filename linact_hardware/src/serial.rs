//! Serial-to-CAN bridge on a real tty (fdcanusb style ASCII protocol).
use std::io::{Read, Write};
use std::time::Duration;

use linact_traits::SerialChannel;
use tracing::{debug, trace};

use crate::error::{HwError, Result};

pub struct SerialBridge {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialBridge {
    /// Open `path` as 8N1 without flow control. `read_timeout` bounds each
    /// `read`; a timeout yields zero bytes rather than an error.
    pub fn open(path: &str, baud: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(|e| HwError::Serial(format!("{path}: {e}")))?;
        debug!(path, baud, "serial bridge opened");
        Ok(Self { port })
    }
}

impl SerialChannel for SerialBridge {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        trace!(len = bytes.len(), "serial tx");
        self.port.write_all(bytes).map_err(HwError::from)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        match self.port.read(buf) {
            Ok(n) => {
                trace!(n, "serial rx");
                Ok(n)
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Box::new(HwError::from(e))),
        }
    }
}
