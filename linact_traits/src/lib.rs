//! Capability traits at the hardware seam.
//!
//! The core never touches a port or a GPIO line directly; it talks to a
//! `SerialChannel` for the bridge and to `Switch` inputs for the limit,
//! activate and safety buttons.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Byte-oriented channel to the serial-to-CAN bridge.
pub trait SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Single read into `buf`; returns the number of bytes received (may be 0).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: SerialChannel + ?Sized> SerialChannel for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(bytes)
    }
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read(buf)
    }
}

/// A polled digital input. `Ok(true)` means the switch is asserted
/// (pressed / engaged), independent of the electrical polarity.
pub trait Switch {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Switch + ?Sized> Switch for Box<T> {
    fn read(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read()
    }
}
