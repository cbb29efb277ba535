//! Push-button and limit inputs on Raspberry Pi GPIO.
use linact_traits::Switch;
use rppal::gpio::{Gpio, InputPin};

use crate::error::{HwError, Result};

/// Input with the internal pull-up enabled. With `active_low` the switch
/// reads as asserted when the line is pulled to ground.
pub struct GpioSwitch {
    pin: InputPin,
    active_low: bool,
}

impl GpioSwitch {
    pub fn new(bcm_pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HwError::Gpio(format!("pin {bcm_pin}: {e}")))?
            .into_input_pullup();
        Ok(Self { pin, active_low })
    }
}

impl Switch for GpioSwitch {
    fn read(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.pin.is_high() != self.active_low)
    }
}
