//! Bridge and switch assembly: the simulator by default, serial + GPIO with
//! the `hardware` feature.
use std::str::FromStr;

use eyre::WrapErr;
use linact_config::Config;
use linact_core::{BridgeWorker, Controller, Switches};
use linact_hardware::{SimParams, SimulatedBridge, SimulatedSwitch};
use linact_traits::SerialChannel;

use crate::error_fmt::CommandError;

pub type Channel = Box<dyn SerialChannel + Send>;

pub struct Backend {
    pub channel: Channel,
    pub switches: Switches,
    /// Present when running against the simulator.
    pub sim: Option<SimulatedBridge>,
}

fn env_value<T>(key: &str) -> eyre::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CommandError::Config(format!("{key}={raw}: {e}")).into()),
        Err(_) => Ok(None),
    }
}

/// Simulator knobs from the environment:
/// `LINACT_SIM_JAM_AT`, `LINACT_SIM_GARBLE_EVERY`, `LINACT_SIM_START`,
/// `LINACT_SIM_SAFETY_OPEN`, `LINACT_SIM_ACTIVATE_EVERY`.
#[cfg_attr(feature = "hardware", allow(dead_code))]
pub fn simulated() -> eyre::Result<Backend> {
    let mut params = SimParams::default();
    if let Some(at) = env_value::<f32>("LINACT_SIM_JAM_AT")? {
        params.jam_at = Some(at);
    }
    if let Some(n) = env_value::<u32>("LINACT_SIM_GARBLE_EVERY")? {
        params.garble_every = Some(n);
    }
    if let Some(p) = env_value::<f32>("LINACT_SIM_START")? {
        params.start_position = p;
    }
    let safety_open = env_value::<u8>("LINACT_SIM_SAFETY_OPEN")?.is_some_and(|v| v != 0);
    let activate_every = env_value::<u32>("LINACT_SIM_ACTIVATE_EVERY")?.unwrap_or(3);
    tracing::info!(?params, safety_open, activate_every, "using simulated bridge");

    let bridge = SimulatedBridge::new(params);
    let switches = Switches::new(
        bridge.home_limit(),
        bridge.extend_limit(),
        SimulatedSwitch::pulsed(activate_every),
        SimulatedSwitch::manual(!safety_open).0,
    );
    Ok(Backend {
        channel: Box::new(bridge.clone()),
        switches,
        sim: Some(bridge),
    })
}

#[cfg(feature = "hardware")]
pub fn hardware(cfg: &Config) -> eyre::Result<Backend> {
    use std::time::Duration;

    let bridge = linact_hardware::SerialBridge::open(
        &cfg.serial.port,
        cfg.serial.baud,
        Duration::from_millis(cfg.serial.read_timeout_ms),
    )
    .wrap_err_with(|| format!("open serial bridge {}", cfg.serial.port))?;
    tracing::info!(port = %cfg.serial.port, baud = cfg.serial.baud, "serial bridge open");
    Ok(Backend {
        channel: Box::new(bridge),
        switches: gpio_switches(cfg)?,
        sim: None,
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn gpio_switches(cfg: &Config) -> eyre::Result<Switches> {
    use linact_hardware::GpioSwitch;

    let low = cfg.switches.active_low;
    let pin = |n: u8, name: &str| {
        GpioSwitch::new(n, low).wrap_err_with(|| format!("open {name} switch on GPIO {n}"))
    };
    Ok(Switches::new(
        pin(cfg.pins.home_limit, "home limit")?,
        pin(cfg.pins.extend_limit, "extend limit")?,
        pin(cfg.pins.activate, "activate")?,
        pin(cfg.pins.safety, "safety")?,
    ))
}

#[cfg(all(feature = "hardware", not(target_os = "linux")))]
fn gpio_switches(_cfg: &Config) -> eyre::Result<Switches> {
    eyre::bail!("GPIO switches are only supported on Linux")
}

/// Open the configured backend, optionally moving serial I/O onto its own thread.
pub fn open(cfg: &Config, io_thread: bool) -> eyre::Result<Backend> {
    #[cfg(feature = "hardware")]
    let backend = hardware(cfg)?;
    #[cfg(not(feature = "hardware"))]
    let backend = {
        let _ = cfg;
        simulated()?
    };
    if !io_thread {
        return Ok(backend);
    }
    tracing::debug!("serial I/O on worker thread");
    let Backend {
        channel,
        switches,
        sim,
    } = backend;
    Ok(Backend {
        channel: Box::new(BridgeWorker::spawn(channel)),
        switches,
        sim,
    })
}

pub fn controller(cfg: &Config, backend: Backend) -> eyre::Result<(Controller<Channel>, Option<SimulatedBridge>)> {
    let Backend {
        channel,
        switches,
        sim,
    } = backend;
    let controller = Controller::builder()
        .with_channel(channel)
        .with_switches(switches)
        .with_config(cfg)
        .build()
        .wrap_err("assemble controller")?;
    Ok((controller, sim))
}
