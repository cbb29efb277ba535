use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ActuatorError {
    /// Channel open/read/write failure. Fatal for the session.
    #[error("serial i/o error: {0}")]
    Io(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing serial channel")]
    MissingChannel,
    #[error("missing switches")]
    MissingSwitches,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
