//! Error types for the simulation harness.

use senate_core::BusError;
use senate_env::EnvError;
use thiserror::Error;

/// Errors raised while configuring or driving a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The bus could not be built
    #[error(transparent)]
    Bus(#[from] BusError),

    /// The environment refused an operation
    #[error(transparent)]
    Env(#[from] EnvError),

    /// The async runtime could not be started
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl SimError {
    /// Creates an invalid-configuration error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
