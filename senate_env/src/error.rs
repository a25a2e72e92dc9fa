//! Error types for the Senate Bus environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// A worker pool no longer accepts work (shut down)
    #[error("Worker pool closed: {0}")]
    PoolClosed(String),
}

impl EnvError {
    /// Creates a pool-closed error.
    pub fn pool_closed(msg: impl Into<String>) -> Self {
        Self::PoolClosed(msg.into())
    }
}
