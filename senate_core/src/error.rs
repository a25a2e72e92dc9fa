//! Error types for bus construction.

use thiserror::Error;

/// Errors raised when building a bus.
///
/// The boarding protocol itself never fails: callers either board, wait, or
/// are cancelled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// A bus must seat at least one passenger
    #[error("Invalid bus capacity: {0} (must be at least 1)")]
    InvalidCapacity(usize),
}
