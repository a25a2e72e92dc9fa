//! Common types for the Senate Bus environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of one passenger.
///
/// Used for logging and for matching a passenger against the bus's waiting
/// record. Never used for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassengerId(pub Uuid);

impl PassengerId {
    /// Creates a new random PassengerId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic PassengerId from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }}

impl Default for PassengerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PassengerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passenger_id_from_seed_is_stable() {
        assert_eq!(PassengerId::from_seed(7), PassengerId::from_seed(7));
        assert_ne!(PassengerId::from_seed(7), PassengerId::from_seed(8));
    }

    #[test]
    fn test_passenger_id_display_is_short() {
        let id = PassengerId::new();
        assert_eq!(id.to_string().len(), 8);
    }
}
