//! Core environment context trait for bus and passenger actors.

use async_trait::async_trait;
use rand::RngCore;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the arrival generators and
/// passenger actors can run against the wall clock or against a virtual clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, entropy-seeded RNG
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism (time,
/// randomness) are controlled by the implementation.
#[async_trait]
pub trait RideContext: Send + Sync + 'static {
    /// Random number generator handed out by [`RideContext::derive_rng`].
    type Rng: RngCore + Send + 'static;

    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock and yields
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    ///
    /// `name` is recorded in the task's trace output.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;

    /// Derives an independent RNG stream.
    ///
    /// The implementation combines the global seed with `stream` so that
    /// each generator draws from its own reproducible sequence.
    fn derive_rng(&self, stream: u64) -> Self::Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
