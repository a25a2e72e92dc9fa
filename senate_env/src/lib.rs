//! Senate Bus Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the bus and
//! passenger actors to run in both **Production** (tokio wall clock) and
//! **Simulation** (virtual clock, seeded RNG) environments.
//!
//! # Core Concept
//!
//! Everything an actor needs from the outside world goes through one trait:
//! - Time (`now()`, `sleep()`)
//! - Task spawning (`spawn()`)
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, a simulated run's
//! arrival schedule becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use senate_env::RideContext;
//!
//! async fn timer_loop<Ctx: RideContext>(ctx: &Ctx) {
//!     loop {
//!         ctx.sleep(Duration::from_secs(60)).await;
//!         tick();
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::RideContext;
pub use types::PassengerId;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
