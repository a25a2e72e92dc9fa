//! Senate Bus Simulation Harness
//!
//! Drives the bus monitor from `senate_core` with the two periodic event
//! sources and a bounded passenger pool.
//!
//! # Architecture
//!
//! ```text
//!  BusArrivals ──sleep(Exp)──► Bus::arrive()
//!                                    │
//!                              ┌─────▼─────┐
//!                              │    Bus    │  one lock + broadcast wake
//!                              └─────▲─────┘
//!                                    │
//!  PassengerArrivals ──sleep(Exp)──► PassengerPool ──► Passenger::run()
//!                                    (N workers)        add_waiting + board()
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use senate_sim::{SimWorld, SimConfig};
//! use senate_env::TokioContext;
//!
//! let config = SimConfig::default().with_seed(42);
//! let context = Arc::new(TokioContext::seeded(config.seed));
//! let world = SimWorld::new(config, context, Arc::new(TracingSink))?;
//! world.run_for(Duration::from_secs(3600)).await?;
//! ```

mod context;
mod error;
mod generators;
mod pool;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use error::SimError;
pub use generators::{BusArrivals, ExpInterval, PassengerArrivals, BUS_STREAM, PASSENGER_STREAM};
pub use pool::{PassengerPool, DEFAULT_WORKERS};
pub use runner::{ScenarioResult, ScenarioRunner};
pub use world::{RunSummary, SimConfig, SimWorld};
