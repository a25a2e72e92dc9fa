//! Senate Bus Core - the bus/passenger rendezvous monitor
//!
//! A bus arrives, opens a boarding window of bounded capacity and departs
//! once the window is full or nobody known is left waiting. Passengers that
//! reach the stop while no bus is present wait for the next arrival.
//!
//! 1. **Gating**: boarding succeeds only while the doors are open and a seat
//!    is free
//! 2. **Departure**: `arrive()` resolves its window before returning
//! 3. **Cancellation**: dropping any suspended operation leaves the bus
//!    consistent
//!
//! # Usage
//!
//! ```ignore
//! use senate_core::{Bus, Passenger, TracingSink};
//! use std::sync::Arc;
//!
//! let bus = Bus::shared(50, Arc::new(TracingSink))?;
//! tokio::spawn(Passenger::new(bus.clone()).run());
//! let departure = bus.arrive().await;
//! ```

pub mod bus;
pub mod error;
pub mod events;
pub mod passenger;

// Re-export key types for convenience
pub use bus::{Bus, BusPhase, BusSnapshot, Departure, DEFAULT_CAPACITY};
pub use error::BusError;
pub use events::{BusEvent, EventSink, JsonLinesSink, RecordingSink, TracingSink};
pub use passenger::{Boarded, Passenger};
