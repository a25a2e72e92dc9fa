//! The bus monitor - boarding window, capacity gating and departure.
//!
//! One lock guards the whole bus state and one [`Notify`] carries every
//! wakeup. Waiters arm their `Notified` future *before* checking their
//! predicate under the lock, so a broadcast that lands between the check and
//! the await is never lost. The lock is never held across an `.await`.
//!
//! ```text
//! CLOSED --arrive()--> OPEN --board()*--> OPEN
//! OPEN --(full | no waiters)--> DEPARTING --depart()--> CLOSED
//! ```
//!
//! Every transition that can change either predicate (the boarding side's
//! "door open and seat free", the arrival side's "full or drained") wakes
//! all waiters; each one re-checks its own predicate and goes back to sleep
//! if it still does not hold.

use crate::error::BusError;
use crate::events::{BusEvent, EventSink};

use parking_lot::Mutex;
use senate_env::PassengerId;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Seats per boarding window unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 50;

/// Mutable state behind the bus lock.
#[derive(Debug, Default)]
struct BusState {
    /// Passengers aboard the open bus
    boarded: usize,

    /// True exactly while the bus is present and accepting passengers
    boarding_open: bool,

    /// Registered passengers that have not boarded yet, in arrival order
    waiting: VecDeque<PassengerId>,
}

impl BusState {
    /// Removes `passenger` from the waiting record. Returns false if absent.
    fn remove_waiting(&mut self, passenger: PassengerId) -> bool {
        match self.waiting.iter().position(|id| *id == passenger) {
            Some(index) => {
                self.waiting.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Phase of the current boarding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusPhase {
    /// No bus present; boarders wait.
    Closed,
    /// Doors open with seats free and passengers still expected.
    Open,
    /// Full or drained; the arrival is about to depart.
    Departing,
}

/// Point-in-time copy of the bus state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusSnapshot {
    pub capacity: usize,
    pub boarded: usize,
    pub boarding_open: bool,
    pub waiting: usize,
}

impl BusSnapshot {
    /// Derives the state-machine phase from the snapshot.
    pub fn phase(&self) -> BusPhase {
        if !self.boarding_open {
            BusPhase::Closed
        } else if self.boarded >= self.capacity || self.waiting == 0 {
            BusPhase::Departing
        } else {
            BusPhase::Open
        }
    }
}

/// Result of one boarding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Departure {
    /// Passengers aboard when the doors closed
    pub passengers: usize,
}

/// The single shared bus.
///
/// Hand an `Arc<Bus>` to every actor; there is no global instance.
pub struct Bus {
    /// Seats per boarding window
    capacity: usize,

    /// All mutable state, one critical section
    state: Mutex<BusState>,

    /// Broadcast channel for state changes
    changed: Notify,

    /// Serializes arrivals: the next bus cannot pull in before the last left
    arrival_gate: tokio::sync::Mutex<()>,

    /// Observer of arrivals, boardings and departures
    sink: Arc<dyn EventSink>,
}

impl Bus {
    /// Creates a closed, empty bus.
    pub fn new(capacity: usize, sink: Arc<dyn EventSink>) -> Result<Self, BusError> {
        if capacity == 0 {
            return Err(BusError::InvalidCapacity(capacity));
        }

        Ok(Self {
            capacity,
            state: Mutex::new(BusState::default()),
            changed: Notify::new(),
            arrival_gate: tokio::sync::Mutex::new(()),
            sink,
        })
    }

    /// Creates an Arc-wrapped bus for sharing across tasks.
    pub fn shared(capacity: usize, sink: Arc<dyn EventSink>) -> Result<Arc<Self>, BusError> {
        Self::new(capacity, sink).map(Arc::new)
    }

    /// Returns the number of seats per boarding window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Opens the doors, waits until the window is full or drained of known
    /// waiters, then departs.
    ///
    /// Returns immediately (after departing empty) when nobody is waiting.
    /// If the returned future is dropped while the doors are open, the bus
    /// departs on the spot so the window never stays open without an owner.
    pub async fn arrive(&self) -> Departure {
        let _arrival = self.arrival_gate.lock().await;

        {
            let mut state = self.state.lock();
            self.sink.record(&BusEvent::Arrived);
            state.boarding_open = true;
            debug!(waiting = state.waiting.len(), "doors open");
        }
        self.changed.notify_waiters();

        let mut window = OpenWindow {
            bus: self,
            resolved: false,
        };

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let departure = {
                let mut state = self.state.lock();
                if state.boarded >= self.capacity || state.waiting.is_empty() {
                    Some(self.depart_locked(&mut state))
                } else {
                    None
                }
            };

            if let Some(departure) = departure {
                window.resolved = true;
                self.changed.notify_waiters();
                return departure;
            }

            notified.await;
        }
    }

    /// Waits for an open door and a free seat, then takes the seat.
    ///
    /// Returns the occupancy after boarding (the passenger's seat number).
    /// There is no timeout. Dropping the future abandons the attempt without
    /// touching the bus state.
    pub async fn board(&self, passenger: PassengerId) -> usize {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let boarded = {
                let mut state = self.state.lock();
                if state.boarding_open && state.boarded < self.capacity {
                    state.boarded += 1;
                    state.remove_waiting(passenger);

                    let count = state.boarded;
                    self.sink.record(&BusEvent::Boarded { passenger, count });

                    let window_done = count >= self.capacity || state.waiting.is_empty();
                    Some((count, window_done))
                } else {
                    None
                }
            };

            if let Some((count, window_done)) = boarded {
                if window_done {
                    self.changed.notify_waiters();
                }
                return count;
            }

            notified.await;
        }
    }

    /// Closes the doors and empties the bus.
    ///
    /// Normally called by [`Bus::arrive`]; calling it again with no arrival
    /// in between leaves the state unchanged.
    pub fn depart(&self) -> Departure {
        let departure = {
            let mut state = self.state.lock();
            self.depart_locked(&mut state)
        };
        self.changed.notify_waiters();
        departure
    }

    fn depart_locked(&self, state: &mut BusState) -> Departure {
        let passengers = state.boarded;
        self.sink.record(&BusEvent::Departed { passengers });

        state.boarded = 0;
        state.boarding_open = false;

        Departure { passengers }
    }

    /// Registers a passenger as waiting. Never blocks.
    pub fn add_waiting_passenger(&self, passenger: PassengerId) {
        self.state.lock().waiting.push_back(passenger);
    }

    /// Withdraws a passenger that gave up before boarding.
    ///
    /// Wakes the arrival side if this drained the waiting record while the
    /// doors are open.
    pub fn abandon(&self, passenger: PassengerId) {
        let drained = {
            let mut state = self.state.lock();
            state.remove_waiting(passenger) && state.boarding_open && state.waiting.is_empty()
        };

        debug!(%passenger, "boarding attempt abandoned");

        if drained {
            self.changed.notify_waiters();
        }
    }

    /// True iff at least one registered passenger has not boarded yet.
    pub fn has_waiting_passengers(&self) -> bool {
        !self.state.lock().waiting.is_empty()
    }

    /// Number of registered passengers that have not boarded yet.
    pub fn waiting_count(&self) -> usize {
        self.state.lock().waiting.len()
    }

    /// Copies the current state.
    pub fn snapshot(&self) -> BusSnapshot {
        let state = self.state.lock();
        BusSnapshot {
            capacity: self.capacity,
            boarded: state.boarded,
            boarding_open: state.boarding_open,
            waiting: state.waiting.len(),
        }
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("capacity", &self.capacity)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Departs the bus if an arrival is dropped with its doors open.
struct OpenWindow<'a> {
    bus: &'a Bus,
    resolved: bool,
}

impl Drop for OpenWindow<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            warn!("arrival cancelled with doors open, departing now");
            self.bus.depart();
        }
    }
}
