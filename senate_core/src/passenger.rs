//! Passenger actor - registers at the stop, then waits to board.

use crate::bus::Bus;

use senate_env::PassengerId;
use std::sync::Arc;
use tracing::debug;

/// A passenger that has taken a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boarded {
    pub passenger: PassengerId,
    /// Occupancy right after this passenger boarded
    pub seat: usize,
}

/// One rider, owned by its own task.
#[derive(Debug)]
pub struct Passenger {
    id: PassengerId,
    bus: Arc<Bus>,
}

impl Passenger {
    /// Creates a passenger with a fresh random id.
    pub fn new(bus: Arc<Bus>) -> Self {
        Self::with_id(PassengerId::new(), bus)
    }

    /// Creates a passenger with a given id.
    pub fn with_id(id: PassengerId, bus: Arc<Bus>) -> Self {
        Self { id, bus }
    }

    /// Returns the passenger's id.
    pub fn id(&self) -> PassengerId {
        self.id
    }

    /// Registers as waiting, then boards the next bus with a free seat.
    ///
    /// Dropping the future before it resolves withdraws the registration, so
    /// an abandoned passenger never keeps a bus at the stop.
    pub async fn run(self) -> Boarded {
        self.bus.add_waiting_passenger(self.id);
        let registration = Registration {
            bus: &self.bus,
            passenger: self.id,
            boarded: false,
        };

        let seat = self.bus.board(self.id).await;
        registration.complete();

        debug!(passenger = %self.id, seat, "passenger seated");
        Boarded {
            passenger: self.id,
            seat,
        }
    }
}

/// Withdraws a passenger from the waiting record unless it boarded.
struct Registration<'a> {
    bus: &'a Bus,
    passenger: PassengerId,
    boarded: bool,
}

impl Registration<'_> {
    fn complete(mut self) {
        self.boarded = true;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if !self.boarded {
            self.bus.abandon(self.passenger);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BusEvent, RecordingSink};
    use std::time::Duration;
    use tokio::time::timeout;

    const LIVENESS: Duration = Duration::from_secs(5);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_passenger_registers_then_boards() {
        let sink = RecordingSink::shared();
        let bus = Bus::shared(50, sink.clone()).unwrap();
        let id = PassengerId::from_seed(11);

        let rider = tokio::spawn(Passenger::with_id(id, bus.clone()).run());

        timeout(LIVENESS, async {
            while !bus.has_waiting_passengers() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        let departure = timeout(LIVENESS, bus.arrive()).await.unwrap();
        let boarded = timeout(LIVENESS, rider).await.unwrap().unwrap();

        assert_eq!(departure.passengers, 1);
        assert_eq!(boarded, Boarded { passenger: id, seat: 1 });
        assert!(sink.events().contains(&BusEvent::Boarded { passenger: id, count: 1 }));
        assert!(!bus.has_waiting_passengers());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_dropped_passenger_withdraws_registration() {
        let bus = Bus::shared(50, RecordingSink::shared()).unwrap();

        let rider = tokio::spawn(Passenger::new(bus.clone()).run());
        timeout(LIVENESS, async {
            while !bus.has_waiting_passengers() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        rider.abort();
        assert!(rider.await.unwrap_err().is_cancelled());
        assert!(!bus.has_waiting_passengers());

        // Nobody is left to wait for
        let departure = timeout(LIVENESS, bus.arrive()).await.unwrap();
        assert_eq!(departure.passengers, 0);
    }

    #[test]
    fn test_new_passengers_get_distinct_ids() {
        let bus = Bus::shared(1, RecordingSink::shared()).unwrap();
        let a = Passenger::new(bus.clone());
        let b = Passenger::new(bus);
        assert_ne!(a.id(), b.id());
    }
}
