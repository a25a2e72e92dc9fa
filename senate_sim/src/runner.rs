//! Scenario runner - executes the protocol scenarios on a virtual clock.
//!
//! Every scenario runs on its own single-threaded runtime with a paused
//! clock, so "wait an hour to see whether this rider is still blocked" costs
//! nothing and a given seed always replays the same run.

use crate::context::SimContext;
use crate::pool::PassengerPool;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use senate_core::{Bus, Passenger, RecordingSink, DEFAULT_CAPACITY};
use senate_env::{PassengerId, RideContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

/// Virtual time given to background tasks to reach their next await point.
const SETTLE: Duration = Duration::from_secs(1);

/// Virtual time after which a blocked operation counts as stuck.
const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Passengers aboard at each departure, in order
    pub departures: Vec<usize>,

    /// Final virtual time in minutes
    pub simulated_minutes: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,
}

type Check = Result<(), String>;

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Check {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

/// Runs protocol scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Bus capacity for the steady-state run
    capacity: usize,

    /// Steady-state duration in simulated minutes
    duration_minutes: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            capacity: DEFAULT_CAPACITY,
            duration_minutes: 8.0 * 60.0,
        }
    }

    /// Sets the steady-state bus capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the steady-state duration in simulated minutes.
    pub fn with_duration(mut self, minutes: f64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let sink = RecordingSink::shared();
        let outcome = match SimContext::runtime() {
            Ok(runtime) => runtime.block_on(async {
                let ctx = SimContext::shared(self.seed);
                let check = match scenario {
                    ScenarioId::CapacityOverflow => self.run_capacity_overflow(&ctx, &sink).await,
                    ScenarioId::EmptyStop => self.run_empty_stop(&ctx, &sink).await,
                    ScenarioId::SequentialArrivals => self.run_sequential_arrivals(&ctx, &sink).await,
                    ScenarioId::MassBoarding => self.run_mass_boarding(&ctx, &sink).await,
                    ScenarioId::Abandonment => self.run_abandonment(&ctx, &sink).await,
                    ScenarioId::SteadyState => self.run_steady_state(&ctx, &sink).await,
                };
                (check, ctx.now())
            }),
            Err(e) => (Err(format!("could not start runtime: {}", e)), Duration::ZERO),
        };

        let (check, elapsed) = outcome;
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: check.is_ok(),
            departures: sink.departures(),
            simulated_minutes: elapsed.as_secs_f64() / 60.0,
            failure_reason: check.err(),
        }
    }

    fn rider_id(&self, index: u64) -> PassengerId {
        PassengerId::from_seed(self.seed.wrapping_add(index))
    }

    /// Spawns `count` passengers straight onto the runtime.
    fn spawn_riders(&self, ctx: &SimContext, bus: &Arc<Bus>, first: u64, count: u64) -> Vec<JoinHandle<()>> {
        (first..first + count)
            .map(|i| {
                let passenger = Passenger::with_id(self.rider_id(i), bus.clone());
                ctx.spawn("passenger", async move {
                    passenger.run().await;
                })
            })
            .collect()
    }

    /// BUS-001: two of three riders board, the third waits.
    async fn run_capacity_overflow(&self, ctx: &Arc<SimContext>, sink: &Arc<RecordingSink>) -> Check {
        let bus = Bus::shared(2, sink.clone()).map_err(|e| e.to_string())?;
        let riders = self.spawn_riders(ctx, &bus, 0, 3);
        ctx.sleep(SETTLE).await;

        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "bus never departed".to_string())?;
        ensure(departure.passengers == 2, || {
            format!("departed with {} passengers, expected 2", departure.passengers)
        })?;

        ctx.sleep(SETTLE).await;
        let seated = riders.iter().filter(|r| r.is_finished()).count();
        ensure(seated == 2, || format!("{} riders finished, expected 2", seated))?;
        ensure(bus.waiting_count() == 1, || {
            format!("{} riders waiting, expected 1", bus.waiting_count())
        })?;

        let snap = bus.snapshot();
        ensure(!snap.boarding_open && snap.boarded == 0, || {
            format!("bus not reset after departure: {:?}", snap)
        })?;

        // The straggler takes the next bus
        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "second bus never departed".to_string())?;
        ensure(departure.passengers == 1, || {
            format!("second bus took {} passengers, expected 1", departure.passengers)
        })
    }

    /// BUS-002: empty stop, immediate departure.
    async fn run_empty_stop(&self, ctx: &Arc<SimContext>, sink: &Arc<RecordingSink>) -> Check {
        let bus = Bus::shared(DEFAULT_CAPACITY, sink.clone()).map_err(|e| e.to_string())?;

        let before = ctx.now();
        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "bus blocked at an empty stop".to_string())?;
        let waited = ctx.now() - before;

        ensure(waited.is_zero(), || format!("arrival blocked for {:?}", waited))?;
        ensure(departure.passengers == 0, || {
            format!("departed with {} passengers, expected 0", departure.passengers)
        })
    }

    /// BUS-003: boards the pending bus; a late rider waits for a third.
    async fn run_sequential_arrivals(&self, ctx: &Arc<SimContext>, sink: &Arc<RecordingSink>) -> Check {
        let bus = Bus::shared(DEFAULT_CAPACITY, sink.clone()).map_err(|e| e.to_string())?;

        // A registered rider keeps the first bus at the stop
        let early = self.rider_id(0);
        bus.add_waiting_passenger(early);
        let (departed, first_departure) = oneshot::channel();
        let first = {
            let bus = bus.clone();
            ctx.spawn("bus", async move {
                let _ = departed.send(bus.arrive().await);
            })
        };
        ctx.sleep(SETTLE).await;
        ensure(bus.snapshot().boarding_open && !first.is_finished(), || {
            "first bus left before the rider boarded".to_string()
        })?;

        let seat = timeout(WINDOW, bus.board(early))
            .await
            .map_err(|_| "rider could not board the pending bus".to_string())?;
        ensure(seat == 1, || format!("rider got seat {}, expected 1", seat))?;

        let departure = first_departure
            .await
            .map_err(|_| "first bus task ended without departing".to_string())?;
        ensure(departure.passengers == 1, || {
            format!("first bus took {} passengers, expected 1", departure.passengers)
        })?;

        // Second bus: nobody waiting
        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "second bus blocked".to_string())?;
        ensure(departure.passengers == 0, || {
            format!("second bus took {} passengers, expected 0", departure.passengers)
        })?;

        // Late rider: both buses gone
        let late = self.spawn_riders(ctx, &bus, 1, 1);
        ctx.sleep(WINDOW).await;
        ensure(late.iter().all(|r| !r.is_finished()), || {
            "late rider boarded without a bus".to_string()
        })?;

        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "third bus never departed".to_string())?;
        ctx.sleep(SETTLE).await;
        ensure(departure.passengers == 1 && late.iter().all(|r| r.is_finished()), || {
            format!("third bus took {} passengers, expected the late rider", departure.passengers)
        })
    }

    /// BUS-004: every blocked rider boards one big enough bus.
    async fn run_mass_boarding(&self, ctx: &Arc<SimContext>, sink: &Arc<RecordingSink>) -> Check {
        const RIDERS: u64 = 200;

        let bus = Bus::shared(RIDERS as usize, sink.clone()).map_err(|e| e.to_string())?;
        let riders = self.spawn_riders(ctx, &bus, 0, RIDERS);
        ctx.sleep(SETTLE).await;

        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "bus never departed".to_string())?;
        ctx.sleep(SETTLE).await;

        let seated = riders.iter().filter(|r| r.is_finished()).count();
        debug!(seated, "mass boarding finished");
        ensure(departure.passengers == RIDERS as usize && seated == RIDERS as usize, || {
            format!(
                "{} departed, {} riders finished, expected {}",
                departure.passengers, seated, RIDERS
            )
        })
    }

    /// BUS-005: cancelled riders leave the bus free to go.
    async fn run_abandonment(&self, ctx: &Arc<SimContext>, sink: &Arc<RecordingSink>) -> Check {
        let bus = Bus::shared(DEFAULT_CAPACITY, sink.clone()).map_err(|e| e.to_string())?;
        let pool = PassengerPool::shared(ctx.clone(), 4).map_err(|e| e.to_string())?;

        for i in 0..6 {
            pool.submit(Passenger::with_id(self.rider_id(i), bus.clone()))
                .map_err(|e| e.to_string())?;
        }
        ctx.sleep(SETTLE).await;
        ensure(bus.waiting_count() == 4, || {
            format!("{} riders waiting, expected 4", bus.waiting_count())
        })?;

        pool.shutdown();
        ctx.sleep(SETTLE).await;
        ensure(!bus.has_waiting_passengers(), || {
            format!("{} cancelled riders still registered", bus.waiting_count())
        })?;

        let departure = timeout(WINDOW, bus.arrive())
            .await
            .map_err(|_| "bus held by cancelled riders".to_string())?;
        ensure(departure.passengers == 0 && sink.boarded_total() == 0, || {
            "a cancelled rider boarded".to_string()
        })
    }

    /// BUS-006: both generators for the configured duration.
    async fn run_steady_state(&self, ctx: &Arc<SimContext>, sink: &Arc<RecordingSink>) -> Check {
        let config = SimConfig::default()
            .with_seed(self.seed)
            .with_capacity(self.capacity);
        let world = SimWorld::new(config, ctx.clone(), sink.clone()).map_err(|e| e.to_string())?;

        let duration = Duration::try_from_secs_f64(self.duration_minutes * 60.0)
            .map_err(|e| format!("invalid duration of {} minutes: {}", self.duration_minutes, e))?;
        let summary = world.run_for(duration).await.map_err(|e| e.to_string())?;
        ctx.sleep(SETTLE).await;

        let departures = sink.departures();
        ensure(departures.iter().all(|&n| n <= self.capacity), || {
            format!("a departure exceeded capacity {}: {:?}", self.capacity, departures)
        })?;
        ensure(sink.arrivals() == departures.len(), || {
            format!("{} arrivals but {} departures", sink.arrivals(), departures.len())
        })?;
        ensure(departures.iter().sum::<usize>() == sink.boarded_total(), || {
            "boarding events do not add up to departures".to_string()
        })?;
        ensure(summary.buses as usize == sink.arrivals(), || {
            format!("{} buses scheduled, {} arrived", summary.buses, sink.arrivals())
        })?;

        let snap = world.snapshot();
        ensure(!snap.boarding_open && snap.boarded == 0 && snap.waiting == 0, || {
            format!("bus not at rest after shutdown: {:?}", snap)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_overflow_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::CapacityOverflow);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.departures, vec![2, 1]);
    }

    #[test]
    fn test_empty_stop_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::EmptyStop);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.departures, vec![0]);
    }

    #[test]
    fn test_sequential_arrivals_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::SequentialArrivals);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.departures, vec![1, 0, 1]);
    }

    #[test]
    fn test_mass_boarding_scenario() {
        let result = ScenarioRunner::new(7).run(ScenarioId::MassBoarding);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.departures, vec![200]);
    }

    #[test]
    fn test_abandonment_scenario() {
        let result = ScenarioRunner::new(42).run(ScenarioId::Abandonment);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.departures, vec![0]);
    }

    #[test]
    fn test_steady_state_scenario() {
        let result = ScenarioRunner::new(42)
            .with_capacity(5)
            .with_duration(120.0)
            .run(ScenarioId::SteadyState);

        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(!result.departures.is_empty());
        assert!(result.simulated_minutes >= 120.0);
    }

    #[test]
    fn test_steady_state_rejects_unusable_duration() {
        for minutes in [-5.0, f64::NAN, f64::INFINITY, 1e300] {
            let result = ScenarioRunner::new(42)
                .with_duration(minutes)
                .run(ScenarioId::SteadyState);

            assert!(!result.passed, "duration {} should fail", minutes);
            let reason = result.failure_reason.unwrap_or_default();
            assert!(reason.contains("invalid duration"), "{}", reason);
            assert!(result.departures.is_empty());
        }
    }

    #[test]
    fn test_steady_state_deterministic() {
        // Same seed should give the same departures
        let runner1 = ScenarioRunner::new(42).with_duration(120.0);
        let runner2 = ScenarioRunner::new(42).with_duration(120.0);

        let result1 = runner1.run(ScenarioId::SteadyState);
        let result2 = runner2.run(ScenarioId::SteadyState);

        assert!(result1.passed && result2.passed);
        assert_eq!(result1.departures, result2.departures);
    }
}
