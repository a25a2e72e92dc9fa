//! Periodic event sources: bus arrivals and passenger arrivals.
//!
//! Both draw their gaps from an exponential distribution with a configured
//! mean (in simulated minutes). The bus source awaits each `arrive()` before
//! drawing the next gap; the passenger source hands each new rider to the
//! worker pool and moves straight on.

use crate::error::SimError;
use crate::pool::PassengerPool;

use rand::RngCore;
use rand_distr::{Distribution, Exp};
use senate_core::{Bus, Departure, Passenger};
use senate_env::RideContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// RNG stream for bus inter-arrival gaps.
pub const BUS_STREAM: u64 = 1;

/// RNG stream for passenger inter-arrival gaps.
pub const PASSENGER_STREAM: u64 = 2;

/// Exponentially distributed gaps between events.
pub struct ExpInterval<R: RngCore> {
    dist: Exp<f64>,
    rng: R,
    /// Real (or virtual) length of one simulated minute
    minute: Duration,
}

impl<R: RngCore> ExpInterval<R> {
    /// Creates a sampler with the given mean gap in simulated minutes.
    pub fn new(mean_minutes: f64, minute: Duration, rng: R) -> Result<Self, SimError> {
        if !mean_minutes.is_finite() || mean_minutes <= 0.0 {
            return Err(SimError::invalid(format!(
                "mean inter-arrival time must be positive, got {}",
                mean_minutes
            )));
        }

        let dist = Exp::new(1.0 / mean_minutes)
            .map_err(|e| SimError::invalid(format!("exponential rate: {}", e)))?;

        Ok(Self { dist, rng, minute })
    }

    /// Draws the next gap in simulated minutes.
    pub fn next_minutes(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    /// Draws the next gap as a duration.
    pub fn next_interval(&mut self) -> Duration {
        let minutes = self.next_minutes();
        Duration::try_from_secs_f64(self.minute.as_secs_f64() * minutes).unwrap_or(Duration::MAX)
    }
}

/// Drives `Bus::arrive` at random intervals.
pub struct BusArrivals<Ctx: RideContext> {
    context: Arc<Ctx>,
    bus: Arc<Bus>,
    interval: ExpInterval<Ctx::Rng>,
    arrivals: u64,
}

impl<Ctx: RideContext> BusArrivals<Ctx> {
    /// Creates the bus source, drawing from [`BUS_STREAM`].
    pub fn new(
        context: Arc<Ctx>,
        bus: Arc<Bus>,
        mean_minutes: f64,
        minute: Duration,
    ) -> Result<Self, SimError> {
        let interval = ExpInterval::new(mean_minutes, minute, context.derive_rng(BUS_STREAM))?;
        Ok(Self {
            context,
            bus,
            interval,
            arrivals: 0,
        })
    }

    /// Number of arrivals started so far.
    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    /// Waits one gap, then runs a full boarding window.
    pub async fn step(&mut self) -> Departure {
        let gap = self.interval.next_interval();
        debug!(gap_secs = gap.as_secs_f64(), "next bus scheduled");
        self.context.sleep(gap).await;

        self.arrivals += 1;
        let departure = self.bus.arrive().await;
        info!(
            bus = self.arrivals,
            passengers = departure.passengers,
            waiting = self.bus.waiting_count(),
            "boarding window closed"
        );
        departure
    }

    /// Runs `count` arrivals back to back.
    pub async fn run_for(&mut self, count: u64) -> Vec<Departure> {
        let mut departures = Vec::with_capacity(count as usize);
        for _ in 0..count {
            departures.push(self.step().await);
        }
        departures
    }

    /// Runs arrivals forever.
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }
}

/// Spawns passengers at random intervals onto the worker pool.
pub struct PassengerArrivals<Ctx: RideContext> {
    context: Arc<Ctx>,
    bus: Arc<Bus>,
    pool: Arc<PassengerPool<Ctx>>,
    interval: ExpInterval<Ctx::Rng>,
}

impl<Ctx: RideContext> PassengerArrivals<Ctx> {
    /// Creates the passenger source, drawing from [`PASSENGER_STREAM`].
    pub fn new(
        context: Arc<Ctx>,
        bus: Arc<Bus>,
        pool: Arc<PassengerPool<Ctx>>,
        mean_minutes: f64,
        minute: Duration,
    ) -> Result<Self, SimError> {
        let interval =
            ExpInterval::new(mean_minutes, minute, context.derive_rng(PASSENGER_STREAM))?;
        Ok(Self {
            context,
            bus,
            pool,
            interval,
        })
    }

    /// Waits one gap, then hands a new passenger to the pool.
    pub async fn step(&mut self) -> Result<JoinHandle<()>, SimError> {
        let gap = self.interval.next_interval();
        self.context.sleep(gap).await;

        let passenger = Passenger::new(self.bus.clone());
        debug!(passenger = %passenger.id(), "passenger arrived at the stop");
        self.pool.submit(passenger)
    }

    /// Spawns `count` passengers and returns their task handles.
    pub async fn run_for(&mut self, count: u64) -> Result<Vec<JoinHandle<()>>, SimError> {
        let mut riders = Vec::with_capacity(count as usize);
        for _ in 0..count {
            riders.push(self.step().await?);
        }
        Ok(riders)
    }

    /// Spawns passengers until the pool closes.
    pub async fn run(&mut self) -> Result<(), SimError> {
        loop {
            self.step().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use senate_core::RecordingSink;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_rejects_non_positive_mean() {
        for mean in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let rng = ChaCha8Rng::seed_from_u64(1);
            assert!(ExpInterval::new(mean, MINUTE, rng).is_err());
        }
    }

    #[test]
    fn test_sample_mean_tracks_configured_mean() {
        let mut interval = ExpInterval::new(20.0, MINUTE, ChaCha8Rng::seed_from_u64(7)).unwrap();
        let n = 20_000;
        let total: f64 = (0..n).map(|_| interval.next_minutes()).sum();
        let mean = total / n as f64;

        assert!((mean - 20.0).abs() < 1.0, "sample mean {} too far from 20", mean);
    }

    #[test]
    fn test_interval_scales_with_minute_length() {
        let mut fast = ExpInterval::new(1.0, Duration::from_millis(10), ChaCha8Rng::seed_from_u64(3)).unwrap();
        let mut slow = ExpInterval::new(1.0, MINUTE, ChaCha8Rng::seed_from_u64(3)).unwrap();

        let a = fast.next_interval().as_secs_f64();
        let b = slow.next_interval().as_secs_f64();
        assert!((b / a - 6000.0).abs() < 1e-3 * 6000.0);
    }

    proptest! {
        #[test]
        fn prop_intervals_are_non_negative(mean in 0.01f64..100.0, seed in any::<u64>()) {
            let mut interval = ExpInterval::new(mean, MINUTE, ChaCha8Rng::seed_from_u64(seed)).unwrap();
            for _ in 0..32 {
                let minutes = interval.next_minutes();
                prop_assert!(minutes.is_finite() && minutes >= 0.0);
            }
        }
    }

    #[test]
    fn test_bus_arrivals_are_sequential_and_timed() {
        let rt = SimContext::runtime().unwrap();
        rt.block_on(async {
            let ctx = SimContext::shared(42);
            let sink = RecordingSink::shared();
            let bus = Bus::shared(50, sink.clone()).unwrap();

            let mut arrivals = BusArrivals::new(ctx.clone(), bus, 20.0, MINUTE).unwrap();
            let departures = arrivals.run_for(5).await;

            assert_eq!(arrivals.arrivals(), 5);
            assert_eq!(departures, vec![Departure { passengers: 0 }; 5]);
            assert_eq!(sink.arrivals(), 5);
            assert!(ctx.now() > Duration::ZERO);
        });
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let schedule = |seed: u64| {
            let rt = SimContext::runtime().unwrap();
            rt.block_on(async move {
                let ctx = SimContext::shared(seed);
                let bus = Bus::shared(50, RecordingSink::shared()).unwrap();
                let mut arrivals = BusArrivals::new(ctx.clone(), bus, 20.0, MINUTE).unwrap();

                let mut times = Vec::new();
                for _ in 0..4 {
                    arrivals.step().await;
                    times.push(ctx.now());
                }
                times
            })
        };

        assert_eq!(schedule(9), schedule(9));
        assert_ne!(schedule(9), schedule(10));
    }

    #[test]
    fn test_passengers_board_next_bus() {
        let rt = SimContext::runtime().unwrap();
        rt.block_on(async {
            let ctx = SimContext::shared(1);
            let sink = RecordingSink::shared();
            let bus = Bus::shared(50, sink.clone()).unwrap();
            let pool = PassengerPool::shared(ctx.clone(), 10).unwrap();

            let mut riders =
                PassengerArrivals::new(ctx.clone(), bus.clone(), pool.clone(), 0.5, MINUTE).unwrap();
            let handles = riders.run_for(6).await.unwrap();

            // Let every rider register before the bus pulls in
            ctx.sleep(Duration::from_secs(1)).await;
            assert_eq!(bus.waiting_count(), 6);

            let departure = bus.arrive().await;
            assert_eq!(departure.passengers, 6);

            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(pool.boarded(), 6);
            assert_eq!(pool.spawned(), 6);
        });
    }
}
