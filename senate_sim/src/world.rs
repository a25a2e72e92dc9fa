//! SimWorld - the simulation harness container.

use crate::error::SimError;
use crate::generators::{BusArrivals, PassengerArrivals};
use crate::pool::{PassengerPool, DEFAULT_WORKERS};

use senate_core::{Bus, BusSnapshot, EventSink, DEFAULT_CAPACITY};
use senate_env::RideContext;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for the arrival schedules (0 = random)
    pub seed: u64,

    /// Seats per boarding window
    pub capacity: usize,

    /// Mean gap between buses, in simulated minutes
    pub bus_mean_minutes: f64,

    /// Mean gap between passengers, in simulated minutes
    pub passenger_mean_minutes: f64,

    /// Maximum number of live passenger actors
    pub workers: usize,

    /// Length of one simulated minute on the context's clock
    pub minute: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            capacity: DEFAULT_CAPACITY,
            bus_mean_minutes: 20.0,
            passenger_mean_minutes: 0.5,
            workers: DEFAULT_WORKERS,
            minute: Duration::from_secs(60),
        }
    }
}

impl SimConfig {
    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the bus capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets both mean inter-arrival times, in simulated minutes.
    pub fn with_means(mut self, bus_minutes: f64, passenger_minutes: f64) -> Self {
        self.bus_mean_minutes = bus_minutes;
        self.passenger_mean_minutes = passenger_minutes;
        self
    }

    /// Sets the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets how long one simulated minute lasts.
    pub fn with_minute(mut self, minute: Duration) -> Self {
        self.minute = minute;
        self
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.capacity == 0 {
            return Err(SimError::invalid("capacity must be at least 1"));
        }
        for (name, mean) in [
            ("bus mean", self.bus_mean_minutes),
            ("passenger mean", self.passenger_mean_minutes),
        ] {
            if !mean.is_finite() || mean <= 0.0 {
                return Err(SimError::invalid(format!(
                    "{} must be a positive number of minutes, got {}",
                    name, mean
                )));
            }
        }
        if self.workers == 0 {
            return Err(SimError::invalid("workers must be at least 1"));
        }
        if self.minute.is_zero() {
            return Err(SimError::invalid("a simulated minute must last longer than zero"));
        }
        Ok(())
    }
}

/// What happened during one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub seed: u64,
    pub simulated_minutes: f64,
    pub buses: u64,
    pub passengers_spawned: u64,
    pub passengers_boarded: u64,
    pub still_waiting: usize,
}

/// The SimWorld - owns the bus, the pool and the context.
pub struct SimWorld<Ctx: RideContext> {
    /// Configuration
    pub config: SimConfig,

    /// Shared environment (clock, spawner, RNG)
    pub context: Arc<Ctx>,

    /// The one bus
    pub bus: Arc<Bus>,

    /// Passenger worker pool
    pub pool: Arc<PassengerPool<Ctx>>,
}

impl<Ctx: RideContext> SimWorld<Ctx> {
    /// Creates a new SimWorld. Events go to `sink`.
    pub fn new(config: SimConfig, context: Arc<Ctx>, sink: Arc<dyn EventSink>) -> Result<Self, SimError> {
        config.validate()?;

        let bus = Bus::shared(config.capacity, sink)?;
        let pool = PassengerPool::shared(context.clone(), config.workers)?;

        Ok(Self {
            config,
            context,
            bus,
            pool,
        })
    }

    /// Builds the bus-arrival source.
    pub fn bus_arrivals(&self) -> Result<BusArrivals<Ctx>, SimError> {
        BusArrivals::new(
            self.context.clone(),
            self.bus.clone(),
            self.config.bus_mean_minutes,
            self.config.minute,
        )
    }

    /// Builds the passenger-arrival source.
    pub fn passenger_arrivals(&self) -> Result<PassengerArrivals<Ctx>, SimError> {
        PassengerArrivals::new(
            self.context.clone(),
            self.bus.clone(),
            self.pool.clone(),
            self.config.passenger_mean_minutes,
            self.config.minute,
        )
    }

    /// Runs both sources until `stop` resolves, then cancels every
    /// passenger still waiting.
    pub async fn run_until<F>(&self, stop: F) -> Result<RunSummary, SimError>
    where
        F: Future<Output = ()>,
    {
        let mut buses = self.bus_arrivals()?;
        let mut riders = self.passenger_arrivals()?;
        let started = self.context.now();

        info!(
            seed = self.context.seed(),
            capacity = self.config.capacity,
            workers = self.config.workers,
            "simulation started"
        );

        // Fixed polling order keeps seeded runs reproducible
        let outcome = tokio::select! {
            biased;
            _ = stop => Ok(()),
            _ = buses.run() => Ok(()),
            result = riders.run() => result,
        };

        self.pool.shutdown();
        if let Err(e) = &outcome {
            warn!("passenger source stopped early: {}", e);
        }
        outcome?;

        let summary = RunSummary {
            seed: self.context.seed(),
            simulated_minutes: (self.context.now() - started).as_secs_f64()
                / self.config.minute.as_secs_f64(),
            buses: buses.arrivals(),
            passengers_spawned: self.pool.spawned(),
            passengers_boarded: self.pool.boarded(),
            still_waiting: self.bus.waiting_count(),
        };

        info!(
            buses = summary.buses,
            spawned = summary.passengers_spawned,
            boarded = summary.passengers_boarded,
            "simulation stopped"
        );
        Ok(summary)
    }

    /// Runs both sources for `duration` on the context's clock.
    pub async fn run_for(&self, duration: Duration) -> Result<RunSummary, SimError> {
        let context = self.context.clone();
        self.run_until(async move { context.sleep(duration).await }).await
    }

    /// Current bus state.
    pub fn snapshot(&self) -> BusSnapshot {
        self.bus.snapshot()
    }
}
