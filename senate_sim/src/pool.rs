//! Bounded worker pool for passenger actors.
//!
//! Submitting never blocks: every passenger gets a task at once, but only
//! `workers` of them may be live (registered at the stop) at a time. The rest
//! queue for a permit, like jobs on a fixed-size thread pool.

use crate::error::SimError;

use parking_lot::Mutex;
use senate_core::Passenger;
use senate_env::{EnvError, RideContext};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info};

/// Default number of concurrently live passengers.
pub const DEFAULT_WORKERS: usize = 10;

/// Runs passenger actors with bounded concurrency.
pub struct PassengerPool<Ctx: RideContext> {
    context: Arc<Ctx>,

    /// One permit per live passenger
    permits: Arc<Semaphore>,

    /// Configured pool size
    workers: usize,

    /// Passengers handed to the pool
    spawned: AtomicU64,

    /// Passengers that found a seat
    boarded: Arc<AtomicU64>,

    /// Unfinished passenger tasks, aborted on shutdown
    tasks: Mutex<Vec<AbortHandle>>,
}

impl<Ctx: RideContext> PassengerPool<Ctx> {
    /// Creates a pool with `workers` slots.
    pub fn new(context: Arc<Ctx>, workers: usize) -> Result<Self, SimError> {
        if workers == 0 {
            return Err(SimError::invalid("worker pool needs at least one worker"));
        }

        Ok(Self {
            context,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            spawned: AtomicU64::new(0),
            boarded: Arc::new(AtomicU64::new(0)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Creates an Arc-wrapped pool.
    pub fn shared(context: Arc<Ctx>, workers: usize) -> Result<Arc<Self>, SimError> {
        Self::new(context, workers).map(Arc::new)
    }

    /// Hands a passenger to the pool without waiting for it.
    pub fn submit(&self, passenger: Passenger) -> Result<JoinHandle<()>, SimError> {
        if self.permits.is_closed() {
            return Err(EnvError::pool_closed("passenger pool is shut down").into());
        }

        let permits = self.permits.clone();
        let boarded = self.boarded.clone();

        let handle = self.context.spawn("passenger", async move {
            // Closed while queued: the passenger never reaches the stop
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!(passenger = %passenger.id(), "pool closed before passenger started");
                return;
            };

            passenger.run().await;
            boarded.fetch_add(1, Ordering::Relaxed);
        });

        self.spawned.fetch_add(1, Ordering::Relaxed);

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle.abort_handle());

        Ok(handle)
    }

    /// Stops accepting passengers and cancels every unfinished one.
    ///
    /// Cancelled passengers withdraw from the stop without boarding.
    pub fn shutdown(&self) {
        self.permits.close();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        let cancelled = tasks.iter().filter(|task| !task.is_finished()).count();
        for task in tasks {
            task.abort();
        }

        info!(cancelled, "passenger pool shut down");
    }

    /// Configured pool size.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Passengers currently holding a worker slot.
    pub fn active(&self) -> usize {
        if self.permits.is_closed() {
            return 0;
        }
        self.workers - self.permits.available_permits()
    }

    /// Passengers handed to the pool so far.
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Passengers that boarded so far.
    pub fn boarded(&self) -> u64 {
        self.boarded.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use senate_core::{Bus, RecordingSink};
    use std::time::Duration;

    #[test]
    fn test_zero_workers_rejected() {
        let rt = SimContext::runtime().unwrap();
        rt.block_on(async {
            let ctx = SimContext::shared(1);
            assert!(PassengerPool::new(ctx, 0).is_err());
        });
    }

    #[test]
    fn test_pool_caps_live_passengers() {
        let rt = SimContext::runtime().unwrap();
        rt.block_on(async {
            let ctx = SimContext::shared(1);
            let bus = Bus::shared(50, RecordingSink::shared()).unwrap();
            let pool = PassengerPool::shared(ctx.clone(), 3).unwrap();

            let handles: Vec<_> = (0..8)
                .map(|_| pool.submit(Passenger::new(bus.clone())).unwrap())
                .collect();
            ctx.sleep(Duration::from_secs(1)).await;

            // Only three passengers made it to the stop
            assert_eq!(pool.spawned(), 8);
            assert_eq!(pool.active(), 3);
            assert_eq!(bus.waiting_count(), 3);

            // Each bus takes whoever is at the stop; freed slots admit the next
            let mut carried = 0;
            while carried < 8 {
                carried += bus.arrive().await.passengers;
                ctx.sleep(Duration::from_secs(1)).await;
            }

            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(pool.boarded(), 8);
            assert_eq!(pool.active(), 0);
        });
    }

    #[test]
    fn test_shutdown_cancels_waiting_passengers() {
        let rt = SimContext::runtime().unwrap();
        rt.block_on(async {
            let ctx = SimContext::shared(1);
            let bus = Bus::shared(50, RecordingSink::shared()).unwrap();
            let pool = PassengerPool::shared(ctx.clone(), 2).unwrap();

            let handles: Vec<_> = (0..4)
                .map(|_| pool.submit(Passenger::new(bus.clone())).unwrap())
                .collect();
            ctx.sleep(Duration::from_secs(1)).await;
            assert_eq!(bus.waiting_count(), 2);

            pool.shutdown();
            for handle in handles {
                let _ = handle.await;
            }

            assert!(!bus.has_waiting_passengers());
            assert_eq!(pool.boarded(), 0);
            assert!(matches!(
                pool.submit(Passenger::new(bus.clone())),
                Err(SimError::Env(EnvError::PoolClosed(_)))
            ));
        });
    }
}
