//! # Background Scheduler
//!
//! Drives the two periodic jobs on a spawned task:
//!
//! | Job | Default period |
//! |-----|----------------|
//! | Auto-close sweep | 60s |
//! | Archive expiry sweep | 3600s |
//!
//! Both jobs are infallible at the tick level (their per-item failures
//! are contained inside them), so the loop never dies to an error. A
//! watch channel signals shutdown; `stop()` resolves once the loop has
//! observed it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::archive::{ArchiveCipher, ArchiveService};
use crate::services::auto_close::AutoCloseSweep;
use crate::services::clock::Clock;
use crate::store::TenderStore;

/// Periodic-job driver. Owns the shutdown signal.
pub struct Scheduler<S, C> {
    sweep: AutoCloseSweep<S>,
    archive: ArchiveService<S, C>,
    clock: Arc<dyn Clock>,
    sweep_interval: Duration,
    expiry_interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl<S, C> Scheduler<S, C>
where
    S: TenderStore + Clone + 'static,
    C: ArchiveCipher + Clone + 'static,
{
    pub fn new(
        sweep: AutoCloseSweep<S>,
        archive: ArchiveService<S, C>,
        clock: Arc<dyn Clock>,
        sweep_interval: Duration,
        expiry_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            sweep,
            archive,
            clock,
            sweep_interval,
            expiry_interval,
            shutdown,
        }
    }

    /// Spawn the scheduler loop. Ticks fire immediately on start and
    /// then at their configured periods.
    pub fn start(&self) -> JoinHandle<()> {
        let sweep = self.sweep.clone();
        let archive = self.archive.clone();
        let clock = Arc::clone(&self.clock);
        let mut shutdown = self.shutdown.subscribe();
        let sweep_period = self.sweep_interval;
        let expiry_period = self.expiry_interval;

        info!(
            "Scheduler starting (sweep every {:?}, archive expiry every {:?})",
            sweep_period, expiry_period
        );

        tokio::spawn(async move {
            let mut sweep_tick = tokio::time::interval(sweep_period);
            let mut expiry_tick = tokio::time::interval(expiry_period);

            loop {
                tokio::select! {
                    _ = sweep_tick.tick() => {
                        sweep.run_once(clock.now()).await;
                    }
                    _ = expiry_tick.tick() => {
                        match archive.expire_due(clock.now()).await {
                            Ok(0) => {}
                            Ok(n) => info!("Archive expiry: {} records flipped to expired", n),
                            Err(e) => error!("Archive expiry sweep failed: {}", e),
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("Scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal the loop to exit. Await the handle from [`start`] to
    /// join it.
    ///
    /// [`start`]: Scheduler::start
    pub fn stop(&self) {
        // Send fails only when the loop already exited.
        let _ = self.shutdown.send(true);
    }
}
