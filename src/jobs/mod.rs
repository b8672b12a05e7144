//! Background jobs. Each one runs in its own tokio task on a fixed
//! interval and only talks to the others through the store.

pub mod cleanup;
pub mod reminders;

use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use cleanup::ArchiveEndedEvents;
pub use reminders::SendReminders;

use crate::core::{AppConfig, AppContext};

#[async_trait]
pub trait PeriodicJob: Debug + Send + Sync {
    fn interval(&self, config: &AppConfig) -> Duration;

    /// Run a single pass. Failures are logged, never returned, so one bad
    /// pass doesn't stop the loop.
    async fn run_job(&self, ctx: &AppContext);
}

/// Sender half of the shutdown signal. Send `true` to stop every job loop
/// after its current pass.
pub type Shutdown = watch::Sender<bool>;

pub fn shutdown_channel() -> (Shutdown, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn spawn_periodic_job<J>(
    ctx: AppContext,
    job: J,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    J: PeriodicJob + 'static,
{
    tokio::spawn(async move {
        let period = job.interval(&ctx.config);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Starting job {:?} every {:?}", job, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                // A dropped sender counts as a shutdown too
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }
            tracing::debug!("Running job {:?}", job);
            // A panicking pass must not end the loop
            if AssertUnwindSafe(job.run_job(&ctx)).catch_unwind().await.is_err() {
                tracing::error!("Job {:?} panicked, running it again next tick", job);
            }
        }

        tracing::info!("Stopped job {:?}", job);
    })
}
