use anyhow::Result;

use super::init_tracing;
use crate::core::{AppConfig, AppContext};
use crate::jobs::{ArchiveEndedEvents, PeriodicJob, SendReminders};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum JobId {
    SendReminders,
    ArchiveEndedEvents,
}

pub async fn run(id: JobId) -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env()?;
    let ctx = AppContext::open(config).await?;

    let job: Box<dyn PeriodicJob> = match id {
        JobId::SendReminders => Box::new(SendReminders),
        JobId::ArchiveEndedEvents => Box::new(ArchiveEndedEvents),
    };

    println!("Running job: {:?}", id);
    job.run_job(&ctx).await;
    println!("Job completed");

    ctx.close().await
}
