//! Everything a job or request handler needs, built once at startup and
//! cloned into each task.

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use super::clock::{CivilTime, Clock, SystemClock};
use super::config::AppConfig;
use super::db::{async_db, migrate_db};
use crate::messaging::{BoundedMessenger, DiscordClient, Messenger};

#[derive(Clone)]
pub struct AppContext {
    pub db: Connection,
    pub clock: Arc<dyn Clock>,
    /// Already bounded by the collaborator timeout.
    pub messenger: Arc<dyn Messenger>,
    pub config: AppConfig,
    pub civil: CivilTime,
}

impl AppContext {
    pub fn new(
        db: Connection,
        clock: Arc<dyn Clock>,
        messenger: Arc<dyn Messenger>,
        config: AppConfig,
    ) -> Self {
        let messenger: Arc<dyn Messenger> = Arc::new(BoundedMessenger::new(
            messenger,
            config.collaborator_timeout,
        ));
        let civil = CivilTime::new(config.timezone);
        Self {
            db,
            clock,
            messenger,
            config,
            civil,
        }
    }

    /// Open the store (migrating it if needed) and connect to Discord.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let token = config.require_discord_token()?;
        let discord =
            DiscordClient::new(&config.discord_api_url, token, config.collaborator_timeout)?;

        fs::create_dir_all(&config.db_path)?;
        let db = async_db(&config.db_path).await?;
        db.call(|conn| Ok(migrate_db(conn)?)).await?;
        tracing::debug!("Opened store at {}", config.db_path);

        Ok(Self::new(db, Arc::new(SystemClock), Arc::new(discord), config))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn close(self) -> Result<()> {
        self.db.close().await?;
        tracing::debug!("Closed store");
        Ok(())
    }
}
