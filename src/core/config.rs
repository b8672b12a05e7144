use std::env;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use chrono_tz::Tz;

/// Narrowest reminder window (the one-day and two-hour rules are both one
/// hour wide). The reminder poll period must stay below it or a window can
/// fall entirely between two polls.
pub const NARROWEST_REMINDER_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub discord_token: String,
    /// Hex encoded application key Discord signs interactions with.
    pub discord_public_key: String,
    pub discord_api_url: String,
    pub timezone: Tz,
    pub reminder_poll_interval: Duration,
    pub cleanup_poll_interval: Duration,
    pub cleanup_grace_period: chrono::Duration,
    pub collaborator_timeout: Duration,
    pub purge_limit: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let storage_path = env::var("ROLLCALL_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/db", storage_path);
        let discord_token = env::var("ROLLCALL_DISCORD_TOKEN").unwrap_or_default();
        let discord_public_key = env::var("ROLLCALL_DISCORD_PUBLIC_KEY").unwrap_or_default();
        let discord_api_url = env::var("ROLLCALL_DISCORD_API_URL")
            .unwrap_or_else(|_| "https://discord.com/api/v10".to_string());
        let timezone_name =
            env::var("ROLLCALL_TIMEZONE").unwrap_or_else(|_| "Europe/Paris".to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| anyhow!("Invalid ROLLCALL_TIMEZONE {}: {}", timezone_name, e))?;

        let config = Self {
            storage_path,
            db_path,
            discord_token,
            discord_public_key,
            discord_api_url,
            timezone,
            reminder_poll_interval: Duration::from_secs(u64_var(
                "ROLLCALL_REMINDER_POLL_SECS",
                5 * 60,
            )?),
            cleanup_poll_interval: Duration::from_secs(u64_var(
                "ROLLCALL_CLEANUP_POLL_SECS",
                60 * 60,
            )?),
            cleanup_grace_period: grace_period(u64_var("ROLLCALL_CLEANUP_GRACE_MINS", 60)?)?,
            collaborator_timeout: Duration::from_secs(u64_var(
                "ROLLCALL_COLLABORATOR_TIMEOUT_SECS",
                10,
            )?),
            purge_limit: u64_var("ROLLCALL_PURGE_LIMIT", 100)? as usize,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would let the scheduler skip a reminder.
    pub fn validate(&self) -> Result<()> {
        if self.reminder_poll_interval.is_zero() || self.cleanup_poll_interval.is_zero() {
            bail!("Poll intervals must be greater than zero");
        }
        if self.reminder_poll_interval >= NARROWEST_REMINDER_WINDOW {
            bail!(
                "Reminder poll interval {:?} must be shorter than the {:?} reminder window",
                self.reminder_poll_interval,
                NARROWEST_REMINDER_WINDOW
            );
        }
        if self.cleanup_grace_period < chrono::Duration::zero() {
            bail!("Cleanup grace period can not be negative");
        }
        Ok(())
    }

    pub fn require_discord_token(&self) -> Result<&str> {
        if self.discord_token.is_empty() {
            bail!("Missing env var ROLLCALL_DISCORD_TOKEN");
        }
        Ok(&self.discord_token)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_path: "./".to_string(),
            db_path: "./db".to_string(),
            discord_token: String::new(),
            discord_public_key: String::new(),
            discord_api_url: "https://discord.com/api/v10".to_string(),
            timezone: chrono_tz::Europe::Paris,
            reminder_poll_interval: Duration::from_secs(5 * 60),
            cleanup_poll_interval: Duration::from_secs(60 * 60),
            cleanup_grace_period: chrono::Duration::minutes(60),
            collaborator_timeout: Duration::from_secs(10),
            purge_limit: 100,
        }
    }
}

fn grace_period(minutes: u64) -> Result<chrono::Duration> {
    i64::try_from(minutes)
        .ok()
        .and_then(chrono::Duration::try_minutes)
        .ok_or_else(|| anyhow!("ROLLCALL_CLEANUP_GRACE_MINS {} is out of range", minutes))
}

fn u64_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
