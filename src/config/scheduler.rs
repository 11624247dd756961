//! Reconciliation scheduling configuration

use cron::Schedule;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use super::error::ValidationError;

/// Cron expressions are five-field (`min hour dom mon dow`), evaluated in UTC.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_sync_cron")]
    pub sync_cron: String,

    #[serde(default = "default_removal_cron")]
    pub removal_cron: String,

    #[serde(default = "default_purge_cron")]
    pub purge_cron: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Idle worker poll interval, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How often the scheduler evaluates fire times, in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// How far back a fresh scheduler looks for missed fire times, in seconds.
    #[serde(default = "default_catch_up_secs")]
    pub catch_up_secs: u64,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn catch_up(&self) -> Duration {
        Duration::from_secs(self.catch_up_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_cron("scheduler.sync_cron", &self.sync_cron)?;
        check_cron("scheduler.removal_cron", &self.removal_cron)?;
        check_cron("scheduler.purge_cron", &self.purge_cron)?;

        if self.worker_count == 0 || self.worker_count > 32 {
            return Err(ValidationError::InvalidWorkerCount);
        }
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidWindow("scheduler.poll_interval_ms"));
        }
        if self.tick_secs == 0 {
            return Err(ValidationError::InvalidWindow("scheduler.tick_secs"));
        }
        Ok(())
    }
}

fn check_cron(name: &'static str, expression: &str) -> Result<(), ValidationError> {
    Schedule::from_str(&format!("0 {} *", expression.trim()))
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidCron {
            name,
            message: e.to_string(),
        })
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_cron: default_sync_cron(),
            removal_cron: default_removal_cron(),
            purge_cron: default_purge_cron(),
            worker_count: default_worker_count(),
            poll_interval_ms: default_poll_interval_ms(),
            tick_secs: default_tick_secs(),
            catch_up_secs: default_catch_up_secs(),
        }
    }
}

fn default_sync_cron() -> String {
    "0 2 * * *".to_string()
}

fn default_removal_cron() -> String {
    "0 */6 * * *".to_string()
}

fn default_purge_cron() -> String {
    "15 * * * *".to_string()
}

fn default_worker_count() -> usize {
    2
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_tick_secs() -> u64 {
    30
}

fn default_catch_up_secs() -> u64 {
    15 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SchedulerConfig::default();
        assert_eq!(config.sync_cron, "0 2 * * *");
        assert_eq!(config.removal_cron, "0 */6 * * *");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_cron_names_the_field() {
        let config = SchedulerConfig {
            removal_cron: "every six hours".to_string(),
            ..Default::default()
        };
        match config.validate() {
            Err(ValidationError::InvalidCron { name, .. }) => {
                assert_eq!(name, "scheduler.removal_cron")
            }
            other => panic!("expected InvalidCron, got {:?}", other),
        }
    }

    #[test]
    fn test_worker_count_bounds() {
        let config = SchedulerConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWorkerCount));
    }
}
