//! Runtime configuration for the sync engine

use crate::strategy::StrategySet;
use crate::{Result, SyncError};
use astro_config::SyncSection;
use std::time::Duration;

/// Configuration for the sync coordinator and HTTP client
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_base_url: String,
    pub auth_token: Option<String>,

    /// Per-request timeout for queued mutations (default: 30 seconds)
    pub request_timeout: Duration,

    /// Period of the background pass (default: 5 minutes)
    pub background_interval: Duration,

    /// Reconnect settle delay before the batch pass (default: 2 seconds)
    pub settle_delay: Duration,

    pub strategies: StrategySet,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
            background_interval: Duration::from_secs(5 * 60),
            settle_delay: Duration::from_millis(2_000),
            strategies: StrategySet::default(),
        }
    }
}

impl TryFrom<&SyncSection> for SyncConfig {
    type Error = SyncError;

    fn try_from(section: &SyncSection) -> Result<Self> {
        let config = Self {
            api_base_url: section.api_base_url.clone(),
            auth_token: section.auth_token.clone().filter(|t| !t.is_empty()),
            request_timeout: Duration::from_millis(section.request_timeout_ms),
            background_interval: Duration::from_secs(section.background_interval_secs),
            settle_delay: Duration::from_millis(section.settle_delay_ms),
            strategies: StrategySet::with_overrides(&section.strategies)?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(SyncError::Config(
                "api_base_url must start with http:// or https://".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if self.background_interval.is_zero() {
            return Err(SyncError::Config(
                "background interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
