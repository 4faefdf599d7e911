//! Named sync strategies

use crate::queue::SyncQueueItem;
use crate::{Result, SyncError};
use astro_common::Priority;
use astro_config::StrategyOverride;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const IMMEDIATE: &str = "immediate";
pub const BATCH: &str = "batch";
pub const BACKGROUND: &str = "background";

/// Largest backoff exponent; the delay stops doubling after six retries
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// What to do when the server answers a write with a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Local write wins; resend it
    Client,
    /// Server state wins; drop the local write
    Server,
    /// Overlay local fields on the server body and resend
    Merge,
    /// Leave the item queued and ask the user
    Prompt,
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictResolution::Client => "client",
            ConflictResolution::Server => "server",
            ConflictResolution::Merge => "merge",
            ConflictResolution::Prompt => "prompt",
        };
        f.write_str(name)
    }
}

impl FromStr for ConflictResolution {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(ConflictResolution::Client),
            "server" => Ok(ConflictResolution::Server),
            "merge" => Ok(ConflictResolution::Merge),
            "prompt" => Ok(ConflictResolution::Prompt),
            other => Err(SyncError::Config(format!(
                "unknown conflict resolution '{}'",
                other
            ))),
        }
    }
}

/// Parameters of one kind of sync pass
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStrategy {
    pub name: String,
    /// The only tier this strategy drains
    pub priority: Priority,
    pub batch_size: usize,
    /// Base of the exponential backoff between attempts of one item
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub conflict_resolution: ConflictResolution,
}

impl SyncStrategy {
    pub fn immediate() -> Self {
        Self {
            name: IMMEDIATE.to_string(),
            priority: Priority::Critical,
            batch_size: 5,
            retry_delay: Duration::from_millis(1_000),
            max_retries: 3,
            conflict_resolution: ConflictResolution::Client,
        }
    }

    pub fn batch() -> Self {
        Self {
            name: BATCH.to_string(),
            priority: Priority::High,
            batch_size: 10,
            retry_delay: Duration::from_millis(5_000),
            max_retries: 5,
            conflict_resolution: ConflictResolution::Merge,
        }
    }

    pub fn background() -> Self {
        Self {
            name: BACKGROUND.to_string(),
            priority: Priority::Low,
            batch_size: 50,
            retry_delay: Duration::from_millis(30_000),
            max_retries: 10,
            conflict_resolution: ConflictResolution::Server,
        }
    }

    /// Apply the fields set in a config override
    pub fn apply(&mut self, o: &StrategyOverride) -> Result<()> {
        if let Some(priority) = o.priority {
            self.priority = priority;
        }
        if let Some(batch_size) = o.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(ms) = o.retry_delay_ms {
            self.retry_delay = Duration::from_millis(ms);
        }
        if let Some(max_retries) = o.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(resolution) = &o.conflict_resolution {
            self.conflict_resolution = resolution.parse()?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SyncError::Config(format!(
                "strategy '{}': batch_size must be greater than 0",
                self.name
            )));
        }
        if self.max_retries == 0 {
            return Err(SyncError::Config(format!(
                "strategy '{}': max_retries must be greater than 0",
                self.name
            )));
        }
        Ok(())
    }

    /// Wait required after the `retry_count`-th failed attempt
    pub fn backoff(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry_count - 1).min(MAX_BACKOFF_EXPONENT);
        self.retry_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(Duration::MAX)
    }

    /// Whether `item` was attempted too recently to be sent at `now` (ms)
    pub fn is_backing_off(&self, item: &SyncQueueItem, now: i64) -> bool {
        match item.last_attempt {
            Some(at) => {
                let wait = i64::try_from(self.backoff(item.retry_count).as_millis())
                    .unwrap_or(i64::MAX);
                now < at.saturating_add(wait)
            }
            None => false,
        }
    }
}

/// The strategies a coordinator can run, by name
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySet {
    strategies: BTreeMap<String, SyncStrategy>,
}

impl Default for StrategySet {
    fn default() -> Self {
        let mut set = Self {
            strategies: BTreeMap::new(),
        };
        set.insert(SyncStrategy::immediate());
        set.insert(SyncStrategy::batch());
        set.insert(SyncStrategy::background());
        set
    }
}

impl StrategySet {
    /// Defaults with config overrides applied; overrides may only name
    /// existing strategies
    pub fn with_overrides(overrides: &BTreeMap<String, StrategyOverride>) -> Result<Self> {
        let mut set = Self::default();
        for (name, o) in overrides {
            let strategy = set
                .strategies
                .get_mut(name)
                .ok_or_else(|| SyncError::UnknownStrategy(name.clone()))?;
            strategy.apply(o)?;
        }
        Ok(set)
    }

    pub fn get(&self, name: &str) -> Result<&SyncStrategy> {
        self.strategies
            .get(name)
            .ok_or_else(|| SyncError::UnknownStrategy(name.to_string()))
    }

    /// Add or replace a strategy
    pub fn insert(&mut self, strategy: SyncStrategy) {
        self.strategies.insert(strategy.name.clone(), strategy);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncStrategy> {
        self.strategies.values()
    }

    /// Same set with every retry delay set to `delay`
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        for strategy in self.strategies.values_mut() {
            strategy.retry_delay = delay;
        }
        self
    }
}
