//! Common types and errors for AstroSync
//!
//! This crate provides the shared vocabulary used by the store, the sync engine
//! and the CLI: priority tiers, HTTP verbs, clock helpers and the base error type.

pub mod sanitizer;
pub mod telemetry;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Core error types for AstroSync operations
#[derive(Error, Debug)]
pub enum AstroError {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AstroError>;

/// Priority tier of a queued mutation.
///
/// Ordering follows the processing rank: `Critical < High < Medium < Low`,
/// so sorting ascending yields the order in which items must be replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// All tiers in processing order
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Numeric rank (critical=0 .. low=3)
    pub fn rank(self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Whether enqueuing at this tier should trigger an immediate pass
    pub fn is_urgent(self) -> bool {
        matches!(self, Priority::Critical | Priority::High)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(AstroError::ValidationError(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

/// HTTP verb of a queued mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = AstroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(AstroError::ValidationError(format!(
                "unknown HTTP method '{}'",
                other
            ))),
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Exit code constants
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_CONFIG_ERROR: i32 = 101;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_rank_order() {
        let mut tiers = vec![Priority::Low, Priority::Critical, Priority::Medium, Priority::High];
        tiers.sort();
        assert_eq!(tiers, Priority::ALL.to_vec());
        assert_eq!(Priority::Critical.rank(), 0);
        assert_eq!(Priority::Low.rank(), 3);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_serde_lowercase() {
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }

    #[test]
    fn test_method_parse_and_display() {
        let method: HttpMethod = "patch".parse().unwrap();
        assert_eq!(method, HttpMethod::Patch);
        assert_eq!(method.to_string(), "PATCH");
        assert_eq!(serde_json::to_string(&HttpMethod::Post).unwrap(), "\"POST\"");
    }

    #[test]
    fn test_urgent_tiers() {
        assert!(Priority::Critical.is_urgent());
        assert!(Priority::High.is_urgent());
        assert!(!Priority::Medium.is_urgent());
        assert!(!Priority::Low.is_urgent());
    }
}
