//! Redaction of credentials and personal data before they reach the logs.
//!
//! Transport errors frequently echo the full request URL, which may carry
//! access tokens in the query string.

use regex::Regex;
use std::sync::OnceLock;

static PATTERNS: OnceLock<Vec<(Regex, String)>> = OnceLock::new();

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("sanitizer patterns are static and valid")
}

pub struct LogSanitizer {
    patterns: Vec<(Regex, String)>,
}

impl LogSanitizer {
    pub fn new() -> Self {
        let patterns = PATTERNS.get_or_init(|| {
            vec![
                (
                    compile(r"(?i)(bearer\s+)[a-z0-9._~+/=-]+"),
                    "${1}***".to_string(),
                ),
                (
                    compile(r"(?i)([?&](?:access_token|token|api_key|apikey|key)=)[^&\s]+"),
                    "${1}***".to_string(),
                ),
                (
                    compile(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
                    "***@***.***".to_string(),
                ),
                (
                    compile(r"(sk|pk)-[a-zA-Z0-9]{20,}"),
                    "$1-***".to_string(),
                ),
            ]
        });

        Self {
            patterns: patterns.clone(),
        }
    }

    pub fn sanitize(&self, message: &str) -> String {
        let mut result = message.to_string();
        for (pattern, replacement) in &self.patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }
        result
    }
}

impl Default for LogSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
