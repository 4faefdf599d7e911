//! Predicates for AstroSync CLI output

use predicates::prelude::*;

/// None of `values` appears in the text
///
/// ```rust
/// use astro_test_helpers::assertions::stderr_not_contains;
/// use predicates::prelude::*;
///
/// assert!(stderr_not_contains(&["ERROR", "WARN"]).eval("all quiet"));
/// ```
pub fn stderr_not_contains(values: &[&str]) -> impl Predicate<str> {
    let owned_values: Vec<String> = values.iter().map(|&s| s.to_string()).collect();
    predicate::function(move |s: &str| !owned_values.iter().any(|v| s.contains(v.as_str())))
}

/// The whole text parses as a JSON document
pub fn valid_json() -> impl Predicate<str> {
    predicate::function(|s: &str| serde_json::from_str::<serde_json::Value>(s.trim()).is_ok())
}

/// Text contains a queue id shaped like `sync_<millis>_<9 alphanumerics>`
pub fn contains_sync_id() -> impl Predicate<str> {
    predicate::function(|s: &str| s.split_whitespace().any(is_sync_id))
}

fn is_sync_id(token: &str) -> bool {
    let mut parts = token.splitn(3, '_');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some("sync"), Some(millis), Some(suffix))
            if !millis.is_empty()
                && millis.chars().all(|c| c.is_ascii_digit())
                && suffix.len() == 9
                && suffix.chars().all(|c| c.is_ascii_alphanumeric())
    )
}
