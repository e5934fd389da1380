//! Environment variable parsing helpers

use std::str::FromStr;

/// Parse `key`, falling back to `default` when unset or unparsable.
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
