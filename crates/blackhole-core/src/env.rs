//! Environment variable utilities
//!
//! Generic `env_get<T>` for parsing environment variables with defaults,
//! plus duration helpers for the millisecond/second knobs the server reads.
//!
//! # Usage
//!
//! ```ignore
//! use blackhole_core::env::{env_get, env_get_millis};
//!
//! let port: u16 = env_get("BH_PORT", 80);
//! let busy = env_get_millis("BH_BUSY_POLL_MS", Duration::from_millis(100));
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Get environment variable parsed as type T, or return default
///
/// A value that fails to parse yields the default as well.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts: "1", "true", "yes", "on" (case-insensitive) as true.
/// Any other value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as string, or return default
#[inline]
pub fn env_get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Integer milliseconds as a `Duration`.
#[inline]
pub fn env_get_millis(key: &str, default: Duration) -> Duration {
    env_get_opt::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Integer seconds as a `Duration`.
#[inline]
pub fn env_get_secs(key: &str, default: Duration) -> Duration {
    env_get_opt::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__BH_TEST_UNSET_VAR__", 42);
        assert_eq!(val, 42);

        let val: Option<u16> = env_get_opt("__BH_TEST_UNSET_VAR__");
        assert!(val.is_none());

        assert_eq!(env_get_str("__BH_TEST_UNSET_VAR__", "hello"), "hello");
        assert!(env_get_bool("__BH_TEST_UNSET_VAR__", true));
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__BH_TEST_NUM__", " 123 ");
        let val: usize = env_get("__BH_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__BH_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__BH_TEST_INVALID__", "not_a_number");
        let val: u16 = env_get("__BH_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__BH_TEST_INVALID__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        for (raw, expected) in [
            ("1", true),
            ("TRUE", true),
            ("on", true),
            ("0", false),
            ("garbage", false),
        ] {
            std::env::set_var("__BH_TEST_BOOL__", raw);
            assert_eq!(env_get_bool("__BH_TEST_BOOL__", !expected), expected, "{}", raw);
        }
        std::env::remove_var("__BH_TEST_BOOL__");
    }

    #[test]
    fn test_env_durations() {
        std::env::set_var("__BH_TEST_MS__", "250");
        assert_eq!(
            env_get_millis("__BH_TEST_MS__", Duration::ZERO),
            Duration::from_millis(250)
        );
        std::env::remove_var("__BH_TEST_MS__");

        assert_eq!(
            env_get_secs("__BH_TEST_SECS_UNSET__", Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }
}
