//! Overflow policy applied when the cache is at capacity.

use std::time::Duration;

use super::ConfigError;

const VALID_POLICIES: &str = "block, drop, timeout:N";

/// Determines how a producer reacts when the cache is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wake the flush worker and wait until it has drained the cache.
    #[default]
    Block,
    /// Reject the new entry and keep the cached ones.
    Drop,
    /// Like [`OverflowPolicy::Block`], but give up after the given duration.
    Timeout(Duration),
}

/// Parses a policy string into an [`OverflowPolicy`].
///
/// Accepted forms are `block`, `drop` and `timeout:N` where `N` is a positive
/// number of milliseconds. Matching is case-insensitive and ignores
/// surrounding whitespace.
pub fn parse_overflow_policy(policy: &str) -> Result<OverflowPolicy, ConfigError> {
    let normalized = policy.trim().to_ascii_lowercase();

    if let Some(rest) = normalized.strip_prefix("timeout:") {
        let ms: u64 = rest
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid("overflowPolicy", policy.trim()))?;
        if ms == 0 {
            return Err(ConfigError::invalid("overflowPolicy", policy.trim()));
        }
        return Ok(OverflowPolicy::Timeout(Duration::from_millis(ms)));
    }

    match normalized.as_str() {
        "block" => Ok(OverflowPolicy::Block),
        "drop" => Ok(OverflowPolicy::Drop),
        _ => Err(ConfigError::invalid(
            "overflowPolicy",
            format!("{normalized} (expected one of: {VALID_POLICIES})"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_drop_with_whitespace() {
        assert_eq!(parse_overflow_policy(" drop ").unwrap(), OverflowPolicy::Drop);
    }

    #[test]
    fn accepts_block_case_insensitive() {
        assert_eq!(parse_overflow_policy("BLOCK").unwrap(), OverflowPolicy::Block);
    }

    #[test]
    fn parses_timeout_values() {
        assert_eq!(
            parse_overflow_policy("timeout:250").unwrap(),
            OverflowPolicy::Timeout(Duration::from_millis(250))
        );
    }

    #[test]
    fn rejects_missing_or_zero_timeout() {
        assert!(parse_overflow_policy("timeout").is_err());
        assert!(parse_overflow_policy("timeout:0").is_err());
        assert!(parse_overflow_policy("timeout:-5").is_err());
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = parse_overflow_policy("spill").unwrap_err();
        assert!(err.to_string().contains("expected one of"));
    }
}
