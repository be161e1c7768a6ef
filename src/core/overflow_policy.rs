//! What a producer does when a bounded bridge queue is full
//!
//! No policy drops records silently: a producer either waits for space or
//! gets an error that the logger reports on the fallback channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Policy for a full bounded queue
///
/// # Example
///
/// ```
/// use rust_json_logger::OverflowPolicy;
/// use std::time::Duration;
///
/// assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
/// let bounded_wait = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum OverflowPolicy {
    /// Wait until space is available, without timeout
    #[default]
    Block,

    /// Refuse the record immediately with `QueueFull`
    FailFast,

    /// Wait up to the given duration, then refuse with `QueueFull`
    #[serde(with = "timeout_millis")]
    BlockWithTimeout(Duration),
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::FailFast => write!(f, "FailFast"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
        }
    }
}

/// `{"policy": "block_with_timeout", "timeout_ms": 250}`
mod timeout_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Timeout {
        timeout_ms: u64,
    }

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        Timeout {
            timeout_ms: d.as_millis() as u64,
        }
        .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Timeout::deserialize(d).map(|t| Duration::from_millis(t.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_default() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::Block);
    }

    #[test]
    fn test_overflow_policy_display() {
        assert_eq!(OverflowPolicy::Block.to_string(), "Block");
        assert_eq!(OverflowPolicy::FailFast.to_string(), "FailFast");
        assert_eq!(
            OverflowPolicy::BlockWithTimeout(Duration::from_millis(100)).to_string(),
            "BlockWithTimeout(100ms)"
        );
    }

    #[test]
    fn test_overflow_policy_serde() {
        let policy: OverflowPolicy = serde_json::from_str(r#"{"policy":"fail_fast"}"#).unwrap();
        assert_eq!(policy, OverflowPolicy::FailFast);

        let policy: OverflowPolicy =
            serde_json::from_str(r#"{"policy":"block_with_timeout","timeout_ms":250}"#).unwrap();
        assert_eq!(policy, OverflowPolicy::BlockWithTimeout(Duration::from_millis(250)));
    }
}
