//! Retry policies for automatic reconnection
//!
//! When the WebSocket connection to the node drops unexpectedly, the policy
//! decides:
//! - How long to wait before the next connection attempt
//! - Whether to keep trying or give up
//!
//! # Built-in Policies
//!
//! - **SteppedBackoff**: Delay grows in plateaus as attempts accumulate
//!   (default, never gives up)
//! - **FixedDelay**: Constant delay between attempts
//! - **NoRetry**: Don't reconnect (fail immediately)
//!
//! Implement the `RetryPolicy` trait for custom behavior.
//!
//! # Examples
//!
//! ```rust
//! use ledgerwire_client::{FixedDelay, SteppedBackoff};
//! use std::time::Duration;
//!
//! // Default: 50ms plateau rising to 30s, unlimited attempts
//! let default = SteppedBackoff::default();
//!
//! // Constant 2s delay, at most 5 attempts
//! let bounded = FixedDelay::new(Duration::from_secs(2)).with_max_attempts(5);
//! ```

use std::time::Duration;

/// Trait for reconnection retry policies
///
/// The policy is consulted once per reconnection attempt until either the
/// connection is restored or the policy indicates giving up. State accumulated
/// across attempts is cleared via `reset()` after a successful connection.
pub trait RetryPolicy: Send + Sync {
    /// Returns the delay before the next reconnection attempt
    ///
    /// # Arguments
    ///
    /// * `attempt` - The current attempt number (1-indexed)
    ///
    /// # Returns
    ///
    /// - `Some(duration)`: Wait this long before attempting reconnection
    /// - `None`: Give up and stay disconnected
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Reset the policy state after successful connection
    fn reset(&mut self);
}

/// Plateau-based backoff: short delays for a burst of early attempts, then
/// progressively longer plateaus. Never gives up.
///
/// | Attempts  | Delay |
/// |-----------|-------|
/// | 1 – 40    | 50 ms |
/// | 41 – 100  | 1 s   |
/// | 101 – 160 | 10 s  |
/// | 161+      | 30 s  |
///
/// The early burst rides out brief node restarts without a visible gap, while
/// the long tail avoids hammering a node that is down for maintenance.
pub struct SteppedBackoff {
    jitter: bool,
}

impl SteppedBackoff {
    pub fn new() -> Self {
        Self { jitter: false }
    }

    /// Enable jitter to prevent thundering herd (random 0-25% of delay)
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for SteppedBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy for SteppedBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        let base = match attempt {
            0..=40 => Duration::from_millis(50),
            41..=100 => Duration::from_secs(1),
            101..=160 => Duration::from_secs(10),
            _ => Duration::from_secs(30),
        };

        if self.jitter {
            use rand::Rng;
            let base_ms = base.as_millis() as u64;
            let jitter_ms = rand::thread_rng().gen_range(0..=(base_ms / 4));
            Some(Duration::from_millis(base_ms + jitter_ms))
        } else {
            Some(base)
        }
    }

    fn reset(&mut self) {
        // Stateless: the attempt counter lives in the connection
    }
}

/// Fixed delay retry policy
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Set the maximum number of attempts before giving up
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        Some(self.delay)
    }

    fn reset(&mut self) {
        // No state to reset for fixed delay
    }
}

/// Retry policy that never reconnects
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {
        // No state to reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stepped_backoff_plateaus() {
        let mut policy = SteppedBackoff::new();

        assert_eq!(policy.next_delay(1).unwrap(), Duration::from_millis(50));
        assert_eq!(policy.next_delay(40).unwrap(), Duration::from_millis(50));
        assert_eq!(policy.next_delay(41).unwrap(), Duration::from_secs(1));
        assert_eq!(policy.next_delay(100).unwrap(), Duration::from_secs(1));
        assert_eq!(policy.next_delay(101).unwrap(), Duration::from_secs(10));
        assert_eq!(policy.next_delay(160).unwrap(), Duration::from_secs(10));
        assert_eq!(policy.next_delay(161).unwrap(), Duration::from_secs(30));
        assert_eq!(policy.next_delay(10_000).unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn test_stepped_backoff_never_gives_up() {
        let mut policy = SteppedBackoff::new();
        assert!(policy.next_delay(u32::MAX).is_some());
    }

    #[test]
    fn test_stepped_backoff_jitter() {
        let mut policy = SteppedBackoff::new().with_jitter();

        // Between 1s and 1.25s (base + 25% jitter)
        let delay = policy.next_delay(50).unwrap();
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1250));
    }

    #[test]
    fn test_fixed_delay() {
        let mut policy = FixedDelay::new(Duration::from_secs(1)).with_max_attempts(3);

        assert_eq!(policy.next_delay(1).unwrap(), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2).unwrap(), Duration::from_secs(1));
        assert_eq!(policy.next_delay(3).unwrap(), Duration::from_secs(1));
        assert!(policy.next_delay(4).is_none()); // Exceeded max attempts
    }

    #[test]
    fn test_no_retry() {
        let mut policy = NoRetry;
        assert!(policy.next_delay(1).is_none());
        assert!(policy.next_delay(2).is_none());
    }
}
