use instant::Duration;

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub const fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts,
        }
    }

    /// Peer link retries: 1s doubling to 8s, three attempts
    pub const fn link_retry() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(8), 3)
    }

    /// Relay reconnects: 2s doubling to 30s, five attempts
    pub const fn relay_reconnect() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(30), 5)
    }

    /// Delay before the given 1-based attempt, `None` once attempts are exhausted
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let delay = self.base.checked_mul(factor).unwrap_or(self.max);
        Some(delay.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_retry_schedule() {
        let backoff = Backoff::link_retry();
        assert_eq!(backoff.delay(1), Some(Duration::from_secs(1)));
        assert_eq!(backoff.delay(2), Some(Duration::from_secs(2)));
        assert_eq!(backoff.delay(3), Some(Duration::from_secs(4)));
        assert_eq!(backoff.delay(4), None);
    }

    #[test]
    fn test_relay_reconnect_is_capped() {
        let backoff = Backoff::relay_reconnect();
        assert_eq!(backoff.delay(4), Some(Duration::from_secs(16)));
        assert_eq!(backoff.delay(5), Some(Duration::from_secs(30)));
        assert_eq!(backoff.delay(6), None);
    }

    #[test]
    fn test_large_attempts_do_not_overflow() {
        let backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8), 100);
        assert_eq!(backoff.delay(64), Some(Duration::from_secs(8)));
    }
}
