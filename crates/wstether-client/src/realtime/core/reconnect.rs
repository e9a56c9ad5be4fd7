use std::time::Duration;

use crate::config::ReconnectSection;

/// Exponential backoff schedule: `initial * 2^n`, capped at `max_delay`,
/// for at most `max_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ReconnectSection) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            initial_delay: cfg.initial_delay(),
            max_delay: cfg.max_delay(),
        }
    }

    pub fn state(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 0,
            next_delay: self.initial_delay,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectSection::default())
    }
}

/// Progress through one reconnect cycle. Reset on every successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    policy: ReconnectPolicy,
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    /// Attempts consumed since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.policy.max_attempts
    }

    /// Claim the next attempt and return the delay to wait before it, or
    /// `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.exhausted() {
            return None;
        }
        self.attempt += 1;
        let delay = self.next_delay;
        self.next_delay = delay.saturating_mul(2).min(self.policy.max_delay);
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
        self.next_delay = self.policy.initial_delay;
    }
}
