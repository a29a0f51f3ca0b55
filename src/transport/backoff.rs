//! Exponential backoff for the streaming reconnect loop

use serde::Deserialize;
use std::time::Duration;

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// First delay in milliseconds
    pub initial_ms: u64,
    /// Upper bound for a single delay in milliseconds
    pub max_ms: u64,
    /// Growth factor applied after every attempt
    pub multiplier: f64,
    /// Give up once the summed delays reach this many milliseconds.
    /// `None` retries forever.
    pub max_elapsed_ms: Option<u64>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 60_000,
            multiplier: 1.5,
            max_elapsed_ms: None,
        }
    }
}

impl BackoffPolicy {
    pub fn start(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

/// One run of retries. Create a fresh one (or [`reset`](Self::reset)) after
/// every success.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    current: Duration,
    elapsed: Duration,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        let current = Duration::from_millis(policy.initial_ms);
        Self {
            policy,
            current,
            elapsed: Duration::ZERO,
        }
    }

    /// Delay before the next attempt, or `None` once retries are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(limit) = self.policy.max_elapsed_ms {
            if self.elapsed >= Duration::from_millis(limit) {
                return None;
            }
        }
        let delay = self.current;
        self.elapsed += delay;

        let max = Duration::from_millis(self.policy.max_ms);
        // Out-of-range products (huge or infinite multipliers) saturate at the cap
        let factor = self.policy.multiplier.max(1.0);
        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * factor).unwrap_or(max);
        self.current = grown.min(max);
        Some(delay.min(max))
    }

    pub fn reset(&mut self) {
        self.current = Duration::from_millis(self.policy.initial_ms);
        self.elapsed = Duration::ZERO;
    }
}
