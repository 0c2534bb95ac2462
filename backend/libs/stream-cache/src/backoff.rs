/// Reconnect delay schedule with exponential backoff and jitter
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Attempts per outage before giving up
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Add random jitter to each delay (±30%)
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffConfig {
    /// Delays for one outage, one per attempt
    pub fn delays(&self) -> Backoff {
        Backoff {
            config: self.clone(),
            attempt: 0,
            next: self.initial,
        }
    }
}

/// Finite iterator over reconnect delays
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
    next: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.config.max_attempts {
            return None;
        }
        self.attempt += 1;

        let base = self.next;
        self.next = Duration::from_millis(
            (base.as_millis() as f64 * self.config.multiplier)
                .min(self.config.max.as_millis() as f64) as u64,
        );

        Some(apply_jitter(base, self.config.jitter))
    }
}

fn apply_jitter(base: Duration, jitter: bool) -> Duration {
    if jitter {
        let factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
        Duration::from_millis((base.as_millis() as f64 * factor) as u64)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_and_capped() {
        let config = BackoffConfig {
            max_attempts: 5,
            initial: Duration::from_millis(100),
            max: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: false,
        };

        let delays: Vec<u64> = config.delays().map(|d| d.as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_attempts_are_capped() {
        let config = BackoffConfig {
            max_attempts: 2,
            ..Default::default()
        };
        assert_eq!(config.delays().count(), 2);

        let none = BackoffConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(none.delays().next(), None);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = BackoffConfig {
            max_attempts: 50,
            initial: Duration::from_millis(1000),
            max: Duration::from_millis(1000),
            multiplier: 1.0,
            jitter: true,
        };

        for delay in config.delays() {
            assert!(delay >= Duration::from_millis(700));
            assert!(delay <= Duration::from_millis(1300));
        }
    }
}
