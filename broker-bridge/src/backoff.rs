//! Reconnect backoff policy
//!
//! The bridge retries forever; only the delay between attempts grows.

use std::time::Duration;

/// Exponential backoff settings for broker reconnection
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    /// Default: 500 milliseconds
    pub initial_delay: Duration,

    /// Upper bound for the delay
    /// Default: 30 seconds
    pub max_delay: Duration,

    /// Growth factor applied after each failed attempt
    /// Default: 2.0
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), crate::BridgeError> {
        if self.initial_delay.is_zero() {
            return Err(crate::BridgeError::Configuration(
                "Reconnect initial delay must be greater than 0".to_string(),
            ));
        }

        if self.max_delay < self.initial_delay {
            return Err(crate::BridgeError::Configuration(
                "Reconnect max delay must not be less than the initial delay".to_string(),
            ));
        }

        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(crate::BridgeError::Configuration(
                "Reconnect multiplier must be at least 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Stateful delay generator driven by a [`ReconnectConfig`]
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let current = config.initial_delay;
        Self {
            config,
            current,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt; grows for the one after
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempts = self.attempts.saturating_add(1);
        self.current = self
            .current
            .mul_f64(self.config.multiplier)
            .min(self.config.max_delay);
        delay
    }

    /// Number of failed attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over after a successful connection
    pub fn reset(&mut self) {
        self.current = self.config.initial_delay;
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let mut backoff = Backoff::new(config());

        let delays: Vec<u128> = (0..6).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.attempts(), 6);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = Backoff::new(config());
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_validate() {
        assert!(ReconnectConfig::default().validate().is_ok());

        let zero = ReconnectConfig {
            initial_delay: Duration::ZERO,
            ..config()
        };
        assert!(zero.validate().is_err());

        let inverted = ReconnectConfig {
            max_delay: Duration::from_millis(10),
            ..config()
        };
        assert!(inverted.validate().is_err());

        let shrinking = ReconnectConfig {
            multiplier: 0.5,
            ..config()
        };
        assert!(shrinking.validate().is_err());
    }
}
