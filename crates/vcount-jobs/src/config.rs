//! Orchestrator configuration.

use std::time::Duration;

/// Polling cadences for one job.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Status poll interval
    pub poll_interval: Duration,
    /// Supplementary live-feed interval
    pub feed_interval: Duration,
    /// Whether to poll the live feed at all
    pub live_feed: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            feed_interval: Duration::from_millis(2000),
            live_feed: true,
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_millis(
                std::env::var("VCOUNT_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(1000),
            ),
            feed_interval: Duration::from_millis(
                std::env::var("VCOUNT_FEED_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(2000),
            ),
            live_feed: std::env::var("VCOUNT_LIVE_FEED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_feed_interval(mut self, interval: Duration) -> Self {
        self.feed_interval = interval;
        self
    }

    pub fn with_live_feed(mut self, enabled: bool) -> Self {
        self.live_feed = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadences() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.feed_interval, Duration::from_secs(2));
        assert!(config.live_feed);
    }
}
