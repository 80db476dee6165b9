//! Coordinator configuration.

use std::time::Duration;

/// Main coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound for each participant's Cancel during compensation.
    /// `None` waits for every Cancel however long it takes.
    pub cancel_timeout: Option<Duration>,
    /// Log level.
    pub log_level: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            cancel_timeout: None,
            log_level: "info".to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(ms) = std::env::var("TCC_CANCEL_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                config.cancel_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Bound every Cancel by `timeout`.
    pub fn with_cancel_timeout(mut self, timeout: Duration) -> Self {
        self.cancel_timeout = Some(timeout);
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cancel_timeout == Some(Duration::ZERO) {
            return Err("Cancel timeout cannot be zero".to_string());
        }

        if self.log_level.is_empty() {
            return Err("Log level cannot be empty".to_string());
        }

        Ok(())
    }
}
