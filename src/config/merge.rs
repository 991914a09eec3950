use super::schema::{AppConfig, PartialConfig};
use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

impl PartialConfig {
    /// Merge self with a lower-priority fallback.
    /// Self's non-None values take precedence.
    pub fn with_fallback(self, fallback: PartialConfig) -> PartialConfig {
        PartialConfig {
            base_url: self.base_url.or(fallback.base_url),
            request_timeout_secs: self.request_timeout_secs.or(fallback.request_timeout_secs),
            poll_base_interval_ms: self.poll_base_interval_ms.or(fallback.poll_base_interval_ms),
            poll_max_interval_ms: self.poll_max_interval_ms.or(fallback.poll_max_interval_ms),
            poll_backoff_factor: self.poll_backoff_factor.or(fallback.poll_backoff_factor),
            max_consecutive_failures: self
                .max_consecutive_failures
                .or(fallback.max_consecutive_failures),
            history_dir: self.history_dir.or(fallback.history_dir),
            seed_examples: self.seed_examples.or(fallback.seed_examples),
        }
    }

    /// Convert to AppConfig, filling any remaining gaps with defaults.
    ///
    /// `default_history_dir` is used when no layer names a history path.
    /// Polling values that would make the loop spin or never retry are
    /// rejected.
    pub fn finalize(self, default_history_dir: PathBuf) -> Result<AppConfig, ConfigError> {
        let poll_base_interval_ms = self.poll_base_interval_ms.unwrap_or(2000);
        let poll_max_interval_ms = self.poll_max_interval_ms.unwrap_or(10_000);
        let poll_backoff_factor = self.poll_backoff_factor.unwrap_or(1.5);
        let max_consecutive_failures = self.max_consecutive_failures.unwrap_or(3);

        if poll_base_interval_ms == 0 {
            return Err(ConfigError::MergeError(
                "polling.base_interval_ms must be greater than 0".to_string(),
            ));
        }
        if poll_max_interval_ms < poll_base_interval_ms {
            return Err(ConfigError::MergeError(format!(
                "polling.max_interval_ms ({poll_max_interval_ms}) is below base_interval_ms ({poll_base_interval_ms})"
            )));
        }
        if !(poll_backoff_factor.is_finite() && poll_backoff_factor >= 1.0) {
            return Err(ConfigError::MergeError(format!(
                "polling.backoff_factor must be at least 1.0, got {poll_backoff_factor}"
            )));
        }
        if max_consecutive_failures == 0 {
            return Err(ConfigError::MergeError(
                "polling.max_consecutive_failures must be at least 1".to_string(),
            ));
        }

        Ok(AppConfig {
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout_secs: self.request_timeout_secs.unwrap_or(30),
            poll_base_interval_ms,
            poll_max_interval_ms,
            poll_backoff_factor,
            max_consecutive_failures,
            history_dir: self.history_dir.unwrap_or(default_history_dir),
            seed_examples: self.seed_examples.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_partial_finalizes_to_defaults() {
        let config = PartialConfig::default()
            .finalize(PathBuf::from("/data/history"))
            .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.poll_base_interval_ms, 2000);
        assert_eq!(config.poll_max_interval_ms, 10_000);
        assert_eq!(config.poll_backoff_factor, 1.5);
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.history_dir, PathBuf::from("/data/history"));
        assert!(config.seed_examples);
    }

    #[test]
    fn higher_layer_wins() {
        let cli = PartialConfig {
            base_url: Some("http://cli".to_string()),
            ..Default::default()
        };
        let local = PartialConfig {
            base_url: Some("http://local".to_string()),
            poll_base_interval_ms: Some(500),
            ..Default::default()
        };
        let global = PartialConfig {
            poll_base_interval_ms: Some(900),
            seed_examples: Some(false),
            ..Default::default()
        };

        let config = cli
            .with_fallback(local)
            .with_fallback(global)
            .finalize(PathBuf::from("h"))
            .unwrap();
        assert_eq!(config.base_url, "http://cli");
        assert_eq!(config.poll_base_interval_ms, 500);
        assert!(!config.seed_examples);
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let partial = PartialConfig {
            poll_backoff_factor: Some(0.5),
            ..Default::default()
        };
        assert!(matches!(
            partial.finalize(PathBuf::from("h")),
            Err(ConfigError::MergeError(_))
        ));
    }

    #[test]
    fn rejects_max_interval_below_base() {
        let partial = PartialConfig {
            poll_base_interval_ms: Some(5000),
            poll_max_interval_ms: Some(1000),
            ..Default::default()
        };
        assert!(partial.finalize(PathBuf::from("h")).is_err());
    }

    #[test]
    fn rejects_zero_failures_allowed() {
        let partial = PartialConfig {
            max_consecutive_failures: Some(0),
            ..Default::default()
        };
        assert!(partial.finalize(PathBuf::from("h")).is_err());
    }
}
