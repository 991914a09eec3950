use serde::Deserialize;
use std::path::PathBuf;

/// The TOML file structure for research-monitor.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub backend: Option<BackendSection>,
    pub polling: Option<PollingSection>,
    pub history: Option<HistorySection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollingSection {
    pub base_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySection {
    pub path: Option<String>,
    /// Write example records the first time history is opened.
    pub seed_examples: Option<bool>,
}

/// Fully-resolved runtime configuration. All fields have values.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub poll_base_interval_ms: u64,
    pub poll_max_interval_ms: u64,
    pub poll_backoff_factor: f64,
    pub max_consecutive_failures: u32,
    pub history_dir: PathBuf,
    pub seed_examples: bool,
}

/// Partial config used during merge. All fields are Option so that
/// missing fields don't override lower-priority values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub poll_base_interval_ms: Option<u64>,
    pub poll_max_interval_ms: Option<u64>,
    pub poll_backoff_factor: Option<f64>,
    pub max_consecutive_failures: Option<u32>,
    pub history_dir: Option<PathBuf>,
    pub seed_examples: Option<bool>,
}

impl ConfigFile {
    pub fn to_partial(self) -> PartialConfig {
        let backend = self.backend;
        let polling = self.polling;
        let history = self.history;

        PartialConfig {
            base_url: backend.as_ref().and_then(|b| b.base_url.clone()),
            request_timeout_secs: backend.as_ref().and_then(|b| b.request_timeout_secs),
            poll_base_interval_ms: polling.as_ref().and_then(|p| p.base_interval_ms),
            poll_max_interval_ms: polling.as_ref().and_then(|p| p.max_interval_ms),
            poll_backoff_factor: polling.as_ref().and_then(|p| p.backoff_factor),
            max_consecutive_failures: polling.as_ref().and_then(|p| p.max_consecutive_failures),
            history_dir: history
                .as_ref()
                .and_then(|h| h.path.as_ref())
                .map(PathBuf::from),
            seed_examples: history.as_ref().and_then(|h| h.seed_examples),
        }
    }
}
