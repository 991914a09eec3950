pub mod merge;
pub mod schema;

pub use schema::*;

use crate::cli::{Cli, Commands};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "research-monitor.toml";

/// Load configuration by merging global, local, and CLI sources.
/// Precedence: CLI > local config > global config > defaults.
///
/// Missing config files are handled gracefully (defaults apply).
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let dirs = project_dirs();

    // Layer 1: Global config (~/.config/research-monitor/research-monitor.toml or platform equivalent)
    let global = match dirs.as_ref() {
        Some(d) => load_toml_file(&d.config_dir().join(CONFIG_FILE_NAME)).unwrap_or_default(),
        None => {
            tracing::debug!("Could not determine global config directory");
            PartialConfig::default()
        }
    };

    // Layer 2: --config path, or ./research-monitor.toml
    let local_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let local = load_toml_file(&local_path).unwrap_or_default();

    // Layer 3: CLI args
    let cli_partial = cli_to_partial(cli);

    let default_history_dir = dirs
        .map(|d| d.data_dir().join("history"))
        .unwrap_or_else(|| PathBuf::from("./history"));

    let config = cli_partial
        .with_fallback(local)
        .with_fallback(global)
        .finalize(default_history_dir)?;

    Ok(config)
}

/// Load and parse a TOML config file into a PartialConfig.
/// Returns None on file-not-found; parse and read errors are logged and ignored.
fn load_toml_file(path: &Path) -> Option<PartialConfig> {
    match parse_toml_file(path) {
        Ok(partial) => {
            tracing::info!("Loaded config from {}", path.display());
            Some(partial)
        }
        Err(ConfigError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            None
        }
        Err(e) => {
            tracing::warn!("Ignoring config: {}", e);
            None
        }
    }
}

fn parse_toml_file(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let file = toml::from_str::<ConfigFile>(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(file.to_partial())
}

/// Linux: ~/.config/research-monitor, ~/.local/share/research-monitor
/// macOS: ~/Library/Application Support/research-monitor
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "research-monitor")
}

/// Convert CLI arguments to a PartialConfig for merging.
fn cli_to_partial(cli: &Cli) -> PartialConfig {
    let poll_base_interval_ms = match &cli.command {
        Commands::Run {
            poll_interval_ms, ..
        } => *poll_interval_ms,
        _ => None,
    };

    PartialConfig {
        base_url: cli.base_url.clone(),
        history_dir: cli.history_dir.clone(),
        poll_base_interval_ms,
        ..Default::default()
    }
}
