//! Configuration file loading
//!
//! Loads the TOML configuration, falling back to a list of default file
//! locations and finally to built-in defaults when no file exists.

use crate::{ConfigError, ConfigResult};
use std::path::Path;

use super::Config;

/// Config files probed, in order, when no explicit path is given
pub const DEFAULT_CONFIG_FILES: &[&str] = &["gemplex.toml", "/etc/gemplex.toml"];

/// Loads the configuration.
///
/// With an explicit `path` the file must exist and parse. Without one,
/// the default locations are probed in order; if none exists the
/// built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> ConfigResult<Config> {
    let content = match path {
        Some(p) => std::fs::read_to_string(p)?,
        None => {
            let mut found = None;
            for candidate in DEFAULT_CONFIG_FILES {
                if let Ok(content) = std::fs::read_to_string(candidate) {
                    tracing::info!("Using config file: {}", candidate);
                    found = Some(content);
                    break;
                }
            }
            match found {
                Some(content) => content,
                None => {
                    tracing::info!("No config file found; proceeding with defaults");
                    return Ok(Config::default());
                }
            }
        }
    };

    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> ConfigResult<()> {
    if config.index.batch_size == 0 {
        return Err(ConfigError::Validation(
            "index batch-size must be greater than zero".to_string(),
        ));
    }

    if config.crawl.fanout == 0 {
        return Err(ConfigError::Validation(
            "crawl fanout must be greater than zero".to_string(),
        ));
    }

    if config.crawl.queue_size == 0 {
        return Err(ConfigError::Validation(
            "crawl queue-size must be greater than zero".to_string(),
        ));
    }

    if config.search.socket_path.is_empty() {
        return Err(ConfigError::Validation(
            "search socket-path must not be empty".to_string(),
        ));
    }

    Ok(())
}
