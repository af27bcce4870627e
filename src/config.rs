//! Application-level configuration loading, including the scoring defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TALLY_BACK_CONFIG_PATH";

const DEFAULT_DROP_VALUE: u32 = 1;
const DEFAULT_BOARD_CHARGE: u32 = 0;
const DEFAULT_TRANSITION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Drop value recorded on new slots when the request does not set one.
    pub default_drop_value: u32,
    /// Board charge of new games when the request does not set one.
    pub default_board_charge: u32,
    /// Upper bound for store writes backing a state transition. `None` disables it.
    pub transition_timeout: Option<Duration>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        drop_value = app_config.default_drop_value,
                        board_charge = app_config.default_board_charge,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    default_drop_value: u32,
    default_board_charge: u32,
    /// `0` disables the timeout.
    transition_timeout_ms: u64,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            default_drop_value: DEFAULT_DROP_VALUE,
            default_board_charge: DEFAULT_BOARD_CHARGE,
            transition_timeout_ms: DEFAULT_TRANSITION_TIMEOUT_MS,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            default_drop_value: value.default_drop_value,
            default_board_charge: value.default_board_charge,
            transition_timeout: (value.transition_timeout_ms > 0)
                .then(|| Duration::from_millis(value.transition_timeout_ms)),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{ "default_board_charge": 2 }"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.default_drop_value, 1);
        assert_eq!(config.default_board_charge, 2);
        assert_eq!(config.transition_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let raw: RawConfig = serde_json::from_str(r#"{ "transition_timeout_ms": 0 }"#).unwrap();
        assert_eq!(AppConfig::from(raw).transition_timeout, None);
    }
}
