//! Host configuration, stored as TOML under the platform config directory
//! (`~/.config/regionshot/regionshot.toml` on Linux).

use std::path::{Path, PathBuf};

use regionshot_types::{Rect, SelectorConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_NAME: &str = "regionshot";

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fixed display layout; empty means one display per connected monitor
    pub displays: Vec<Rect>,
    pub selector: SelectorConfig,
}

impl AppConfig {
    /// Load from `path`, or from the default location. A missing file is
    /// created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => confy::load_path(path)?,
            None => confy::load(APP_NAME, None)?,
        };
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<(), ConfigError> {
        match path {
            Some(path) => confy::store_path(path, self),
            None => confy::store(APP_NAME, None, self),
        }
        .map_err(ConfigError::Save)
    }

    /// Where [`AppConfig::load`] reads from when no path is given
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regionshot_types::MonitorBinding;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("regionshot-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let path = temp_config_path("missing.toml");
        let _ = std::fs::remove_file(&path);

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_store_then_load() {
        let path = temp_config_path("stored.toml");
        let mut config = AppConfig::default();
        config.displays = vec![Rect::new(0, 0, 1920, 1080), Rect::new(1920, 0, 2560, 1440)];
        config.selector.monitor_binding = MonitorBinding::AtCreation;
        config.selector.dim_factor = 0.4;

        config.save(Some(&path)).unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_config_path("partial.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[selector]\nsmooth = false\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.displays.is_empty());
        assert!(!config.selector.smooth);
        assert_eq!(config.selector.window_title, SelectorConfig::default().window_title);
    }
}
