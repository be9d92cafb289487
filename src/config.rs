//! Playback configuration
//!
//! Settings can come from a YAML file and are overridden by command-line flags:
//!
//! ```yaml
//! host: acquisition-pc
//! port: 1972
//! strict: true
//! order: time
//! speed: 2.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::protocol::DEFAULT_PORT;
use crate::{PlaybackError, Result};

/// Order in which write operations are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    /// Exactly as listed in the timing file, even if times go backwards
    #[default]
    Script,
    /// Stable-sorted by scheduled time
    Time,
}

/// Settings for one playback run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Buffer host name
    pub host: String,

    /// Buffer port
    pub port: u16,

    /// Fail the run on the first rejected or failed write instead of logging it
    pub strict: bool,

    /// Dispatch order of write operations
    pub order: DispatchOrder,

    /// Playback speed multiplier (1.0 = as recorded, 2.0 = twice as fast)
    pub speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            strict: false,
            order: DispatchOrder::Script,
            speed: 1.0,
        }
    }
}

impl PlaybackConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| PlaybackError::Parse {
            context: "playback configuration".to_string(),
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PlaybackError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(PlaybackError::config(format!(
                "speed must be a positive number, got {}",
                self.speed
            )));
        }
        if self.host.trim().is_empty() {
            return Err(PlaybackError::config("host must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_buffer_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1972);
        assert!(!config.strict);
        assert_eq!(config.order, DispatchOrder::Script);
        assert_eq!(config.speed, 1.0);
        config.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = PlaybackConfig::from_yaml("port: 1973\norder: time\n").unwrap();
        assert_eq!(config.port, 1973);
        assert_eq!(config.order, DispatchOrder::Time);
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PlaybackConfig::from_yaml("speed: 0\n"),
            Err(PlaybackError::Config { .. })
        ));
        assert!(matches!(
            PlaybackConfig::from_yaml("speed: -2.5\n"),
            Err(PlaybackError::Config { .. })
        ));
        assert!(matches!(
            PlaybackConfig::from_yaml("order: random\n"),
            Err(PlaybackError::Parse { .. })
        ));
        assert!(matches!(
            PlaybackConfig::from_yaml("colour: blue\n"),
            Err(PlaybackError::Parse { .. })
        ));
    }

    #[test]
    fn loads_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("playback.yaml");
        std::fs::write(&path, "host: 10.0.0.5\nstrict: true\nspeed: 0.5\n")?;

        let config = PlaybackConfig::from_yaml_file(&path)?;
        assert_eq!(config.host, "10.0.0.5");
        assert!(config.strict);
        assert_eq!(config.speed, 0.5);
        Ok(())
    }
}
