use std::path::Path;
use std::time::Duration;

use canvasprobe_gateway::BridgeSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid settings YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid setting `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Per-session knobs.
///
/// ```yaml
/// timeout_ms: 30000
/// poll_interval_ms: 50
/// refresh_on_start: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionSettings {
    /// Upper bound for every remote call, in milliseconds.
    pub timeout_ms: u64,
    /// Sleep between completion checks of a blocking call.
    pub poll_interval_ms: u64,
    /// Load the model snapshot as soon as the session is connected.
    pub refresh_on_start: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            poll_interval_ms: 50,
            refresh_on_start: true,
        }
    }
}

impl SessionSettings {
    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and validate a settings file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let settings = Self::from_yaml_reader(file)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("timeout_ms", "must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.poll_interval_ms > self.timeout_ms {
            return Err(ConfigError::invalid(
                "poll_interval_ms",
                format!(
                    "{}ms exceeds the {}ms timeout",
                    self.poll_interval_ms, self.timeout_ms
                ),
            ));
        }
        Ok(())
    }

    pub fn bridge(&self) -> BridgeSettings {
        BridgeSettings {
            timeout: self.timeout(),
            poll_interval: self.poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let settings = SessionSettings::from_yaml_str("timeout_ms: 1000\n").unwrap();
        assert_eq!(settings.timeout_ms, 1000);
        assert_eq!(settings.poll_interval_ms, 50);
        assert!(settings.refresh_on_start);
        assert_eq!(settings.bridge().timeout, Duration::from_millis(1000));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SessionSettings::from_yaml_str("timeout: 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn validation_catches_bad_intervals() {
        let zero = SessionSettings {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::Invalid { field: "timeout_ms", .. })
        ));

        let slow = SessionSettings::default()
            .with_timeout(Duration::from_millis(100))
            .with_poll_interval(Duration::from_millis(200));
        assert!(matches!(
            slow.validate(),
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                ..
            })
        ));
        SessionSettings::default().validate().expect("defaults are valid");
    }

    #[test]
    fn yaml_round_trip() {
        let settings = SessionSettings {
            timeout_ms: 2500,
            poll_interval_ms: 10,
            refresh_on_start: false,
        };
        let yaml = settings.to_yaml().unwrap();
        assert_eq!(SessionSettings::from_yaml_str(&yaml).unwrap(), settings);
    }
}
