use std::{env, fmt, fs, path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("Failed to write config {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: Engine,
    pub store: Store,
    pub alerts: Alerts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    /// Seconds between two ticks
    pub interval_seconds: u64,
    /// Upper bound on probes in flight at once
    pub max_concurrent_probes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    pub path: path::PathBuf,
    pub max_connections: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertProvider {
    #[default]
    Log,
    Twilio,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub provider: AlertProvider,
    pub twilio: TwilioConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    pub api_base: String,
    /// Prefix prepended to the stored 10-digit phone numbers
    pub country_code: String,
}

impl Default for Engine {
    fn default() -> Self {
        Self { interval_seconds: 60, max_concurrent_probes: 10 }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self { path: path::PathBuf::from(".data/uppe-checks.db"), max_connections: 8 }
    }
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_phone: String::new(),
            api_base: "https://api.twilio.com".into(),
            country_code: "+1".into(),
        }
    }
}

impl Engine {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/checks.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/checks.toml"))
}

fn mask(secret: &str) -> &str {
    if secret.is_empty() { "<unset>" } else { "********" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Engine")?;
        write_1(f, "Interval (s)", &self.engine.interval_seconds)?;
        write_1(f, "Max Concurrent Probes", &self.engine.max_concurrent_probes)?;
        write_title_1(f, "Store")?;
        write_1(f, "Path", &self.store.path.display())?;
        write_1(f, "Max Connections", &self.store.max_connections)?;
        write_title_1(f, "Alerts")?;
        write_1(f, "Provider", &format!("{:?}", self.alerts.provider).to_lowercase())?;
        if self.alerts.provider == AlertProvider::Twilio {
            write_2(f, "Account SID", &self.alerts.twilio.account_sid)?;
            write_2(f, "Auth Token", &mask(&self.alerts.twilio.auth_token))?;
            write_2(f, "From", &self.alerts.twilio.from_phone)?;
            write_2(f, "API Base", &self.alerts.twilio.api_base)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/checks.toml
    ///  or the specified path if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| ConfigError::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.with_env_overrides().validated()
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| ConfigError::WriteFailed(parent.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| ConfigError::WriteFailed(path.to_path_buf(), err))
    }

    /// Fill SMS credentials from `UPPE_TWILIO_*` variables when set
    pub fn with_env_overrides(mut self) -> Self {
        let twilio = &mut self.alerts.twilio;
        for (name, slot) in [
            ("UPPE_TWILIO_ACCOUNT_SID", &mut twilio.account_sid),
            ("UPPE_TWILIO_AUTH_TOKEN", &mut twilio.auth_token),
            ("UPPE_TWILIO_FROM_PHONE", &mut twilio.from_phone),
        ] {
            if let Ok(value) = env::var(name) {
                if !value.trim().is_empty() {
                    *slot = value.trim().to_string();
                }
            }
        }
        self
    }

    /// Reject values the engine cannot run with
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.engine.interval_seconds == 0 {
            return Err(ConfigError::Invalid("engine.interval_seconds must be at least 1".into()));
        }
        if self.engine.max_concurrent_probes == 0 {
            return Err(ConfigError::Invalid("engine.max_concurrent_probes must be at least 1".into()));
        }
        if self.alerts.provider == AlertProvider::Twilio {
            let twilio = &self.alerts.twilio;
            if twilio.account_sid.is_empty() || twilio.auth_token.is_empty() || twilio.from_phone.is_empty() {
                return Err(ConfigError::Invalid(
                    "alerts.provider = \"twilio\" needs account_sid, auth_token and from_phone".into(),
                ));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.interval(), Duration::from_secs(60));
        assert_eq!(config.engine.max_concurrent_probes, 10);
        assert_eq!(config.alerts.provider, AlertProvider::Log);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested/checks");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.engine, Engine::default());
        assert!(temp_dir.path().join("nested/checks.toml").exists());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("checks.toml");
        fs::write(&path, "[engine]\ninterval_seconds = 15\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.engine.interval_seconds, 15);
        assert_eq!(config.engine.max_concurrent_probes, 10);
        assert_eq!(config.store, Store::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.engine.max_concurrent_probes = 0;
        assert!(matches!(config.validated(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.alerts.provider = AlertProvider::Twilio;
        assert!(matches!(config.validated(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_display_masks_token() {
        let mut config = Config::default();
        config.alerts.provider = AlertProvider::Twilio;
        config.alerts.twilio.auth_token = "very-secret".into();

        let rendered = config.to_string();
        assert!(rendered.contains("Max Concurrent Probes: 10"));
        assert!(!rendered.contains("very-secret"));
    }
}
