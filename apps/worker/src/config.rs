use std::{env, fmt, fs, io, path};

use checkup::TwilioConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read { path: path::PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: path::PathBuf, source: io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no config directory: neither XDG_CONFIG_HOME nor HOME is set")]
    PathUnavailable,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: Scheduler,
    pub rotation: Rotation,
    pub storage: Storage,
    pub logs: Logs,
    pub alerts: Alerts,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub interval_seconds: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self { interval_seconds: checkup::DEFAULT_CHECK_INTERVAL_SECS }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Rotation {
    pub interval_seconds: u64,
}

impl Default for Rotation {
    fn default() -> Self {
        Self { interval_seconds: checkup::DEFAULT_ROTATION_INTERVAL_SECS }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Libsql,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Libsql => write!(f, "libsql"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub backend: StorageBackend,
    /// Root of the JSON record files
    pub data_dir: path::PathBuf,
    pub database_path: path::PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            data_dir: ".data".into(),
            database_path: "checkup.db".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Logs {
    pub dir: path::PathBuf,
}

impl Default for Logs {
    fn default() -> Self {
        Self { dir: ".logs".into() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertProvider {
    #[default]
    Log,
    Twilio,
}

impl fmt::Display for AlertProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Twilio => write!(f, "twilio"),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alerts {
    pub provider: AlertProvider,
    pub twilio: TwilioConfig,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/checkup/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("checkup/config.toml"))
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "********" }
}

fn or_unset(value: &str) -> &str {
    if value.is_empty() { "<unset>" } else { value }
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
        let write_title_2 = write_title_indented(2);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Worker Configuration:")?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Interval (s)", &self.scheduler.interval_seconds)?;
        write_title_1(f, "Rotation")?;
        write_1(f, "Interval (s)", &self.rotation.interval_seconds)?;
        write_title_1(f, "Storage")?;
        write_1(f, "Backend", &self.storage.backend)?;
        match self.storage.backend {
            StorageBackend::File => write_1(f, "Data Directory", &self.storage.data_dir.display())?,
            StorageBackend::Libsql => {
                write_1(f, "Database", &self.storage.database_path.display())?
            }
        }
        write_title_1(f, "Logs")?;
        write_1(f, "Directory", &self.logs.dir.display())?;
        write_title_1(f, "Alerts")?;
        write_1(f, "Provider", &self.alerts.provider)?;

        if self.alerts.provider == AlertProvider::Twilio {
            let twilio = &self.alerts.twilio;
            write_title_2(f, "Twilio")?;
            write_2(f, "Account SID", &or_unset(&twilio.account_sid))?;
            write_2(f, "Auth Token", &mask(&twilio.auth_token))?;
            write_2(f, "From", &or_unset(&twilio.from_phone))?;
            write_2(f, "Country Code", &twilio.country_code)?;
            write_2(f, "API", &twilio.api_base)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/checkup/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::Read { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::Write { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })
    }

    /// Apply `TWILIO_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let twilio = &mut self.alerts.twilio;
        let overrides = [
            ("TWILIO_SID", &mut twilio.account_sid),
            ("TWILIO_TOKEN", &mut twilio.auth_token),
            ("TWILIO_FROM_PHONE", &mut twilio.from_phone),
        ];

        for (name, field) in overrides {
            if let Some(value) = lookup(name).filter(|value| !value.trim().is_empty()) {
                *field = value.trim().to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_normalize_toml_path() {
        assert_eq!(normalize_toml_path(path::Path::new("a/b")), path::PathBuf::from("a/b.toml"));
        assert_eq!(
            normalize_toml_path(path::Path::new("a/b.json")),
            path::PathBuf::from("a/b.toml")
        );
        assert_eq!(
            normalize_toml_path(path::Path::new("a/b.toml")),
            path::PathBuf::from("a/b.toml")
        );
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/worker");

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.scheduler.interval_seconds, 60);
        assert_eq!(config.rotation.interval_seconds, 86_400);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.alerts.provider, AlertProvider::Log);
        assert_eq!(config.alerts.twilio.country_code, "+27");
        assert!(dir.path().join("nested/worker.toml").exists());

        // The written file loads back to the same values
        let reloaded = Config::from_config(Some(&path)).unwrap();
        assert_eq!(reloaded.logs.dir, config.logs.dir);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[scheduler]\ninterval_seconds = 5\n\n[alerts]\nprovider = \"twilio\"\n\n[alerts.twilio]\naccount_sid = \"AC1\"\n",
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();

        assert_eq!(config.scheduler.interval_seconds, 5);
        assert_eq!(config.rotation.interval_seconds, 86_400);
        assert_eq!(config.alerts.provider, AlertProvider::Twilio);
        assert_eq!(config.alerts.twilio.account_sid, "AC1");
        assert_eq!(config.alerts.twilio.api_base, "https://api.twilio.com");
    }

    #[test]
    fn test_invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[storage]\nbackend = \"postgres\"\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> =
            HashMap::from([("TWILIO_SID", "AC9"), ("TWILIO_TOKEN", " tok "), ("TWILIO_FROM_PHONE", "")]);

        let mut config = Config::default();
        config.alerts.twilio.from_phone = "+100".into();
        config.apply_overrides(|name| vars.get(name).map(|value| value.to_string()));

        assert_eq!(config.alerts.twilio.account_sid, "AC9");
        assert_eq!(config.alerts.twilio.auth_token, "tok");
        assert_eq!(config.alerts.twilio.from_phone, "+100");
    }

    #[test]
    fn test_display_masks_token() {
        let mut config = Config::default();
        config.alerts.provider = AlertProvider::Twilio;
        config.alerts.twilio.auth_token = "very-secret".into();

        let shown = config.to_string();

        assert!(shown.contains("Auth Token: ********"));
        assert!(!shown.contains("very-secret"));
        assert!(shown.contains("Account SID: <unset>"));
    }
}
