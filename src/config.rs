use std::error::Error;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_DB_PATH: &str = ".tasksync/tasks.sqlite";
pub const DEFAULT_REMOTE_PATH: &str = ".tasksync/remote.sqlite";
const SESSION_FILE_NAME: &str = "session.json";

/// Optional on-disk settings. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub remote_path: Option<String>,
    #[serde(default)]
    pub session_path: Option<PathBuf>,
}

impl ConfigFile {
    /// A missing file is treated as an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
}

/// Resolved paths. Precedence: explicit flag or env, then config file, then
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: String,
    pub remote_path: String,
    pub session_path: PathBuf,
}

impl Settings {
    pub fn resolve(db: Option<&str>, remote: Option<&str>, file: &ConfigFile) -> Self {
        let db_path = db
            .map(str::to_string)
            .or_else(|| file.db_path.clone())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let remote_path = remote
            .map(str::to_string)
            .or_else(|| file.remote_path.clone())
            .unwrap_or_else(|| DEFAULT_REMOTE_PATH.to_string());
        let session_path = file
            .session_path
            .clone()
            .unwrap_or_else(|| default_session_path(&db_path));
        Self {
            db_path,
            remote_path,
            session_path,
        }
    }
}

fn default_session_path(db_path: &str) -> PathBuf {
    match Path::new(db_path).parent() {
        Some(parent) => parent.join(SESSION_FILE_NAME),
        None => PathBuf::from(SESSION_FILE_NAME),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config I/O error: {}", err),
            ConfigError::Toml(err) => write!(f, "invalid config file: {}", err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Toml(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}
