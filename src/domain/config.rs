use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable holding the hosted service URL.
pub const SERVICE_URL_VAR: &str = "SUPABASE_URL";
/// Environment variable holding the hosted service access key.
pub const ACCESS_KEY_VAR: &str = "SUPABASE_KEY";

/// Which storage backend holds the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One tabular file per entity in the data directory.
    #[default]
    File,
    /// A hosted relational database reached over its REST interface.
    Hosted,
}

/// Configuration for a maintenance log workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// The active storage backend.
    pub backend: BackendKind,

    /// Directory holding the file stores, relative to the workspace root
    /// unless absolute.
    data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Name of the configuration file at the workspace root.
    pub const FILE_NAME: &'static str = "maintlog.toml";

    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Loads `maintlog.toml` from the workspace root, falling back to the
    /// defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(Self::FILE_NAME);
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::debug!("no {} found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized or the file
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// The data directory resolved against the workspace root.
    #[must_use]
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.data_dir)
    }

    /// Sets the data directory.
    pub fn set_data_dir(&mut self, data_dir: impl Into<PathBuf>) {
        self.data_dir = data_dir.into();
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Credentials for the hosted backend.
///
/// These are never read from the configuration file and never defaulted.
#[derive(Clone, PartialEq, Eq)]
pub struct HostedCredentials {
    /// Base URL of the hosted service.
    pub service_url: String,
    /// Access key sent with every request.
    pub access_key: String,
}

impl std::fmt::Debug for HostedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedCredentials")
            .field("service_url", &self.service_url)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

impl HostedCredentials {
    /// Resolves the credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] if either variable is unset
    /// or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves the credentials through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] if either variable is
    /// missing or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };

        Ok(Self {
            service_url: required(SERVICE_URL_VAR)?,
            access_key: required(ACCESS_KEY_VAR)?,
        })
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    /// The configuration file could not be written.
    #[error("failed to write config file: {0}")]
    Write(#[source] std::io::Error),
    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[source] toml::de::Error),
    /// The configuration could not be serialized.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),
    /// A hosted-backend credential is absent from the environment.
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),
}

/// The serialized versions of the configuration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        backend: BackendKind,

        #[serde(default = "default_data_dir")]
        data_dir: PathBuf,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 { backend, data_dir } => Self { backend, data_dir },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            backend: config.backend,
            data_dir: config.data_dir,
        }
    }
}
