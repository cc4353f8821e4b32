// External crates
use config::{Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

/// File name looked up in the working directory and in the home directory.
pub const CONFIG_FILE_NAME: &str = ".gtail";

/// Prefix of environment variables overriding file settings, e.g. `GTAIL_SERVER__URI`.
pub const ENV_PREFIX: &str = "GTAIL";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration file: {paths}")]
    NotFound { paths: String },
    #[error("Could not read server uri from configuration file.")]
    MissingUri,
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
}

/// Connection settings for the Graylog REST API.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub uri: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How requests authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Access token, sent as basic auth with the literal password `token`.
    Token(String),
    Basic { username: String, password: String },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ServerConfig {
    /// The credential to send with every request. A token wins over a
    /// username/password pair.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(Credential::Token(token.to_string()));
        }

        match (&self.username, &self.password) {
            (Some(username), Some(password)) if !username.is_empty() => Some(Credential::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Default lookup paths: `./.gtail`, then `~/.gtail`.
#[must_use]
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(CONFIG_FILE_NAME));
    }
    paths
}

impl Config {
    /// Load and merge the configuration files at `paths` (TOML).
    ///
    /// Missing files are skipped but at least one must exist. When several
    /// exist, earlier paths take precedence over later ones, and `GTAIL_*`
    /// environment variables take precedence over every file.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        Self::load_with_env(paths, None)
    }

    /// Like [`Config::load`], reading overrides from `env` instead of the
    /// process environment when given.
    #[instrument(
        name = "config_loader",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load_with_env<P: AsRef<Path>>(
        paths: &[P],
        env: Option<Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let existing: Vec<&Path> = paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| path.is_file())
            .collect();

        if existing.is_empty() {
            let paths = paths
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::error!(config_paths = %paths, "No readable configuration file found");
            return Err(ConfigError::NotFound { paths });
        }

        // Sources added later override earlier ones, so files go in reverse.
        let mut builder = config::Config::builder();
        for path in existing.iter().rev() {
            tracing::trace!(configuration_file_path = %path.display(), "Adding configuration file");
            builder = builder.add_source(File::from(*path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let settings = match builder.build() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse configuration");
                return Err(e.into());
            }
        };

        match settings.get_string("server.uri") {
            Ok(uri) if !uri.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingUri),
        }

        let mut config: Config = settings.try_deserialize()?;
        config.server.uri = config.server.uri.trim().trim_end_matches('/').to_string();

        tracing::trace!(server_uri = %config.server.uri, "gtail configuration loaded successfully");
        Ok(config)
    }
}
