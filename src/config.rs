//! Configuration manager for Yariga.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT: u64 = 10;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance.
    pub url: String,
    /// Listening port.
    pub port: Option<u16>,
    /// Seconds allowed for a call to the media host or identity provider.
    pub upstream_timeout: Option<u64>,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    /// An in-memory store is used when missing.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Cloudinary media hosting.
    #[serde(skip_serializing)]
    pub cloudinary: Option<Cloudinary>,
    /// Related to identity provider (Google Sign-In) verification.
    #[serde(skip_serializing)]
    pub identity: Option<Identity>,
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

/// Cloudinary configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cloudinary {
    /// Cloudinary cloud name.
    pub cloud_name: String,
    /// Cloudinary API key.
    pub api_key: String,
    /// Cloudinary API secret.
    /// Should never be shared!
    pub api_secret: String,
    /// Folder where listing photos are stored.
    pub folder: Option<String>,
}

/// Identity provider configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// OAuth client ID, expected as token audience.
    pub client_id: String,
    /// Public keys location (JWKS).
    pub jwks_url: Option<String>,
    /// Accepted token issuers.
    pub issuers: Option<Vec<String>>,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Listening port, `PORT` environment variable first.
    pub fn port(&self) -> u16 {
        std::env::var("PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .or(self.port)
            .unwrap_or(DEFAULT_PORT)
    }

    /// Timeout applied to outgoing calls.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(
            self.upstream_timeout.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT),
        )
    }

    /// Running version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            return Ok(Arc::new(self.error(err)));
                        },
                    };

                // set app version.
                config.version = VERSION.to_owned();

                // normalize URLs.
                if !config.url.is_empty() {
                    config.url = self.normalize_url(&config.url)?;
                }

                config.apply_env();
                Ok(Arc::new(config))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Secrets can be kept out of `config.yaml`.
    fn apply_env(&mut self) {
        if let (Some(postgres), Ok(password)) =
            (self.postgres.as_mut(), std::env::var("POSTGRES_PASSWORD"))
        {
            postgres.password = Some(password);
        }

        if let (Some(cloudinary), Ok(secret)) = (
            self.cloudinary.as_mut(),
            std::env::var("CLOUDINARY_API_SECRET"),
        ) {
            cloudinary.api_secret = secret;
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
