use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use axum::http::HeaderName;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Service configuration, loaded once at startup and read-only afterwards.
///
/// Every section is optional; an empty YAML document yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:8000`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:8000".to_string()
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Directory whose immediate children are the archived clones.  Created on
    /// first use.
    #[serde(default = "default_archive_root")]
    pub root: String,
    /// git executable, either a bare name looked up in `PATH` or a full path.
    #[serde(default = "default_git_binary")]
    pub git_binary: String,
    /// How the size listing measures an entry.
    #[serde(default)]
    pub size_mode: SizeMode,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: default_archive_root(),
            git_binary: default_git_binary(),
            size_mode: SizeMode::default(),
        }
    }
}

/// What counts toward an entry's reported size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeMode {
    /// Only regular files directly inside the entry directory.
    #[default]
    TopLevel,
    /// Every regular file in the entry's tree.
    Recursive,
}

fn default_archive_root() -> String {
    "data".to_string()
}

fn default_git_binary() -> String {
    "git".to_string()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Name of the environment variable that holds the accepted API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Query parameter a caller may carry the key in.
    #[serde(default = "default_query_param")]
    pub query_param: String,
    /// Request header a caller may carry the key in.
    #[serde(default = "default_header_name")]
    pub header_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            query_param: default_query_param(),
            header_name: default_header_name(),
        }
    }
}

fn default_api_key_env() -> String {
    "ARCHIVE_API_KEY".to_string()
}

fn default_query_param() -> String {
    "api_key".to_string()
}

fn default_header_name() -> String {
    "x-api-key".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}

/// Parse and validate YAML config text.
pub fn parse_config(contents: &str) -> Result<Config> {
    // An empty document deserializes to `None` rather than an empty mapping.
    let config: Config = serde_yaml::from_str::<Option<Config>>(contents)?.unwrap_or_default();
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
pub fn validate_config(config: &Config) -> Result<()> {
    config
        .server
        .http_listen
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid http_listen address: {}", config.server.http_listen))?;
    anyhow::ensure!(
        !config.archive.root.trim().is_empty(),
        "archive.root must not be empty"
    );
    anyhow::ensure!(
        !config.archive.git_binary.trim().is_empty(),
        "archive.git_binary must not be empty"
    );
    anyhow::ensure!(
        !config.auth.api_key_env.trim().is_empty(),
        "auth.api_key_env must not be empty"
    );
    anyhow::ensure!(
        !config.auth.query_param.is_empty(),
        "auth.query_param must not be empty"
    );
    HeaderName::from_bytes(config.auth.header_name.as_bytes())
        .with_context(|| format!("invalid auth.header_name: {}", config.auth.header_name))?;
    Ok(())
}
