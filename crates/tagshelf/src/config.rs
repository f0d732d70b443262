//! Server configuration read from the environment.
//!
//! `.env` is loaded by the binary before [`Config::from_env`] runs, so every
//! setting can live there as well.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tagindex::DEFAULT_CACHE_CAPACITY;

use crate::error::ConfigError;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_UPLOAD_TABLE: &str = "uploaded.json";
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Which paste host receives uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadBackend {
    Rustypaste { url: String, auth: Option<String> },
    Catbox { userhash: Option<String> },
    Disabled,
}

impl UploadBackend {
    pub fn name(&self) -> &'static str {
        match self {
            UploadBackend::Rustypaste { .. } => "rustypaste",
            UploadBackend::Catbox { .. } => "catbox",
            UploadBackend::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for UploadBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Library root; every indexed file lives under it.
    pub search_folder: PathBuf,
    pub bind: SocketAddr,
    /// Front-end assets served under `/` and `/static`.
    pub static_dir: PathBuf,
    /// Flat JSON table of content hash to upload URL.
    pub upload_table: PathBuf,
    pub upload_backend: UploadBackend,
    pub upload_timeout: Duration,
    pub query_cache_capacity: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let search_folder = get("SEARCH_FOLDER")
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("SEARCH_FOLDER"))?;

        let bind = get("TAGSHELF_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .map_err(|error| ConfigError::bad_address("TAGSHELF_BIND", error))?;

        let static_dir = PathBuf::from(
            get("TAGSHELF_STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
        );
        let upload_table =
            PathBuf::from(get("UPLOADED_JSON").unwrap_or_else(|| DEFAULT_UPLOAD_TABLE.to_string()));

        let rustypaste_url = get("RUSTYPASTE_URL");
        let upload_backend = match get("UPLOAD_BACKEND").map(|value| value.to_ascii_lowercase()) {
            Some(name) if name == "rustypaste" => {
                let url = rustypaste_url.ok_or(ConfigError::Missing("RUSTYPASTE_URL"))?;
                UploadBackend::Rustypaste {
                    url,
                    auth: get("RUSTYPASTE_AUTH"),
                }
            }
            Some(name) if name == "catbox" => UploadBackend::Catbox {
                userhash: get("CATBOX_AUTH"),
            },
            Some(name) if name == "disabled" => UploadBackend::Disabled,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "UPLOAD_BACKEND",
                    format!("unknown backend {other:?}"),
                ))
            }
            None => match rustypaste_url {
                Some(url) => UploadBackend::Rustypaste {
                    url,
                    auth: get("RUSTYPASTE_AUTH"),
                },
                None => UploadBackend::Disabled,
            },
        };

        let upload_timeout = Duration::from_secs(parse_number(
            "UPLOAD_TIMEOUT_SECS",
            get("UPLOAD_TIMEOUT_SECS"),
            DEFAULT_UPLOAD_TIMEOUT_SECS,
        )?);
        let query_cache_capacity = parse_number(
            "QUERY_CACHE_CAPACITY",
            get("QUERY_CACHE_CAPACITY"),
            DEFAULT_CACHE_CAPACITY,
        )?;

        Ok(Self {
            search_folder,
            bind,
            static_dir,
            upload_table,
            upload_backend,
            upload_timeout,
            query_cache_capacity,
        })
    }
}

fn parse_number(
    key: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => match value.parse::<u64>() {
            Ok(0) => Err(ConfigError::invalid(key, "must be greater than zero")),
            Ok(number) => Ok(number),
            Err(error) => Err(ConfigError::invalid(key, error.to_string())),
        },
    }
}
