use std::net::AddrParseError;

/// Errors raised while reading the server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }

    pub(crate) fn bad_address(key: &'static str, error: AddrParseError) -> Self {
        Self::invalid(key, error.to_string())
    }
}

/// Errors raised by the reveal-in-file-manager integration.
#[derive(Debug, thiserror::Error)]
pub enum RevealError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed with status {status}")]
    Status {
        command: &'static str,
        status: std::process::ExitStatus,
    },

    #[error("revealing files is not supported on this platform")]
    Unsupported,
}
