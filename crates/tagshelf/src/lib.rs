//! HTTP and WebSocket front end for a tag-encoded media library.
//!
//! - `config` - settings from the environment
//! - `ops` - requests shared by both transports
//! - `server` - axum router, handlers and socket channel
//! - `upload` - paste-host clients
//! - `platform` - reveal-in-file-manager

pub mod config;
pub mod error;
pub mod ops;
pub mod platform;
pub mod server;
pub mod upload;

pub use crate::config::{Config, UploadBackend};
pub use crate::error::{ConfigError, RevealError};
pub use crate::server::{Server, ServerState};
