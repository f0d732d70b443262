//! Reveal-in-file-manager integration.

use std::path::Path;
use std::process::{Command, ExitStatus};
use std::sync::Arc;

use crate::error::RevealError;

/// Shows a file in the desktop file manager.
pub trait Reveal: Send + Sync {
    fn reveal(&self, path: &Path) -> Result<(), RevealError>;
}

pub type SharedReveal = Arc<dyn Reveal>;

/// Reveals files with the platform's own file manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeReveal;

impl Reveal for NativeReveal {
    fn reveal(&self, path: &Path) -> Result<(), RevealError> {
        reveal_path_native(path)
    }
}

pub fn default_reveal() -> SharedReveal {
    Arc::new(NativeReveal)
}

#[cfg_attr(target_os = "windows", allow(dead_code))]
fn ensure_success(status: ExitStatus, command: &'static str) -> Result<(), RevealError> {
    if status.success() {
        Ok(())
    } else {
        Err(RevealError::Status { command, status })
    }
}

fn run(
    command: &'static str,
    configure: impl FnOnce(&mut Command),
) -> Result<ExitStatus, RevealError> {
    let mut process = Command::new(command);
    configure(&mut process);
    process
        .status()
        .map_err(|source| RevealError::Spawn { command, source })
}

#[cfg(target_os = "macos")]
fn reveal_path_native(path: &Path) -> Result<(), RevealError> {
    let status = run("open", |command| {
        command.arg("-R").arg(path);
    })?;
    ensure_success(status, "open")
}

// explorer.exe exits with 1 even when it succeeds.
#[cfg(target_os = "windows")]
fn reveal_path_native(path: &Path) -> Result<(), RevealError> {
    let mut argument = std::ffi::OsString::from("/select,");
    argument.push(path.as_os_str());
    run("explorer.exe", |command| {
        command.arg(argument);
    })?;
    Ok(())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn reveal_path_native(path: &Path) -> Result<(), RevealError> {
    let parent = path.parent().unwrap_or(path);
    let status = run("xdg-open", |command| {
        command.arg(parent);
    })?;
    ensure_success(status, "xdg-open")
}

#[cfg(not(any(unix, target_os = "windows")))]
fn reveal_path_native(_path: &Path) -> Result<(), RevealError> {
    Err(RevealError::Unsupported)
}
