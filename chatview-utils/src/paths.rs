//! Path utilities for chatview
//!
//! Handles XDG Base Directory specification compliance for the
//! configuration and state directories.

use std::path::{Path, PathBuf};
use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "chatview";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/chatview` or `~/.config/chatview`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Get the credentials file path (login name, token, default channel)
///
/// Location: `$XDG_CONFIG_HOME/chatview/credentials.toml`
pub fn credentials_file() -> PathBuf {
    config_dir().join("credentials.toml")
}

/// Get the display settings file path (channel color, badges, highlights)
///
/// Location: `$XDG_CONFIG_HOME/chatview/settings.toml`
pub fn settings_file() -> PathBuf {
    config_dir().join("settings.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/chatview` or `~/.local/state/chatview`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/chatview/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

/// Get the client log file
pub fn log_file() -> PathBuf {
    log_dir().join("chatview.log")
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}
