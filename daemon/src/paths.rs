//! Canonical file locations for tickbar.
//!
//! The config file lives under $XDG_CONFIG_HOME (falling back to
//! ~/.config); the per-user runtime files (pid marker, trigger-channel
//! region and its client lock) live under $XDG_RUNTIME_DIR, falling back
//! to /tmp. Runtime file names carry the uid so multiple users can run
//! their own daemon on one machine.

use std::path::PathBuf;

const APP_NAME: &str = "tickbar";
pub const CONFIG_FILE_NAME: &str = "config.toml";

fn uid() -> u32 {
    // getuid cannot fail.
    unsafe { libc::getuid() }
}

fn runtime_dir() -> PathBuf {
    let dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(dir)
}

/// Returns the full path to the config file:
/// $XDG_CONFIG_HOME/tickbar/config.toml (or ~/.config/tickbar/config.toml).
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join(APP_NAME).join(CONFIG_FILE_NAME)
}

/// Liveness marker containing the daemon's pid.
pub fn pid_file_path() -> PathBuf {
    runtime_dir().join(format!("{APP_NAME}-{}.pid", uid()))
}

/// File backing the shared trigger-channel region.
pub fn channel_file_path() -> PathBuf {
    runtime_dir().join(format!("{APP_NAME}-{}.shm", uid()))
}

/// Advisory lock taken by clients while writing the trigger channel.
pub fn lock_file_path() -> PathBuf {
    runtime_dir().join(format!("{APP_NAME}-{}.lock", uid()))
}
