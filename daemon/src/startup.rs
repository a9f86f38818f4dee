//! Liveness marker bookkeeping.
//!
//! The daemon refuses to start while a pid file names a live process; a
//! marker left behind by a crashed daemon is removed together with its
//! channel and lock files before startup proceeds.

use anyhow::{bail, Context, Result};
use std::path::Path;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Claims the liveness marker at `pid_path` for this process.
///
/// If a marker already exists and its process is still alive, startup is
/// refused. A stale marker is removed along with `stale_paths` (leftover
/// channel and lock files from the dead daemon).
pub fn claim_pid_file(pid_path: &Path, stale_paths: &[&Path]) -> Result<()> {
    if pid_path.exists() {
        match read_pid(pid_path) {
            Some(pid) if process_alive(pid) => {
                bail!("daemon already running (pid {pid}, marker {})", pid_path.display());
            }
            _ => {
                eprintln!(
                    "[startup] Removing stale runtime files left by a previous daemon ({})",
                    pid_path.display()
                );
                let _ = std::fs::remove_file(pid_path);
                for path in stale_paths {
                    let _ = std::fs::remove_file(path);
                }
            }
        }
    }
    std::fs::write(pid_path, format!("{}\n", std::process::id()))
        .with_context(|| format!("Failed to write pid file: {}", pid_path.display()))
}

/// Reads the daemon pid from the marker, if present and parseable.
pub fn read_pid(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    content.trim().parse().ok()
}

/// Whether a process with `pid` currently exists.
pub fn process_alive(pid: u32) -> bool {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), false);
    sys.process(Pid::from_u32(pid)).is_some()
}

/// Removes the given runtime files, logging rather than failing: cleanup
/// runs on the way out and must not mask the original exit reason.
pub fn cleanup(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                eprintln!("[startup] Failed to remove {}: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_writes_own_pid() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("daemon.pid");
        claim_pid_file(&pid_path, &[]).unwrap();
        assert_eq!(read_pid(&pid_path), Some(std::process::id()));
    }

    #[test]
    fn claim_refuses_live_marker() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("daemon.pid");
        // The test process itself is certainly alive.
        std::fs::write(&pid_path, format!("{}\n", std::process::id())).unwrap();
        assert!(claim_pid_file(&pid_path, &[]).is_err());
    }

    #[test]
    fn claim_removes_stale_marker_and_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("daemon.pid");
        let shm_path = dir.path().join("daemon.shm");
        // Pid u32::MAX - 1 is far above any real pid limit.
        std::fs::write(&pid_path, format!("{}\n", u32::MAX - 1)).unwrap();
        std::fs::write(&shm_path, b"stale").unwrap();

        claim_pid_file(&pid_path, &[&shm_path]).unwrap();
        assert_eq!(read_pid(&pid_path), Some(std::process::id()));
        assert!(!shm_path.exists());
    }

    #[test]
    fn claim_replaces_unparseable_marker() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("daemon.pid");
        std::fs::write(&pid_path, "not a pid\n").unwrap();
        claim_pid_file(&pid_path, &[]).unwrap();
        assert_eq!(read_pid(&pid_path), Some(std::process::id()));
    }

    #[test]
    fn read_pid_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_pid(&dir.path().join("nope.pid")), None);
    }

    #[test]
    fn process_alive_for_self_and_not_for_bogus_pid() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(u32::MAX - 1));
    }

    #[test]
    fn cleanup_removes_files_and_tolerates_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        let missing = dir.path().join("missing");
        std::fs::write(&present, b"x").unwrap();
        cleanup(&[&present, &missing]);
        assert!(!present.exists());
    }
}
