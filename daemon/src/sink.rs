//! Where the assembled status line goes.
//!
//! The sink is chosen once at startup: the root-window sink feeds window
//! managers that render the X root window name as their status bar, the
//! stdout sink feeds pipes and debugging sessions.

use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::process::Command;

/// Strategy for publishing one assembled status line.
pub trait StatusSink {
    fn publish(&mut self, status: &[u8]);
}

/// Prints each status line to stdout.
pub struct StdoutSink;

impl StatusSink for StdoutSink {
    fn publish(&mut self, status: &[u8]) {
        let mut out = std::io::stdout().lock();
        // A failed write is not worth stalling the daemon over.
        let _ = out.write_all(status);
        let _ = out.write_all(b"\n");
        let _ = out.flush();
    }
}

/// Sets the X root window name via `xsetroot -name`.
pub struct RootWindowSink;

impl StatusSink for RootWindowSink {
    fn publish(&mut self, status: &[u8]) {
        // Pass the raw bytes through; the status line is not guaranteed to
        // be valid UTF-8.
        let name = std::ffi::OsStr::from_bytes(status);
        match Command::new("xsetroot").arg("-name").arg(name).status() {
            Ok(code) if code.success() => {}
            Ok(code) => eprintln!("[sink] xsetroot exited with {code}"),
            Err(e) => eprintln!("[sink] Failed to run xsetroot: {e}"),
        }
    }
}

/// Records published lines for assertions in tests.
#[cfg(test)]
pub struct CaptureSink {
    pub lines: std::sync::Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
}

#[cfg(test)]
impl StatusSink for CaptureSink {
    fn publish(&mut self, status: &[u8]) {
        self.lines.lock().unwrap().push(status.to_vec());
    }
}
