//! Runs one segment's shell command and captures a bounded slice of its
//! stdout.
//!
//! Execution blocks the caller until the command produces its first line or
//! exits. There is deliberately no timeout: a hung command stalls the
//! scheduler or the trigger response until it terminates. This is a known
//! limitation inherited from the design, not papered over here.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::process::{Command, Stdio};

use crate::config::MAX_OUTPUT_BYTES;

/// Runs `command` under `sh -c` and returns the first line of its stdout,
/// truncated to [`MAX_OUTPUT_BYTES`], without the trailing newline.
///
/// Each `extra_env` entry of the form `NAME=VALUE` is injected into this one
/// invocation's environment only; entries without `=` are ignored. The
/// returned bytes are not guaranteed to be valid UTF-8 (truncation can split
/// a multi-byte sequence).
///
/// Errors only when the subprocess cannot be spawned or its pipe cannot be
/// read; callers keep the previous cached output in that case.
pub fn run_segment(command: &str, extra_env: &[String]) -> Result<Vec<u8>> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped());
    for entry in extra_env {
        if let Some((name, value)) = entry.split_once('=') {
            cmd.env(name, value);
        }
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn `sh -c {command}`"))?;
    let stdout = child
        .stdout
        .take()
        .context("child stdout pipe was not captured")?;

    let mut reader = std::io::BufReader::new(stdout);
    let mut output: Vec<u8> = Vec::with_capacity(MAX_OUTPUT_BYTES);
    loop {
        let chunk = reader
            .fill_buf()
            .context("Failed to read segment command output")?;
        if chunk.is_empty() {
            break; // EOF
        }
        let line_end = chunk.iter().position(|&b| b == b'\n');
        let available = line_end.unwrap_or(chunk.len());
        let take = available.min(MAX_OUTPUT_BYTES - output.len());
        output.extend_from_slice(&chunk[..take]);
        let consumed = match line_end {
            Some(n) => n + 1,
            None => chunk.len(),
        };
        reader.consume(consumed);
        if line_end.is_some() || output.len() == MAX_OUTPUT_BYTES {
            break;
        }
    }

    // Closing the pipe lets a still-writing child terminate via SIGPIPE.
    drop(reader);
    let _ = child.wait();

    Ok(output)
}
