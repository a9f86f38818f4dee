//! Wire format and transport for asynchronous triggers.
//!
//! A trigger is one POSIX realtime-queued signal (`sigqueue`) carrying a
//! 32-bit payload:
//!
//! ```text
//! bits [0, 29)   selector: segment index (SIGUSR1) or character offset (SIGUSR2)
//! bits [29, 32)  auxiliary-string count, 0–7
//! ```
//!
//! A non-zero auxiliary count tells the daemon to read `NAME=VALUE` strings
//! out of the trigger channel before executing the segment. Client and
//! daemon must agree on this layout exactly; the widths are fixed and the
//! integer travels through `sigval.sival_ptr` on both sides so the encoding
//! is self-consistent regardless of how the union is laid out.

use anyhow::{bail, Context, Result};
use signal_hook::consts::{SIGHUP, SIGINT, SIGQUIT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::exfiltrator::WithRawSiginfo;
use signal_hook::iterator::SignalsInfo;
use tokio::sync::mpsc;

use crate::event::DaemonEvent;

/// Payload bits reserved for the auxiliary-string count.
pub const ENV_COUNT_BITS: u32 = 3;
/// Largest auxiliary-string count a trigger can advertise.
pub const MAX_ENV_STRINGS: u32 = (1 << ENV_COUNT_BITS) - 1;
const SELECTOR_BITS: u32 = u32::BITS - ENV_COUNT_BITS;
/// Largest encodable selector (segment index or character offset).
pub const MAX_SELECTOR: u32 = (1 << SELECTOR_BITS) - 1;

/// Signal number for direct (index-addressed) triggers.
pub const SIG_DIRECT: i32 = SIGUSR1;
/// Signal number for positional (offset-addressed) triggers.
pub const SIG_POSITIONAL: i32 = SIGUSR2;
/// Signals that move the daemon to shutdown.
pub const TERM_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// How a trigger addresses its segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Literal registry index.
    Index(u32),
    /// Character offset into the last published status line.
    Offset(u32),
}

/// One decoded trigger, fully consumed by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerMessage {
    pub selector: Selector,
    /// Number of auxiliary strings the client placed in the trigger channel.
    pub env_count: u32,
}

/// Packs `selector` and `env_count` into the payload integer.
pub fn encode_payload(selector: u32, env_count: u32) -> Result<u32> {
    if selector > MAX_SELECTOR {
        bail!("selector {selector} exceeds the {SELECTOR_BITS}-bit payload field");
    }
    if env_count > MAX_ENV_STRINGS {
        bail!("auxiliary count {env_count} exceeds maximum {MAX_ENV_STRINGS}");
    }
    Ok((env_count << SELECTOR_BITS) | selector)
}

/// Splits a payload integer into `(selector, env_count)`.
pub fn decode_payload(raw: u32) -> (u32, u32) {
    (raw & MAX_SELECTOR, raw >> SELECTOR_BITS)
}

// ── Client side ───────────────────────────────────────────────────────────────

/// Queues one trigger signal at the daemon. Fire-and-forget: delivery
/// carries no acknowledgment back.
pub fn send_trigger(pid: i32, selector: Selector, env_count: u32) -> Result<()> {
    let (signo, value) = match selector {
        Selector::Index(index) => (SIG_DIRECT, index),
        Selector::Offset(offset) => (SIG_POSITIONAL, offset),
    };
    let payload = encode_payload(value, env_count)?;
    let sv = libc::sigval {
        sival_ptr: payload as usize as *mut libc::c_void,
    };
    // Safety: plain syscall; pid and signo are validated by the kernel.
    let rc = unsafe { libc::sigqueue(pid, signo, sv) };
    if rc != 0 {
        bail!(
            "sigqueue to pid {pid} failed: {}",
            std::io::Error::last_os_error()
        );
    }
    Ok(())
}

// ── Daemon side ───────────────────────────────────────────────────────────────

/// Installs handlers for the trigger and termination signals and forwards
/// them into the event queue from a dedicated listener thread.
///
/// Signal delivery itself does no work beyond enqueueing; the dispatcher
/// drains triggers on the main event loop, which is what keeps cache
/// mutation and status assembly serialized.
pub fn spawn_listener(tx: mpsc::Sender<DaemonEvent>) -> Result<()> {
    let mut watched = vec![SIG_DIRECT, SIG_POSITIONAL];
    watched.extend(TERM_SIGNALS);
    let mut signals =
        SignalsInfo::<WithRawSiginfo>::new(&watched).context("Failed to install signal handlers")?;

    std::thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            for info in &mut signals {
                let signo = info.si_signo;
                if signo == SIG_DIRECT || signo == SIG_POSITIONAL {
                    // Safety: si_value is valid for queued user signals; for a
                    // plain kill(2) it reads as zero, which decodes harmlessly.
                    let raw = unsafe { info.si_value().sival_ptr } as usize as u32;
                    let (value, env_count) = decode_payload(raw);
                    let selector = if signo == SIG_DIRECT {
                        Selector::Index(value)
                    } else {
                        Selector::Offset(value)
                    };
                    let msg = TriggerMessage { selector, env_count };
                    if tx.blocking_send(DaemonEvent::Trigger(msg)).is_err() {
                        break;
                    }
                } else {
                    let _ = tx.blocking_send(DaemonEvent::Shutdown);
                    break;
                }
            }
        })
        .context("Failed to spawn signal-listener thread")?;
    Ok(())
}
