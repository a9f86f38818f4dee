//! Trigger client: tells a running tickbar-daemon to refresh one segment
//! out of band.
//!
//! Fire-and-forget: a trigger that the daemon drops (bad index, offset on
//! a delimiter) produces no feedback here. Auxiliary NAME=VALUE strings are
//! passed through the shared trigger channel under an advisory lock held
//! from the first write until the signal has been queued.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};

use tickbar_daemon::channel::{ChannelLock, ChannelWriter};
use tickbar_daemon::config;
use tickbar_daemon::paths;
use tickbar_daemon::protocol::{self, Selector, MAX_ENV_STRINGS};
use tickbar_daemon::startup;

/// Asks the running tickbar daemon to refresh one segment out of band.
#[derive(Parser)]
#[command(name = "tickbar-ctl", version)]
struct Args {
    #[command(subcommand)]
    target: Target,
    /// Extra NAME=VALUE environment strings for the triggered command
    /// (e.g. -e BUTTON=2). At most 7 per trigger.
    #[arg(short, long = "env", value_name = "NAME=VALUE", global = true)]
    env: Vec<String>,
    /// Path to the configuration file (used for tag lookup).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Target {
    /// Trigger the segment at the given registry index.
    Index { index: u32 },
    /// Trigger every segment whose tag matches.
    Tag { tag: String },
    /// Trigger the segment under the given character offset in the
    /// published status line.
    Offset { offset: u32 },
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("tickbar-ctl: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    for var in &args.env {
        if !var.contains('=') {
            bail!("invalid auxiliary string {var:?}: expected NAME=VALUE");
        }
    }
    if args.env.len() > MAX_ENV_STRINGS as usize {
        bail!("at most {MAX_ENV_STRINGS} auxiliary strings fit in one trigger");
    }
    let env_count = args.env.len() as u32;

    let pid_path = paths::pid_file_path();
    let pid = startup::read_pid(&pid_path).ok_or_else(|| {
        anyhow!(
            "cannot read daemon pid from {} (is the daemon running?)",
            pid_path.display()
        )
    })? as i32;

    // Populate the channel before signaling; the lock stays held until the
    // signal is on its way so no concurrent client overwrites the region.
    let _lock = if env_count > 0 {
        let lock = ChannelLock::acquire(&paths::lock_file_path())?;
        let mut writer = ChannelWriter::open(&paths::channel_file_path())?;
        writer.publish(&args.env)?;
        Some(lock)
    } else {
        None
    };

    match args.target {
        Target::Index { index } => {
            protocol::send_trigger(pid, Selector::Index(index), env_count)?;
        }
        Target::Offset { offset } => {
            protocol::send_trigger(pid, Selector::Offset(offset), env_count)?;
        }
        Target::Tag { tag } => {
            // Tags are resolved from the same config file the daemon reads;
            // every match gets its own trigger.
            let config_path = args.config.unwrap_or_else(paths::config_file_path);
            let config = config::load_or_default(&config_path)?;
            for index in config.indices_for_tag(&tag) {
                protocol::send_trigger(pid, Selector::Index(index as u32), env_count)?;
            }
        }
    }
    Ok(())
}
