use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use tickbar_daemon::channel::TriggerChannel;
use tickbar_daemon::config;
use tickbar_daemon::engine::Engine;
use tickbar_daemon::event::DaemonEvent;
use tickbar_daemon::paths;
use tickbar_daemon::protocol;
use tickbar_daemon::sink::{RootWindowSink, StatusSink, StdoutSink};
use tickbar_daemon::startup;

/// Runs the configured segment commands on their intervals and publishes
/// their outputs as one delimited status line. Use tickbar-ctl to refresh
/// individual segments out of band.
#[derive(Parser)]
#[command(name = "tickbar-daemon", version)]
struct Args {
    /// Print the status line to stdout instead of setting the root window name.
    #[arg(short, long)]
    print: bool,
    /// Path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = args.config.unwrap_or_else(paths::config_file_path);
    let config = match config::load_or_default(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[config] {e:#}");
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("[config] {e:#}");
        std::process::exit(1);
    }

    // ── Liveness marker ───────────────────────────────────────────────────────
    let pid_path = paths::pid_file_path();
    let channel_path = paths::channel_file_path();
    let lock_path = paths::lock_file_path();
    if let Err(e) = startup::claim_pid_file(&pid_path, &[&channel_path, &lock_path]) {
        eprintln!("[startup] {e:#}");
        std::process::exit(1);
    }

    // ── Trigger channel ───────────────────────────────────────────────────────
    let channel = match TriggerChannel::create(&channel_path) {
        Ok(ch) => ch,
        Err(e) => {
            eprintln!("[channel] {e:#}");
            startup::cleanup(&[&pid_path]);
            std::process::exit(1);
        }
    };

    let sink: Box<dyn StatusSink> = if args.print {
        Box::new(StdoutSink)
    } else {
        Box::new(RootWindowSink)
    };
    let mut engine = Engine::new(config, Some(channel), sink);

    // ── Event sources ─────────────────────────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    if let Err(e) = protocol::spawn_listener(event_tx.clone()) {
        eprintln!("[signal] {e:#}");
        startup::cleanup(&[&pid_path, &channel_path]);
        std::process::exit(1);
    }

    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await; // completes immediately; ticks start one second in
            loop {
                ticker.tick().await;
                if tx.send(DaemonEvent::Tick).await.is_err() {
                    break;
                }
            }
        });
    }

    // ── Initial publish ───────────────────────────────────────────────────────
    engine.run_all_and_publish();
    println!("tickbar-daemon v{} started", env!("CARGO_PKG_VERSION"));

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::Tick => engine.handle_tick(),
            DaemonEvent::Trigger(msg) => engine.handle_trigger(msg),
            DaemonEvent::Shutdown => {
                println!("Shutting down");
                break;
            }
        }
    }

    startup::cleanup(&[&pid_path, &channel_path]);
}
