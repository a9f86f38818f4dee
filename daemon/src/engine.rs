//! Execution and trigger-routing engine.
//!
//! Owns the status bar, the trigger-channel reader and the sink, and is
//! driven exclusively from the daemon's event loop: scheduler ticks and
//! decoded triggers arrive as events, one at a time. That single consumer
//! is the critical section: while one event is being handled no other
//! mutation or assembly can run, so the published line always reflects the
//! cache at one assembly instant.

use crate::bar::StatusBar;
use crate::channel::TriggerChannel;
use crate::config::Config;
use crate::executor;
use crate::protocol::{Selector, TriggerMessage, MAX_ENV_STRINGS};
use crate::resolver::ClickTarget;
use crate::sink::StatusSink;

pub struct Engine {
    config: Config,
    bar: StatusBar,
    channel: Option<TriggerChannel>,
    sink: Box<dyn StatusSink>,
    /// Whole seconds since the daemon entered its loop.
    tick: u64,
}

/// Registry indices due for a periodic refresh at `tick`.
///
/// A segment with interval `n > 0` is due whenever `tick % n == 0`; a
/// segment with interval 0 is never due (trigger-driven only).
pub fn due_segments(config: &Config, tick: u64) -> Vec<usize> {
    config
        .segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.interval > 0 && tick % s.interval == 0)
        .map(|(i, _)| i)
        .collect()
}

impl Engine {
    pub fn new(config: Config, channel: Option<TriggerChannel>, sink: Box<dyn StatusSink>) -> Self {
        let bar = StatusBar::new(config.segments.len(), &config.delimiter);
        Self {
            config,
            bar,
            channel,
            sink,
            tick: 0,
        }
    }

    /// Startup pass: runs every segment once, then publishes.
    pub fn run_all_and_publish(&mut self) {
        for index in 0..self.config.segments.len() {
            self.execute(index, &[]);
        }
        self.publish();
    }

    /// Advances the scheduler by one second and refreshes every segment
    /// whose interval has elapsed. All segments due in the same tick are
    /// batched into a single republish.
    pub fn handle_tick(&mut self) {
        self.tick += 1;
        let mut dirty = false;
        for index in due_segments(&self.config, self.tick) {
            if self.execute(index, &[]) {
                dirty = true;
            }
        }
        if dirty {
            self.publish();
        }
    }

    /// Routes one decoded trigger: loads auxiliary strings if advertised,
    /// resolves the selector to a segment, executes it and republishes.
    /// Unroutable triggers are dropped; the client is fire-and-forget and
    /// gets no response either way.
    pub fn handle_trigger(&mut self, msg: TriggerMessage) {
        let extra_env = if msg.env_count > 0 {
            match &self.channel {
                Some(channel) => {
                    let mut vars = channel.consume();
                    // The count field caps what a client can advertise; don't
                    // let channel content exceed it.
                    vars.truncate(MAX_ENV_STRINGS as usize);
                    vars
                }
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let index = match msg.selector {
            Selector::Index(index) => {
                let index = index as usize;
                if index >= self.bar.segment_count() {
                    eprintln!("[trigger] Segment index {index} out of range, dropped");
                    return;
                }
                index
            }
            Selector::Offset(offset) => match self.bar.resolve_click(offset as usize) {
                ClickTarget::Segment(index) => index,
                ClickTarget::Delimiter => return, // click on a delimiter, nothing to do
                ClickTarget::InvalidUtf8 | ClickTarget::OutOfRange => {
                    eprintln!("[trigger] Offset {offset} does not resolve to a segment, dropped");
                    return;
                }
            },
        };

        if self.execute(index, &extra_env) {
            self.publish();
        }
    }

    /// Runs one segment's command, replacing its cache entry on success.
    /// On a spawn failure the entry keeps its previous value and the daemon
    /// carries on.
    fn execute(&mut self, index: usize, extra_env: &[String]) -> bool {
        let segment = &self.config.segments[index];
        match executor::run_segment(&segment.command, extra_env) {
            Ok(output) => {
                self.bar.set_output(index, output);
                true
            }
            Err(e) => {
                eprintln!("[exec] Segment {index} ({}): {e:#}", segment.tag);
                false
            }
        }
    }

    fn publish(&mut self) {
        let status = self.bar.assemble();
        self.sink.publish(status);
    }
}
