use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Maximum size of one segment's captured stdout, in bytes. Longer output is
/// truncated without error; the cap may land mid-way through a multi-byte
/// UTF-8 sequence.
pub const MAX_OUTPUT_BYTES: usize = 32;

pub const DEFAULT_DELIMITER: &str = " | ";

/// Root configuration structure. Deserialized from
/// $XDG_CONFIG_HOME/tickbar/config.toml.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// String inserted between segment outputs in the status line.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_segments")]
    pub segments: Vec<Segment>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            segments: default_segments(),
        }
    }
}

/// One named command contributing one field to the status line.
///
/// A segment's identity is its zero-based position in the `segments` list;
/// that index is what clients put on the wire.
#[derive(Debug, Deserialize, Clone)]
pub struct Segment {
    /// Shell command run under `sh -c`.
    pub command: String,
    /// Refresh period in whole seconds; 0 means trigger-driven only.
    #[serde(default)]
    pub interval: u64,
    /// Human-chosen name used by tag-based triggers.
    pub tag: String,
}

impl Config {
    /// Rejects configurations the daemon cannot meaningfully run with.
    pub fn validate(&self) -> Result<()> {
        if self.segments.is_empty() {
            bail!("no segments configured, nothing to do");
        }
        if self.delimiter.is_empty() {
            bail!("delimiter must not be empty");
        }
        Ok(())
    }

    /// Registry indices of every segment whose tag equals `tag`.
    pub fn indices_for_tag(&self, tag: &str) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.tag == tag)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file
/// does not exist. Returns an error if the file exists but cannot be read or
/// parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_segments() -> Vec<Segment> {
    vec![
        Segment {
            command: "date '+%a %d %b %H:%M'".to_string(),
            interval: 60,
            tag: "time".to_string(),
        },
        Segment {
            command: "whoami".to_string(),
            interval: 0,
            tag: "user".to_string(),
        },
    ]
}
