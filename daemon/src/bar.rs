//! Per-segment output cache and status-line assembly.
//!
//! The bar is owned by the engine and only mutated through `&mut` methods,
//! all of which run on the daemon's single event loop. Triggers arriving
//! from the signal listener are queued as events and drained between loop
//! iterations, so an assembly can never observe a half-written cache entry.

use crate::config::MAX_OUTPUT_BYTES;
use crate::resolver::{self, ClickTarget};

pub struct StatusBar {
    delimiter: String,
    /// One bounded output buffer per segment, overwritten in place.
    cache: Vec<Vec<u8>>,
    /// The most recently assembled status line.
    status: Vec<u8>,
}

impl StatusBar {
    pub fn new(segment_count: usize, delimiter: &str) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            cache: vec![Vec::new(); segment_count],
            status: Vec::new(),
        }
    }

    pub fn segment_count(&self) -> usize {
        self.cache.len()
    }

    /// Replaces segment `index`'s cached output, enforcing the byte cap.
    pub fn set_output(&mut self, index: usize, mut output: Vec<u8>) {
        output.truncate(MAX_OUTPUT_BYTES);
        self.cache[index] = output;
    }

    /// Rebuilds the status line from the cache, joining segment outputs in
    /// registry order with the delimiter, and returns it.
    pub fn assemble(&mut self) -> &[u8] {
        self.status.clear();
        for (i, output) in self.cache.iter().enumerate() {
            if i > 0 {
                self.status.extend_from_slice(self.delimiter.as_bytes());
            }
            self.status.extend_from_slice(output);
        }
        &self.status
    }

    /// The last assembled status line (empty before the first `assemble`).
    pub fn status(&self) -> &[u8] {
        &self.status
    }

    /// Resolves a character offset in the last assembled status line.
    pub fn resolve_click(&self, char_offset: usize) -> ClickTarget {
        resolver::segment_from_offset(&self.status, &self.delimiter, char_offset)
    }
}
