// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded extraction of console output.
//!
//! Tests can produce an arbitrary amount of output. This module keeps only the most recent lines
//! of it, without ever holding more than a small multiple of the line limit in memory.

use crate::config::Limit;
use agent_report_metadata::OutputChunk;
use bstr::ByteSlice;

/// Appended, on its own line, to output that was cut at the character limit.
pub const TRUNCATION_MARKER: &str = "\n... [output truncated]";

/// The buffer is compacted once it holds this many times the line limit.
const COMPACTION_FACTOR: usize = 2;

/// Limits applied when rendering a log window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LogLimits {
    /// The maximum number of non-blank lines. The most recent lines are kept.
    pub max_lines: Limit,

    /// The maximum number of characters, excluding [`TRUNCATION_MARKER`].
    pub max_chars: Limit,
}

impl LogLimits {
    /// No limits at all.
    pub const UNBOUNDED: Self = Self {
        max_lines: Limit::Unbounded,
        max_chars: Limit::Unbounded,
    };
}

/// The retained non-blank lines of a test's output: stdout lines first, then stderr lines.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LogWindow {
    lines: Vec<String>,
}

impl LogWindow {
    /// Collects the last `max_lines` non-blank lines of `stdout` followed by `stderr`.
    ///
    /// If `strip_ansi` is true, ANSI escape sequences are removed from each line before blank
    /// lines are dropped.
    pub fn collect(
        stdout: &[OutputChunk],
        stderr: &[OutputChunk],
        max_lines: Limit,
        strip_ansi: bool,
    ) -> Self {
        let mut window = LineWindow::new(max_lines.count());
        if !max_lines.is_zero() {
            for stream in [stdout, stderr] {
                let mut splitter = LineSplitter::default();
                for chunk in stream {
                    splitter.feed(chunk.as_bytes(), |line| window.push_line(line, strip_ansi));
                }
                splitter.finish(|line| window.push_line(line, strip_ansi));
            }
        }
        Self {
            lines: window.finish(),
        }
    }

    /// Returns true if no lines were retained.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns the number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Renders the window, narrowed to `limits`.
    ///
    /// Rendering never re-reads the original output, so a single collected window can produce both
    /// an unbounded and a bounded view.
    pub fn render(&self, limits: LogLimits) -> String {
        let start = match limits.max_lines.count() {
            Some(max) => self.lines.len().saturating_sub(max),
            None => 0,
        };
        let mut out = self.lines[start..].join("\n");

        if let Some(max_chars) = limits.max_chars.count()
            && let Some((idx, _)) = out.char_indices().nth(max_chars)
        {
            out.truncate(idx);
            out.push_str(TRUNCATION_MARKER);
        }
        out
    }
}

/// Extracts a bounded window of `stdout` followed by `stderr`.
pub fn extract(
    stdout: &[OutputChunk],
    stderr: &[OutputChunk],
    limits: LogLimits,
    strip_ansi: bool,
) -> String {
    if limits.max_lines.is_zero() {
        return String::new();
    }
    LogWindow::collect(stdout, stderr, limits.max_lines, strip_ansi).render(limits)
}

/// A sliding window over lines with amortized constant-time insertion.
///
/// Old lines are discarded in batches: the buffer grows to [`COMPACTION_FACTOR`] times the
/// capacity, and is then cut back down to the capacity in a single pass.
#[derive(Debug)]
struct LineWindow {
    lines: Vec<String>,
    capacity: Option<usize>,
}

impl LineWindow {
    fn new(capacity: Option<usize>) -> Self {
        let initial = capacity.map_or(0, |capacity| capacity.saturating_mul(COMPACTION_FACTOR));
        Self {
            lines: Vec::with_capacity(initial.min(4096)),
            capacity,
        }
    }

    fn push_line(&mut self, raw: &[u8], strip_ansi: bool) {
        let line = String::from_utf8_lossy(raw.strip_suffix(b"\r").unwrap_or(raw));
        let line = if strip_ansi {
            strip_ansi_escapes::strip_str(&line)
        } else {
            line.into_owned()
        };
        if line.trim().is_empty() {
            return;
        }
        self.push(line);
    }

    fn push(&mut self, line: String) {
        match self.capacity {
            Some(0) => {}
            Some(capacity) => {
                self.lines.push(line);
                if self.lines.len() >= capacity.saturating_mul(COMPACTION_FACTOR) {
                    self.compact(capacity);
                }
            }
            None => self.lines.push(line),
        }
    }

    fn compact(&mut self, capacity: usize) {
        let excess = self.lines.len().saturating_sub(capacity);
        self.lines.drain(..excess);
    }

    fn finish(mut self) -> Vec<String> {
        if let Some(capacity) = self.capacity {
            self.compact(capacity);
        }
        self.lines
    }
}

/// Splits a byte stream into lines, independently of how the stream was chunked.
#[derive(Debug, Default)]
struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    fn feed(&mut self, mut chunk: &[u8], mut emit: impl FnMut(&[u8])) {
        while let Some(pos) = chunk.find_byte(b'\n') {
            if self.partial.is_empty() {
                emit(&chunk[..pos]);
            } else {
                self.partial.extend_from_slice(&chunk[..pos]);
                emit(self.partial.as_slice());
                self.partial.clear();
            }
            chunk = &chunk[pos + 1..];
        }
        self.partial.extend_from_slice(chunk);
    }

    fn finish(self, mut emit: impl FnMut(&[u8])) {
        if !self.partial.is_empty() {
            emit(self.partial.as_slice());
        }
    }
}
