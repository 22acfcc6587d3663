// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::EventParseError;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single lifecycle event produced by a test runner.
///
/// Serialized as one JSON object per line, tagged by a `"type"` field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReporterEvent {
    /// The run started.
    Begin(RunBegin),

    /// A single attempt of a test finished.
    TestEnd(TestEnd),

    /// The run finished.
    End(RunEnd),
}

impl ReporterEvent {
    /// Parses a single line of the event stream.
    ///
    /// `line_number` is 1-based and is only used for error reporting.
    pub fn parse_line(line_number: usize, line: &str) -> Result<Self, EventParseError> {
        serde_json::from_str(line).map_err(|error| EventParseError::new(line_number, error))
    }
}

/// Information about the start of a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunBegin {
    /// The total number of tests the runner intends to execute.
    pub total_tests: usize,

    /// The number of workers executing tests in parallel.
    pub workers: usize,

    /// The directory that detail files are written to.
    pub output_dir: Utf8PathBuf,

    /// The projects (runner configurations) participating in this run.
    ///
    /// The first project is used as the default when a test doesn't declare its own.
    #[serde(default)]
    pub projects: Vec<String>,
}

/// A finished test attempt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestEnd {
    /// The test that finished.
    pub test: TestDescriptor,

    /// The outcome of this attempt.
    pub result: TestResult,
}

/// Describes a test independently of any particular attempt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestDescriptor {
    /// The hierarchical title of the test, outermost first.
    pub title_path: Vec<String>,

    /// The file the test is declared in.
    pub file: String,

    /// The line the test is declared on.
    pub line: u32,

    /// The column the test is declared on, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// The project this test belongs to, if the runner distinguishes projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl TestDescriptor {
    /// The separator used between components of [`Self::full_title`].
    pub const TITLE_SEPARATOR: &'static str = " > ";

    /// Returns the title path joined into a single human-readable string.
    pub fn full_title(&self) -> String {
        self.title_path
            .iter()
            .filter(|component| !component.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(Self::TITLE_SEPARATOR)
    }
}

/// The outcome of a single test attempt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestResult {
    /// The status of this attempt.
    pub status: TestStatus,

    /// The wall-clock duration of this attempt, in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,

    /// The retry index of this attempt. The first attempt is 0.
    #[serde(default)]
    pub retry: u32,

    /// The maximum number of retries the runner will perform for this test.
    #[serde(default)]
    pub max_retries: u32,

    /// The error produced by this attempt, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,

    /// Standard output captured during this attempt, in the order it was produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stdout: Vec<OutputChunk>,

    /// Standard error captured during this attempt, in the order it was produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stderr: Vec<OutputChunk>,

    /// Files attached to this attempt by the test.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl TestResult {
    /// Returns true if this attempt is the last one the runner will make for this test.
    ///
    /// Passing and skipped attempts are always final.
    pub fn is_final_attempt(&self) -> bool {
        !self.status.is_failure() || self.retry >= self.max_retries
    }
}

/// The status of a single test attempt.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test exceeded its timeout.
    #[serde(alias = "timedOut")]
    TimedOut,

    /// The test was skipped.
    Skipped,

    /// The test was interrupted before it could finish.
    Interrupted,
}

impl TestStatus {
    /// Returns true if this status indicates a failing attempt.
    pub fn is_failure(self) -> bool {
        match self {
            TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted => true,
            TestStatus::Passed | TestStatus::Skipped => false,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "passed"),
            TestStatus::Failed => write!(f, "failed"),
            TestStatus::TimedOut => write!(f, "timed-out"),
            TestStatus::Skipped => write!(f, "skipped"),
            TestStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// The error reported for a failing attempt.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestError {
    /// The error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The stack trace, one frame per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A chunk of captured output.
///
/// Chunk boundaries carry no meaning: a single line may be split across several chunks, and a
/// single chunk may contain several lines.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputChunk {
    /// Output that was already decoded as text.
    Text(String),

    /// Raw output bytes, decoded as UTF-8 (lossily) by consumers.
    Bytes(Vec<u8>),
}

impl OutputChunk {
    /// Returns the raw bytes of this chunk.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            OutputChunk::Text(text) => text.as_bytes(),
            OutputChunk::Bytes(bytes) => bytes,
        }
    }
}

impl From<&str> for OutputChunk {
    fn from(text: &str) -> Self {
        OutputChunk::Text(text.to_owned())
    }
}

/// A file attached to a test attempt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Attachment {
    /// The name of the attachment.
    pub name: String,

    /// The on-disk path of the attachment, if it was written to a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Utf8PathBuf>,

    /// The MIME type of the attachment, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Information about the end of a run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunEnd {
    /// The overall status the runner assigned to the run.
    pub status: RunStatus,

    /// The wall-clock duration of the run, in milliseconds.
    ///
    /// If absent, the reporter measures the duration itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// The overall status of a run.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Every test passed.
    Passed,

    /// At least one test failed.
    Failed,

    /// The run exceeded its global timeout.
    #[serde(alias = "timedOut")]
    TimedOut,

    /// The run was interrupted.
    Interrupted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Passed => write!(f, "passed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::TimedOut => write!(f, "timed-out"),
            RunStatus::Interrupted => write!(f, "interrupted"),
        }
    }
}
