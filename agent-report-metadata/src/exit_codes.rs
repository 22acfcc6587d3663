// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `agent-report` failures.
///
/// `agent-report` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum AgentReportExitCode {}

impl AgentReportExitCode {
    /// No errors occurred and every test passed.
    pub const OK: i32 = 0;

    /// More tests failed than the configured maximum, and the report was cut short.
    ///
    /// The report stream contains an `<overflow>` element in this case, which distinguishes it
    /// from a crash.
    pub const TOO_MANY_FAILURES: i32 = 1;

    /// The run finished with a non-passing status.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// A user issue happened while setting up an invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// The configuration file could not be parsed.
    pub const CONFIG_PARSE_ERROR: i32 = 97;

    /// An event in the input stream could not be parsed.
    pub const EVENT_PARSE_ERROR: i32 = 98;

    /// Writing the report stream produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
