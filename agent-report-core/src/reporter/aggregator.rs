// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run-scoped counters and the per-test state transition.

use super::serialize::{FlakyTest, RunCounts};
use crate::{config::MaxFailures, slow_tests::TestDuration};
use agent_report_metadata::{RunBegin, TestEnd, TestStatus};
use std::{collections::HashMap, time::Instant};
use tracing::debug;

/// What a test-end event means for the report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum TestOutcome {
    /// The test was skipped.
    Skipped,

    /// The test passed on its first attempt.
    Passed,

    /// The test passed on a retry.
    Flaky,

    /// A failed attempt that will be retried.
    IntermediateFailure,

    /// A failed final attempt, to be reported.
    Failure,

    /// A failed final attempt beyond the configured maximum.
    Overflow,
}

/// All mutable state of a run between its begin and end events.
#[derive(Debug)]
pub(super) struct RunState {
    pub(super) total_tests: usize,
    pub(super) workers: usize,
    pub(super) projects: Vec<String>,
    pub(super) counts: RunCounts,
    pub(super) suppressed: usize,
    pub(super) durations: Vec<TestDuration>,
    pub(super) flaky: Vec<FlakyTest>,
    pub(super) started: Instant,
    // Failures counted against each identity, undone if the test later passes on a retry.
    failed_attempt_counts: HashMap<String, usize>,
}

impl RunState {
    pub(super) fn new(begin: &RunBegin) -> Self {
        Self {
            total_tests: begin.total_tests,
            workers: begin.workers,
            projects: begin.projects.clone(),
            counts: RunCounts::default(),
            suppressed: 0,
            durations: Vec::new(),
            flaky: Vec::new(),
            started: Instant::now(),
            failed_attempt_counts: HashMap::new(),
        }
    }

    /// Returns the run-level default project.
    pub(super) fn default_project(&self) -> Option<&str> {
        self.projects.first().map(String::as_str)
    }

    /// Applies a test-end event to the counters and decides how it's reported.
    pub(super) fn record(
        &mut self,
        identity: &str,
        event: &TestEnd,
        max_failures: MaxFailures,
    ) -> TestOutcome {
        let TestEnd { test, result } = event;

        let outcome = match result.status {
            TestStatus::Skipped => {
                self.counts.skipped += 1;
                return TestOutcome::Skipped;
            }
            TestStatus::Passed if result.retry == 0 => {
                self.counts.passed += 1;
                TestOutcome::Passed
            }
            TestStatus::Passed => {
                self.counts.flaky += 1;
                if let Some(contribution) = self.failed_attempt_counts.remove(identity) {
                    debug!(
                        "{identity} passed on retry {}, removing {contribution} failure(s) from the count",
                        result.retry
                    );
                    self.counts.failed = self.counts.failed.saturating_sub(contribution);
                }
                self.flaky.push(FlakyTest {
                    title: test.full_title(),
                    retry: result.retry,
                });
                TestOutcome::Flaky
            }
            TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted => {
                if !result.is_final_attempt() {
                    debug!(
                        "{identity} failed on attempt {} of {}, awaiting retry",
                        result.retry + 1,
                        result.max_retries + 1
                    );
                    return TestOutcome::IntermediateFailure;
                }
                if max_failures.is_exceeded(self.counts.failed + 1) {
                    self.suppressed += 1;
                    return TestOutcome::Overflow;
                }
                self.counts.failed += 1;
                *self
                    .failed_attempt_counts
                    .entry(identity.to_owned())
                    .or_default() += 1;
                TestOutcome::Failure
            }
        };

        self.durations.push(TestDuration {
            title: test.full_title(),
            file: test.file.clone(),
            line: test.line,
            duration_ms: result.duration_ms,
        });
        outcome
    }

    /// Returns the duration of the run so far, in milliseconds.
    pub(super) fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
