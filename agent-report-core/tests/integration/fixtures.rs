// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use agent_report_core::{
    config::{LoadedConfig, ReporterConfig},
    reporter::{AgentReporter, AgentReporterBuilder, ReporterOutput, RunDisposition},
};
use agent_report_metadata::{
    OutputChunk, ReporterEvent, RunBegin, RunEnd, RunStatus, TestDescriptor, TestEnd, TestError,
    TestResult, TestStatus,
};
use camino::Utf8Path;
use tokio::runtime::Handle;

pub(crate) fn load_config(toml: &str) -> LoadedConfig {
    ReporterConfig::from_toml_str(toml, "test.toml").expect("test config is valid")
}

pub(crate) fn build_reporter<'a>(toml: &str, out: &'a mut String) -> AgentReporter<'a> {
    AgentReporterBuilder::new(load_config(toml))
        .build(ReporterOutput::Buffer(out), Handle::current())
}

pub(crate) fn begin(total_tests: usize, workers: usize, output_dir: &Utf8Path) -> ReporterEvent {
    ReporterEvent::Begin(RunBegin {
        total_tests,
        workers,
        output_dir: output_dir.to_owned(),
        projects: vec!["chromium".to_owned()],
    })
}

pub(crate) fn end(status: RunStatus) -> ReporterEvent {
    ReporterEvent::End(RunEnd {
        status,
        duration_ms: Some(5000),
    })
}

/// A test-end event for a test titled `suite > {title}`.
#[derive(Clone, Debug)]
pub(crate) struct TestFixture {
    pub(crate) title: String,
    pub(crate) status: TestStatus,
    pub(crate) retry: u32,
    pub(crate) max_retries: u32,
    pub(crate) duration_ms: u64,
    pub(crate) message: Option<&'static str>,
    pub(crate) project: Option<&'static str>,
}

impl TestFixture {
    pub(crate) fn passing(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: TestStatus::Passed,
            retry: 0,
            max_retries: 0,
            duration_ms: 100,
            message: None,
            project: None,
        }
    }

    pub(crate) fn failing(title: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            message: Some("expect(received).toBe(expected)"),
            ..Self::passing(title)
        }
    }

    pub(crate) fn retry(mut self, retry: u32, max_retries: u32) -> Self {
        self.retry = retry;
        self.max_retries = max_retries;
        self
    }

    pub(crate) fn project(mut self, project: &'static str) -> Self {
        self.project = Some(project);
        self
    }

    pub(crate) fn duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub(crate) fn event(&self) -> ReporterEvent {
        ReporterEvent::TestEnd(TestEnd {
            test: TestDescriptor {
                title_path: vec!["suite".to_owned(), self.title.clone()],
                file: "tests/suite.spec.ts".to_owned(),
                line: 10,
                column: Some(5),
                project: self.project.map(str::to_owned),
            },
            result: TestResult {
                status: self.status,
                duration_ms: self.duration_ms,
                retry: self.retry,
                max_retries: self.max_retries,
                error: self.message.map(|message| TestError {
                    message: Some(message.to_owned()),
                    stack: Some(format!(
                        "Error: {message}\n    at /repo/tests/suite.spec.ts:11:7\n    at /repo/node_modules/@playwright/test/lib/worker.js:1:1"
                    )),
                }),
                stdout: vec![OutputChunk::from("log line\n")],
                stderr: Vec::new(),
                attachments: Vec::new(),
            },
        })
    }
}

/// Feeds `events` to `reporter`, returning the disposition of each.
pub(crate) async fn feed(
    reporter: &mut AgentReporter<'_>,
    events: impl IntoIterator<Item = ReporterEvent>,
) -> Vec<RunDisposition> {
    let mut dispositions = Vec::new();
    for event in events {
        let disposition = reporter
            .handle_event(&event)
            .await
            .expect("writing to a buffer succeeds");
        dispositions.push(disposition);
    }
    dispositions
}

pub(crate) fn count_failures(out: &str) -> usize {
    out.matches("<failure ").count()
}
