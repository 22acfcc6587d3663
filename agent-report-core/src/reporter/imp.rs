// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumes lifecycle events and writes the report.
//!
//! The main structure in this module is [`AgentReporter`].

use super::{
    aggregator::{RunState, TestOutcome},
    detail_files::{self, DetailFiles},
    record::{FailureRecordBuilder, RecordView, ReproduceCommand, ReproduceContext},
    record::{detail_file_name, test_identity},
    serialize,
};
use crate::{
    config::{ConfigWarning, LoadedConfig, MaxFailures, ReporterConfig},
    errors::{DisplayErrorChain, WriteEventError},
    slow_tests,
    write_str::WriteStr,
};
use agent_report_metadata::{
    AgentReportExitCode, ReporterEvent, RunBegin, RunEnd, RunStatus, TestEnd,
};
use debug_ignore::DebugIgnore;
use std::{
    collections::BTreeSet,
    io::{self, BufWriter, Write},
};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Destination for the report stream.
///
/// This is usually standard output, but can be an in-memory buffer for tests.
pub enum ReporterOutput<'a> {
    /// Write to standard output.
    Stdout,

    /// Write to a buffer.
    Buffer(&'a mut String),

    /// Write to an arbitrary writer, such as a file.
    Writer(Box<dyn Write + Send + 'a>),
}

/// What the caller should do after an event has been handled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub enum RunDisposition {
    /// Keep feeding events.
    Continue,

    /// The report is complete and the process should exit with `exit_code`.
    ///
    /// Returned when the failure limit is exceeded. Later events are ignored.
    Terminate {
        /// The exit code to use.
        exit_code: i32,
    },
}

/// Agent reporter builder.
#[derive(Debug, Default)]
pub struct AgentReporterBuilder {
    config: ReporterConfig,
    config_warnings: Vec<ConfigWarning>,
    reproduce: Option<ReproduceCommand>,
}

impl AgentReporterBuilder {
    /// Creates a builder from a loaded configuration.
    ///
    /// Warnings produced while loading the configuration are repeated at the end of the report.
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            config: loaded.config,
            config_warnings: loaded.warnings,
            reproduce: None,
        }
    }

    /// Overrides the maximum number of failures reported before the run is cut short.
    pub fn set_max_failures(&mut self, max_failures: MaxFailures) -> &mut Self {
        self.config.max_failures = max_failures;
        self
    }

    /// Sets a function producing the command that reproduces a failure.
    ///
    /// This takes precedence over a `reproduce-command` template in the configuration.
    pub fn set_reproduce_command<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&ReproduceContext<'_>) -> String + Send + Sync + 'static,
    {
        self.reproduce = Some(ReproduceCommand::from_fn(f));
        self
    }

    /// Creates a new reporter writing to `output`.
    ///
    /// Detail file operations are spawned on `handle`.
    pub fn build<'a>(&self, output: ReporterOutput<'a>, handle: Handle) -> AgentReporter<'a> {
        let reproduce = match (&self.reproduce, &self.config.reproduce_command) {
            (Some(reproduce), _) => reproduce.clone(),
            (None, Some(template)) => ReproduceCommand::Template(template.clone()),
            (None, None) => ReproduceCommand::Default,
        };
        let output = match output {
            ReporterOutput::Stdout => ReporterOutputImpl::Stdout,
            ReporterOutput::Buffer(buf) => ReporterOutputImpl::Buffer(buf),
            ReporterOutput::Writer(writer) => ReporterOutputImpl::Writer(BufWriter::new(writer)),
        };

        AgentReporter {
            config: self.config.clone(),
            config_warnings: self.config_warnings.clone(),
            reproduce,
            output: DebugIgnore(output),
            handle,
            phase: RunPhase::NotStarted,
        }
    }
}

enum ReporterOutputImpl<'a> {
    Stdout,
    Buffer(&'a mut String),
    Writer(BufWriter<Box<dyn Write + Send + 'a>>),
}

impl ReporterOutputImpl<'_> {
    fn write_report(&mut self, s: &str) -> Result<(), WriteEventError> {
        match self {
            Self::Stdout => {
                let mut writer = BufWriter::new(io::stdout().lock());
                writer.write_str(s)?;
                writer.write_str_flush()?;
            }
            Self::Buffer(buf) => (**buf).write_str(s)?,
            Self::Writer(writer) => {
                writer.write_str(s)?;
                writer.write_str_flush()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
enum RunPhase {
    NotStarted,
    Running(Box<ActiveRun>),
    Finished,
}

#[derive(Debug)]
struct ActiveRun {
    state: RunState,
    detail_files: DetailFiles,
    // Filesystem problems, already logged.
    warnings: Vec<String>,
}

impl ActiveRun {
    fn render_end(
        &self,
        config: &ReporterConfig,
        config_warnings: &[ConfigWarning],
        status: RunStatus,
        duration_ms: u64,
    ) -> String {
        let mut out = String::new();
        if self.state.suppressed > 0 {
            let limit = config
                .max_failures
                .count()
                .unwrap_or(self.state.counts.failed);
            serialize::write_overflow(&mut out, limit, self.state.suppressed);
        }
        if config.warn_previous_failures {
            serialize::write_previous_failures(&mut out, self.detail_files.previous_failures());
        }
        serialize::write_flaky(&mut out, &self.state.flaky);
        if let Some(slow) = slow_tests::detect(&self.state.durations, config.slow_test_stddev) {
            serialize::write_slow_tests(&mut out, &slow);
        }

        let warnings: Vec<String> = config_warnings
            .iter()
            .map(ToString::to_string)
            .chain(self.warnings.iter().cloned())
            .collect();
        serialize::write_warnings(&mut out, &warnings);
        serialize::write_summary(&mut out, status, &self.state.counts, duration_ms);
        serialize::write_footer(&mut out);
        out
    }
}

/// Aggregates the events of a test run into a bounded report.
///
/// Events must be delivered in order: [`on_begin`](Self::on_begin), any number of
/// [`on_test_end`](Self::on_test_end), then [`on_end`](Self::on_end). Events that arrive out of
/// place, or after the run has finished, are ignored.
#[derive(Debug)]
pub struct AgentReporter<'a> {
    config: ReporterConfig,
    config_warnings: Vec<ConfigWarning>,
    reproduce: ReproduceCommand,
    output: DebugIgnore<ReporterOutputImpl<'a>>,
    handle: Handle,
    phase: RunPhase,
}

impl AgentReporter<'_> {
    /// Returns true if the run has begun and not yet finished.
    pub fn is_running(&self) -> bool {
        matches!(self.phase, RunPhase::Running(_))
    }

    /// Returns true if the report has been completed, either by an end event or by exceeding
    /// the failure limit.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, RunPhase::Finished)
    }

    /// Dispatches `event` to the matching handler.
    pub async fn handle_event(
        &mut self,
        event: &ReporterEvent,
    ) -> Result<RunDisposition, WriteEventError> {
        match event {
            ReporterEvent::Begin(begin) => {
                self.on_begin(begin)?;
                Ok(RunDisposition::Continue)
            }
            ReporterEvent::TestEnd(test_end) => self.on_test_end(test_end),
            ReporterEvent::End(end) => {
                self.on_end(end).await?;
                Ok(RunDisposition::Continue)
            }
        }
    }

    /// Starts the run: lists detail files left by earlier runs and writes the report header.
    pub fn on_begin(&mut self, begin: &RunBegin) -> Result<(), WriteEventError> {
        if !matches!(self.phase, RunPhase::NotStarted) {
            debug!("ignoring begin event: a run has already started");
            return Ok(());
        }

        let mut warnings = Vec::new();
        let existing = detail_files::scan(&begin.output_dir).unwrap_or_else(|error| {
            let message = DisplayErrorChain::new(&error).to_string();
            warn!("{message}");
            warnings.push(message);
            BTreeSet::new()
        });
        if self.config.warn_previous_failures && !existing.is_empty() {
            warn!(
                "found {} detail file(s) from a previous run in {}",
                existing.len(),
                begin.output_dir
            );
        }

        let state = RunState::new(begin);
        let mut out = String::new();
        serialize::write_header(&mut out, state.total_tests, state.workers, &state.projects);

        let detail_files = DetailFiles::new(begin.output_dir.clone(), existing, self.handle.clone());
        self.phase = RunPhase::Running(Box::new(ActiveRun {
            state,
            detail_files,
            warnings,
        }));
        self.output.write_report(&out)
    }

    /// Handles the end of one test attempt.
    ///
    /// Failing final attempts are written to the report as they arrive. Returns
    /// [`RunDisposition::Terminate`] once the failure limit has been exceeded, after the report
    /// has been completed.
    pub fn on_test_end(&mut self, event: &TestEnd) -> Result<RunDisposition, WriteEventError> {
        let RunPhase::Running(run) = &mut self.phase else {
            debug!(
                "ignoring result for `{}`: no run in progress",
                event.test.full_title()
            );
            return Ok(RunDisposition::Continue);
        };

        let identity = test_identity(&event.test);
        match run.state.record(&identity, event, self.config.max_failures) {
            TestOutcome::Skipped | TestOutcome::Flaky | TestOutcome::IntermediateFailure => {}
            TestOutcome::Passed => {
                if self.config.write_detail_files {
                    run.detail_files.retract(&detail_file_name(&identity));
                }
            }
            TestOutcome::Failure => {
                let output_dir = self
                    .config
                    .write_detail_files
                    .then(|| run.detail_files.output_dir());
                let record = FailureRecordBuilder::new(
                    &self.config,
                    &self.reproduce,
                    run.state.default_project(),
                    output_dir,
                )
                .build(&identity, event);

                if self.config.write_detail_files {
                    run.detail_files.persist(
                        &detail_file_name(&identity),
                        serialize::detail_file_contents(&record),
                    );
                }

                let mut out = String::new();
                serialize::write_failure(&mut out, &record, RecordView::Streamed);
                self.output.write_report(&out)?;
            }
            TestOutcome::Overflow => {
                warn!(
                    "failure limit of {} exceeded, ending the report",
                    self.config.max_failures
                );
                let out = run.render_end(
                    &self.config,
                    &self.config_warnings,
                    RunStatus::Failed,
                    run.state.elapsed_ms(),
                );
                // In-flight file operations are left to finish on their own.
                self.phase = RunPhase::Finished;
                self.output.write_report(&out)?;
                return Ok(RunDisposition::Terminate {
                    exit_code: AgentReportExitCode::TOO_MANY_FAILURES,
                });
            }
        }
        Ok(RunDisposition::Continue)
    }

    /// Finishes the run: waits for detail file operations to settle, then writes the
    /// end-of-run summaries.
    pub async fn on_end(&mut self, end: &RunEnd) -> Result<(), WriteEventError> {
        let mut run = match std::mem::replace(&mut self.phase, RunPhase::Finished) {
            RunPhase::Running(run) => run,
            RunPhase::NotStarted => {
                warn!("end event received before the run began, ignoring");
                self.phase = RunPhase::NotStarted;
                return Ok(());
            }
            RunPhase::Finished => {
                debug!("ignoring end event: the run has already finished");
                return Ok(());
            }
        };

        let errors = run.detail_files.finish().await;
        run.warnings.extend(
            errors
                .iter()
                .map(|error| DisplayErrorChain::new(error).to_string()),
        );

        let duration_ms = end.duration_ms.unwrap_or_else(|| run.state.elapsed_ms());
        let out = run.render_end(&self.config, &self.config_warnings, end.status, duration_ms);
        self.output.write_report(&out)
    }
}
