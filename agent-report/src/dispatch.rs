// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts, clap_styles},
};
use agent_report_core::{
    config::{MaxFailures, ReporterConfig},
    reporter::{AgentReporter, AgentReporterBuilder, ReporterOutput, RunDisposition},
};
use agent_report_metadata::{AgentReportExitCode, ReporterEvent, RunEnd, RunStatus};
use camino::Utf8PathBuf;
use clap::Parser;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};
use tracing::{debug, warn};

/// Turn a test runner's event stream into a bounded report for automated agents.
///
/// Events are read as JSON lines. The report is written to standard output, and a detail file is
/// written to the run's output directory for each failing test.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct AgentReportApp {
    /// Path to the JSON-lines event stream [default: standard input]
    #[arg(value_name = "EVENTS")]
    events: Option<Utf8PathBuf>,

    /// Config file, layered over the built-in defaults
    #[arg(long, value_name = "PATH", env = "AGENT_REPORT_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Write the report to this file instead of standard output
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<Utf8PathBuf>,

    /// Number of failures to report before cutting the report short [default: from config]
    #[arg(long, value_name = "N|unbounded")]
    max_failures: Option<MaxFailures>,

    #[command(flatten)]
    output_opts: OutputOpts,
}

impl AgentReportApp {
    /// Initializes logging and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output_opts.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        let loaded = ReporterConfig::from_sources(self.config.as_deref())
            .map_err(ExpectedError::config_parse_error)?;
        let mut builder = AgentReporterBuilder::new(loaded);
        if let Some(max_failures) = self.max_failures {
            builder.set_max_failures(max_failures);
        }

        let input: Box<dyn BufRead> = match &self.events {
            Some(path) if path.as_str() != "-" => {
                let file = File::open(path)
                    .map_err(|err| ExpectedError::events_open_error(path.clone(), err))?;
                Box::new(BufReader::new(file))
            }
            _ => Box::new(io::stdin().lock()),
        };
        let output = match &self.output {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|err| ExpectedError::output_create_error(path.clone(), err))?;
                ReporterOutput::Writer(Box::new(file))
            }
            None => ReporterOutput::Stdout,
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| ExpectedError::RuntimeBuildError { err })?;
        let mut reporter = builder.build(output, runtime.handle().clone());
        runtime.block_on(run_events(&mut reporter, input))
    }
}

/// Feeds every event in `input` to `reporter`, returning the process exit code.
pub(crate) async fn run_events(
    reporter: &mut AgentReporter<'_>,
    input: impl BufRead,
) -> Result<i32> {
    let mut final_status = None;

    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = line.map_err(|err| ExpectedError::EventsReadError { line_number, err })?;
        if line.trim().is_empty() {
            continue;
        }
        let event = ReporterEvent::parse_line(line_number, &line)?;

        if let ReporterEvent::End(end) = &event
            && reporter.is_running()
        {
            final_status = Some(end.status);
        }
        match reporter.handle_event(&event).await? {
            RunDisposition::Continue => {}
            RunDisposition::Terminate { exit_code } => {
                debug!("report ended early at line {line_number}, exiting with {exit_code}");
                return Ok(exit_code);
            }
        }
    }

    if reporter.is_running() {
        warn!("event stream ended before the run finished, finalizing as interrupted");
        let end = RunEnd {
            status: RunStatus::Interrupted,
            duration_ms: None,
        };
        reporter.on_end(&end).await?;
        final_status = Some(end.status);
    }

    match final_status {
        Some(RunStatus::Passed) => Ok(AgentReportExitCode::OK),
        Some(status) => Err(ExpectedError::test_run_failed(status)),
        None => Err(ExpectedError::NoRun),
    }
}
