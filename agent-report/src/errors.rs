// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use agent_report_core::errors::{ConfigParseError, WriteEventError};
use agent_report_metadata::{AgentReportExitCode, EventParseError, RunStatus};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are printed with display_to_stderr, which
// colorizes them and prints their causes.

/// An expected failure of the `agent-report` binary.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("failed to open event stream")]
    EventsOpenError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to read event stream")]
    EventsReadError {
        line_number: usize,
        #[source]
        err: std::io::Error,
    },
    #[error("event parse error")]
    EventParseError {
        #[from]
        err: EventParseError,
    },
    #[error("failed to create report output")]
    OutputCreateError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to start async runtime")]
    RuntimeBuildError {
        #[source]
        err: std::io::Error,
    },
    #[error("writing event failed")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("event stream contained no run")]
    NoRun,
    #[error("test run failed")]
    TestRunFailed { status: RunStatus },
}

impl ExpectedError {
    pub(crate) fn config_parse_error(err: ConfigParseError) -> Self {
        Self::ConfigParseError { err }
    }

    pub(crate) fn events_open_error(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::EventsOpenError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn output_create_error(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::OutputCreateError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn test_run_failed(status: RunStatus) -> Self {
        Self::TestRunFailed { status }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParseError { .. } => AgentReportExitCode::CONFIG_PARSE_ERROR,
            Self::EventsOpenError { .. }
            | Self::OutputCreateError { .. }
            | Self::RuntimeBuildError { .. }
            | Self::NoRun => AgentReportExitCode::SETUP_ERROR,
            Self::EventsReadError { .. } | Self::EventParseError { .. } => {
                AgentReportExitCode::EVENT_PARSE_ERROR
            }
            Self::WriteEventError { .. } => AgentReportExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed { .. } => AgentReportExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config file `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::EventsOpenError { path, err } => {
                error!("failed to open event stream `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::EventsReadError { line_number, err } => {
                error!("failed to read event stream at line {line_number}");
                Some(err as &dyn Error)
            }
            Self::EventParseError { err } => {
                error!("{err}");
                err.source()
            }
            Self::OutputCreateError { path, err } => {
                error!("failed to create report output `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::RuntimeBuildError { err } => {
                error!("failed to start async runtime");
                Some(err as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write report");
                err.source()
            }
            Self::NoRun => {
                error!("event stream ended without a begin event, no report written");
                None
            }
            Self::TestRunFailed { status } => {
                error!("test run {}", status.style(styles.bold));
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
