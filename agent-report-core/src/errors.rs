// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by agent-report.

use crate::config::{Limit, MaxFailures};
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse agent-report config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// The kind of error that occurred while parsing the config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error("{0}")]
    DeserializeError(Box<ConfigError>),
}

/// Error returned while parsing a [`MaxFailures`] value.
#[derive(Clone, Debug, Error)]
#[error(
    "invalid value for max-failures: {input} ({reason}; expected {})",
    MaxFailures::EXPECTED
)]
pub struct MaxFailuresParseError {
    input: String,
    reason: String,
}

impl MaxFailuresParseError {
    pub(crate) fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned while parsing a [`Limit`] value.
#[derive(Clone, Debug, Error)]
#[error("invalid limit: {input} ({reason}; expected {})", Limit::EXPECTED)]
pub struct LimitParseError {
    input: String,
    reason: String,
}

impl LimitParseError {
    pub(crate) fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// An error that occurred while compiling a custom hint rule.
#[derive(Debug, Error)]
#[error("invalid pattern `{pattern}` in hint rule")]
pub struct HintRuleError {
    pattern: String,
    #[source]
    err: regex::Error,
}

impl HintRuleError {
    pub(crate) fn new(pattern: impl Into<String>, err: regex::Error) -> Self {
        Self {
            pattern: pattern.into(),
            err,
        }
    }
}

/// An error that occurred while writing the report stream.
#[derive(Debug, Error)]
#[error("error writing report to output")]
pub struct WriteEventError {
    #[from]
    err: io::Error,
}

/// An error that occurred while persisting or retracting a detail file.
///
/// These errors never interrupt a run: they are logged and listed in the report's warnings.
#[derive(Debug)]
#[non_exhaustive]
pub enum DetailFileError {
    /// The output directory could not be listed.
    ReadDir {
        /// The directory that could not be listed.
        dir: Utf8PathBuf,

        /// The underlying error.
        err: io::Error,
    },

    /// The output directory could not be created.
    CreateDir {
        /// The directory that could not be created.
        dir: Utf8PathBuf,

        /// The underlying error.
        err: io::Error,
    },

    /// A detail file could not be written.
    Write {
        /// The file that could not be written.
        file: Utf8PathBuf,

        /// The underlying error.
        err: io::Error,
    },

    /// A detail file could not be removed.
    Remove {
        /// The file that could not be removed.
        file: Utf8PathBuf,

        /// The underlying error.
        err: io::Error,
    },

    /// The task performing the file operation panicked or was cancelled.
    TaskFailed {
        /// The file the operation was for.
        file: Utf8PathBuf,

        /// The underlying error.
        err: tokio::task::JoinError,
    },
}

impl fmt::Display for DetailFileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ReadDir { dir, .. } => write!(f, "failed to list output directory `{dir}`"),
            Self::CreateDir { dir, .. } => {
                write!(f, "failed to create output directory `{dir}`")
            }
            Self::Write { file, .. } => write!(f, "failed to write detail file `{file}`"),
            Self::Remove { file, .. } => write!(f, "failed to remove detail file `{file}`"),
            Self::TaskFailed { file, .. } => {
                write!(f, "file operation for `{file}` did not complete")
            }
        }
    }
}

impl error::Error for DetailFileError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::ReadDir { err, .. }
            | Self::CreateDir { err, .. }
            | Self::Write { err, .. }
            | Self::Remove { err, .. } => Some(err),
            Self::TaskFailed { err, .. } => Some(err),
        }
    }
}

/// Displays an error along with its chain of sources, on a single line.
///
/// Used wherever an error is folded into the report as a warning.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
