// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Limit, MaxFailures, RawBound};
use crate::{
    classify::{ErrorType, HintRule},
    errors::{ConfigParseError, ConfigParseErrorKind, DisplayErrorChain},
    log_window::LogLimits,
    sanitize::StackFilter,
};
use camino::Utf8Path;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::{collections::BTreeSet, fmt};
use tracing::warn;

/// A non-fatal problem found while loading the configuration.
///
/// Warnings are logged when they're found and listed again at the end of the report.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigWarning {
    /// The option the warning is about.
    pub option: String,

    /// What was wrong, and what was done about it.
    pub message: String,
}

impl ConfigWarning {
    pub(crate) fn new(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.option, self.message)
    }
}

/// A resolved configuration along with the warnings produced while resolving it.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    /// The resolved configuration.
    pub config: ReporterConfig,

    /// Corrections and unknown keys encountered while loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Reporter configuration, after defaults have been applied and values range-checked.
#[derive(Clone, Debug)]
pub struct ReporterConfig {
    /// The number of final failures reported before the run is cut short.
    pub max_failures: MaxFailures,

    /// The number of stack frames shown per failure in the stream.
    pub max_stack_frames: usize,

    /// Bounds on the console output shown per failure in the stream.
    pub log_limits: LogLimits,

    /// The number of characters of each error message shown in the stream.
    pub max_error_chars: Limit,

    /// Multiplier on the standard deviation used for slow-test detection.
    pub slow_test_stddev: f64,

    /// Whether to list attachments for each failure.
    pub include_attachments: bool,

    /// Whether to write a detail file per failing test.
    pub write_detail_files: bool,

    /// Whether to warn about detail files left behind by earlier runs.
    pub warn_previous_failures: bool,

    /// Whether to strip ANSI escape sequences from console output.
    pub strip_ansi: bool,

    /// A template for the command that reproduces a failure.
    pub reproduce_command: Option<String>,

    /// The filter applied to stack frames.
    pub stack_filter: StackFilter,

    /// Custom classification rules, checked before the built-in rules.
    pub hint_rules: Vec<HintRule>,
}

impl ReporterConfig {
    /// The default configuration, embedded at build time.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    pub(crate) const DEFAULT_MAX_STACK_FRAMES: usize = 10;
    pub(crate) const DEFAULT_LOG_LIMITS: LogLimits = LogLimits {
        max_lines: Limit::Count(50),
        max_chars: Limit::Count(4000),
    };
    pub(crate) const DEFAULT_MAX_ERROR_CHARS: Limit = Limit::Count(2000);
    pub(crate) const DEFAULT_SLOW_TEST_STDDEV: f64 = 2.0;

    /// Reads the default configuration, layered with `config_file` if given.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<LoadedConfig, ConfigParseError> {
        let mut builder = Self::make_default_config();
        let source_name = match config_file {
            Some(config_file) => {
                builder = builder.add_source(
                    File::new(config_file.as_str(), FileFormat::Toml).required(true),
                );
                config_file.as_str()
            }
            None => "<default config>",
        };
        Self::load(&builder, source_name)
    }

    /// Reads the default configuration layered with TOML `contents`.
    ///
    /// `source_name` is only used in error messages and warnings.
    pub fn from_toml_str(
        contents: &str,
        source_name: &str,
    ) -> Result<LoadedConfig, ConfigParseError> {
        let builder =
            Self::make_default_config().add_source(File::from_str(contents, FileFormat::Toml));
        Self::load(&builder, source_name)
    }

    fn load(
        builder: &ConfigBuilder<DefaultState>,
        source_name: &str,
    ) -> Result<LoadedConfig, ConfigParseError> {
        let (raw, unknown) = Self::build_and_deserialize_config(builder)
            .map_err(|kind| ConfigParseError::new(source_name, kind))?;

        let mut warnings = Vec::new();
        if !unknown.is_empty() {
            let message = format!("ignoring unknown keys: {}", unknown.iter().join(", "));
            warn!("in config {source_name}, {message}");
            warnings.push(ConfigWarning::new(source_name, message));
        }

        let config = raw.resolve(&mut warnings);
        Ok(LoadedConfig { config, warnings })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(ReporterConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config = ReporterConfigDeserialize::deserialize(ignored_de)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            max_failures: MaxFailures::Unbounded,
            max_stack_frames: Self::DEFAULT_MAX_STACK_FRAMES,
            log_limits: Self::DEFAULT_LOG_LIMITS,
            max_error_chars: Self::DEFAULT_MAX_ERROR_CHARS,
            slow_test_stddev: Self::DEFAULT_SLOW_TEST_STDDEV,
            include_attachments: true,
            write_detail_files: true,
            warn_previous_failures: true,
            strip_ansi: true,
            reproduce_command: None,
            stack_filter: StackFilter::builtin().clone(),
            hint_rules: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReporterConfigDeserialize {
    max_failures: RawBound,
    max_stack_frames: RawBound,
    max_log_lines: RawBound,
    max_log_chars: RawBound,
    max_error_chars: RawBound,
    slow_test_stddev: f64,
    include_attachments: bool,
    write_detail_files: bool,
    warn_previous_failures: bool,
    strip_ansi: bool,
    #[serde(default)]
    reproduce_command: Option<String>,
    #[serde(default)]
    stack_filters: Vec<String>,
    #[serde(default)]
    hint_rules: Vec<HintRuleDeserialize>,
}

#[derive(Clone, Debug, Deserialize)]
struct HintRuleDeserialize {
    pattern: String,
    #[serde(rename = "type")]
    error_type: String,
    hint: String,
}

fn correct<T: fmt::Display>(
    warnings: &mut Vec<ConfigWarning>,
    option: &str,
    err: impl std::error::Error,
    default: T,
) -> T {
    let message = format!("{}; using default of {default}", DisplayErrorChain::new(err));
    warn!("config option {option}: {message}");
    warnings.push(ConfigWarning::new(option, message));
    default
}

impl ReporterConfigDeserialize {
    fn resolve(self, warnings: &mut Vec<ConfigWarning>) -> ReporterConfig {
        let defaults = ReporterConfig::default();

        let max_failures = MaxFailures::from_raw(&self.max_failures).unwrap_or_else(|err| {
            correct(warnings, "max-failures", err, defaults.max_failures)
        });

        let max_stack_frames = match Limit::from_raw(&self.max_stack_frames, 1) {
            Ok(Limit::Count(n)) => n,
            Ok(Limit::Unbounded) => usize::MAX,
            Err(err) => correct(warnings, "max-stack-frames", err, defaults.max_stack_frames),
        };

        let max_lines = Limit::from_raw(&self.max_log_lines, 0).unwrap_or_else(|err| {
            correct(
                warnings,
                "max-log-lines",
                err,
                defaults.log_limits.max_lines,
            )
        });
        let max_chars = Limit::from_raw(&self.max_log_chars, 1).unwrap_or_else(|err| {
            correct(
                warnings,
                "max-log-chars",
                err,
                defaults.log_limits.max_chars,
            )
        });

        let max_error_chars = Limit::from_raw(&self.max_error_chars, 1).unwrap_or_else(|err| {
            correct(warnings, "max-error-chars", err, defaults.max_error_chars)
        });

        let slow_test_stddev = if self.slow_test_stddev.is_finite() && self.slow_test_stddev > 0.0
        {
            self.slow_test_stddev
        } else {
            let message = format!(
                "{} is not a positive number; using default of {}",
                self.slow_test_stddev, defaults.slow_test_stddev
            );
            warn!("config option slow-test-stddev: {message}");
            warnings.push(ConfigWarning::new("slow-test-stddev", message));
            defaults.slow_test_stddev
        };

        let stack_filter = if self.stack_filters.is_empty() {
            defaults.stack_filter
        } else {
            match StackFilter::new(&self.stack_filters) {
                Ok(filter) => filter,
                Err(err) => {
                    let message = format!(
                        "{}; using built-in filters only",
                        DisplayErrorChain::new(err)
                    );
                    warn!("config option stack-filters: {message}");
                    warnings.push(ConfigWarning::new("stack-filters", message));
                    defaults.stack_filter
                }
            }
        };

        let hint_rules = self
            .hint_rules
            .into_iter()
            .filter_map(|rule| {
                match HintRule::new(&rule.pattern, ErrorType::custom(rule.error_type), rule.hint) {
                    Ok(rule) => Some(rule),
                    Err(err) => {
                        let message = format!("{}; rule ignored", DisplayErrorChain::new(err));
                        warn!("config option hint-rules: {message}");
                        warnings.push(ConfigWarning::new("hint-rules", message));
                        None
                    }
                }
            })
            .collect();

        ReporterConfig {
            max_failures,
            max_stack_frames,
            log_limits: LogLimits {
                max_lines,
                max_chars,
            },
            max_error_chars,
            slow_test_stddev,
            include_attachments: self.include_attachments,
            write_detail_files: self.write_detail_files,
            warn_previous_failures: self.warn_previous_failures,
            strip_ansi: self.strip_ansi,
            reproduce_command: self.reproduce_command,
            stack_filter,
            hint_rules,
        }
    }
}
