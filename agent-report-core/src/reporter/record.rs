// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Failure records: everything reported about one failing test.

use crate::{
    classify::{self, ErrorType},
    config::{Limit, ReporterConfig},
    log_window::{LogLimits, LogWindow},
    sanitize::{self, prune_stack},
};
use agent_report_metadata::{Attachment, TestDescriptor, TestEnd, TestStatus};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use std::{borrow::Cow, sync::Arc};
use swrite::{SWrite, swrite};

/// The message used when a failing test carries no error message.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Appended to an error message cut short in the streamed report.
pub const MESSAGE_TRUNCATION_MARKER: &str = "\n... [message truncated, see details]";

/// The suffix of every detail file name.
pub const DETAIL_FILE_SUFFIX: &str = "-details.xml";

/// Returns the identity of a test: its sanitized full title, prefixed with its project if it has
/// one.
///
/// The same title run under two projects is two tests, so the project is part of the identity.
pub fn test_identity(test: &TestDescriptor) -> String {
    match test.project.as_deref() {
        Some(project) if !project.is_empty() => sanitize::sanitize_identity(&format!(
            "{project}{}{}",
            TestDescriptor::TITLE_SEPARATOR,
            test.full_title()
        )),
        _ => sanitize::sanitize_identity(&test.full_title()),
    }
}

/// Returns the name of the detail file for `identity`.
pub fn detail_file_name(identity: &str) -> String {
    format!("{identity}{DETAIL_FILE_SUFFIX}")
}

/// The information available to a reproduce command generator.
#[derive(Clone, Copy, Debug)]
pub struct ReproduceContext<'a> {
    /// The file the test is declared in.
    pub file: &'a str,

    /// The line the test is declared on.
    pub line: u32,

    /// The project the test ran under: its own, or else the run's default project.
    pub project: Option<&'a str>,

    /// The full title of the test.
    pub title: &'a str,
}

type ReproduceFn = dyn Fn(&ReproduceContext<'_>) -> String + Send + Sync;

/// How the command that reproduces a failure is produced.
#[derive(Clone, Debug, Default)]
pub enum ReproduceCommand {
    /// Run the single test through Playwright.
    #[default]
    Default,

    /// Expand a template with `{file}`, `{line}`, `{project}` and `{title}` placeholders.
    Template(String),

    /// Call a function.
    Callback(DebugIgnore<Arc<ReproduceFn>>),
}

impl ReproduceCommand {
    /// Creates a generator from a function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ReproduceContext<'_>) -> String + Send + Sync + 'static,
    {
        Self::Callback(DebugIgnore(Arc::new(f)))
    }

    /// Produces the command for `cx`.
    pub fn render(&self, cx: &ReproduceContext<'_>) -> String {
        match self {
            Self::Default => {
                let mut command = format!(
                    "npx playwright test {}:{}",
                    shell_words::quote(cx.file),
                    cx.line
                );
                if let Some(project) = cx.project {
                    swrite!(command, " --project={}", shell_words::quote(project));
                }
                command
            }
            Self::Template(template) => expand_template(template, cx),
            Self::Callback(f) => (f.0)(cx),
        }
    }
}

fn expand_template(template: &str, cx: &ReproduceContext<'_>) -> String {
    let line = cx.line.to_string();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find('}') else {
            out.push_str(after);
            rest = "";
            break;
        };
        let value = match &after[1..end] {
            "file" => Some(cx.file),
            "line" => Some(line.as_str()),
            "project" => Some(cx.project.unwrap_or_default()),
            "title" => Some(cx.title),
            _ => None,
        };
        match value {
            Some("") => {}
            Some(value) => out.push_str(&shell_words::quote(value)),
            // Unknown placeholders are left alone.
            None => out.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Selects which rendering of a failure record to produce.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordView {
    /// The bounded view written to the report stream.
    Streamed,

    /// The unbounded view written to a detail file.
    Detail,
}

/// Everything reported about one failing final attempt.
///
/// Built once, serialized to the stream and optionally to a detail file, then discarded.
#[derive(Clone, Debug)]
pub struct FailureRecord {
    /// The sanitized identity of the test.
    pub identity: String,

    /// The full title of the test.
    pub title: String,

    /// The status the attempt ended with.
    pub status: TestStatus,

    /// The classified error category.
    pub error_type: ErrorType,

    /// The remediation hint for the category.
    pub hint: Cow<'static, str>,

    /// The file the test is declared in.
    pub file: String,

    /// The line the test is declared on.
    pub line: u32,

    /// The duration of the attempt.
    pub duration_ms: u64,

    /// The retry index of the attempt.
    pub retry: u32,

    /// The raw error message.
    pub message: String,

    /// The error message capped to the configured number of characters.
    pub bounded_message: String,

    /// The stack trace with framework and dependency frames removed.
    pub full_stack: String,

    /// The pruned stack trace, capped to the configured number of frames.
    pub bounded_stack: String,

    /// All retained console lines.
    pub full_log: String,

    /// Console lines narrowed to the configured limits.
    pub bounded_log: String,

    /// Attachments to list, if enabled.
    pub attachments: Vec<Attachment>,

    /// The command that reproduces the failure.
    pub reproduce_command: String,

    /// Where the detail file is written, if detail files are enabled.
    pub details_path: Option<Utf8PathBuf>,
}

impl FailureRecord {
    /// Returns the error message for `view`.
    pub fn message(&self, view: RecordView) -> &str {
        match view {
            RecordView::Streamed => &self.bounded_message,
            RecordView::Detail => &self.message,
        }
    }

    /// Returns the stack trace for `view`.
    pub fn stack(&self, view: RecordView) -> &str {
        match view {
            RecordView::Streamed => &self.bounded_stack,
            RecordView::Detail => &self.full_stack,
        }
    }

    /// Returns the console excerpt for `view`.
    pub fn log(&self, view: RecordView) -> &str {
        match view {
            RecordView::Streamed => &self.bounded_log,
            RecordView::Detail => &self.full_log,
        }
    }
}

/// Builds [`FailureRecord`]s according to a configuration.
#[derive(Clone, Debug)]
pub struct FailureRecordBuilder<'cfg> {
    config: &'cfg ReporterConfig,
    reproduce: &'cfg ReproduceCommand,
    default_project: Option<&'cfg str>,
    output_dir: Option<&'cfg Utf8Path>,
}

impl<'cfg> FailureRecordBuilder<'cfg> {
    /// Creates a new builder.
    ///
    /// Detail paths are only filled in if `output_dir` is set.
    pub fn new(
        config: &'cfg ReporterConfig,
        reproduce: &'cfg ReproduceCommand,
        default_project: Option<&'cfg str>,
        output_dir: Option<&'cfg Utf8Path>,
    ) -> Self {
        Self {
            config,
            reproduce,
            default_project,
            output_dir,
        }
    }

    /// Builds the record for `event`, whose test has the given identity.
    pub fn build(&self, identity: &str, event: &TestEnd) -> FailureRecord {
        let TestEnd { test, result } = event;
        let title = test.full_title();

        let error = result.error.as_ref();
        let message = error
            .and_then(|error| error.message.as_deref())
            .filter(|message| !message.trim().is_empty())
            .unwrap_or(UNKNOWN_ERROR);
        let classification = classify::classify(message, &self.config.hint_rules);
        let bounded_message = truncate_message(message, self.config.max_error_chars);

        let stack = error
            .and_then(|error| error.stack.as_deref())
            .unwrap_or_default();
        let full_stack = prune_stack(stack, &self.config.stack_filter, None);
        // Derived from the pruned stack rather than the raw one.
        let bounded_stack = truncate_stack_heading(
            &prune_stack(
                &full_stack,
                &self.config.stack_filter,
                Some(self.config.max_stack_frames),
            ),
            self.config.max_error_chars,
        );

        // A detail file needs every line, so only cap collection when there's no detail file.
        let bounded_limits = self.config.log_limits;
        let collect_lines = if self.output_dir.is_some() {
            LogLimits::UNBOUNDED.max_lines
        } else {
            bounded_limits.max_lines
        };
        let window = LogWindow::collect(
            &result.stdout,
            &result.stderr,
            collect_lines,
            self.config.strip_ansi,
        );
        let full_log = window.render(LogLimits::UNBOUNDED);
        let bounded_log = window.render(bounded_limits);

        let attachments = if self.config.include_attachments {
            result.attachments.clone()
        } else {
            Vec::new()
        };

        let project = test.project.as_deref().or(self.default_project);
        let reproduce_command = self.reproduce.render(&ReproduceContext {
            file: &test.file,
            line: test.line,
            project,
            title: &title,
        });

        let details_path = self
            .output_dir
            .map(|dir| dir.join(detail_file_name(identity)));

        FailureRecord {
            identity: identity.to_owned(),
            title,
            status: result.status,
            error_type: classification.error_type,
            hint: classification.hint,
            file: test.file.clone(),
            line: test.line,
            duration_ms: result.duration_ms,
            retry: result.retry,
            message: message.to_owned(),
            bounded_message,
            full_stack,
            bounded_stack,
            full_log,
            bounded_log,
            attachments,
            reproduce_command,
            details_path,
        }
    }
}

fn truncate_message(message: &str, max_chars: Limit) -> String {
    match max_chars.count() {
        Some(max) => match message.char_indices().nth(max) {
            Some((idx, _)) => format!("{}{MESSAGE_TRUNCATION_MARKER}", &message[..idx]),
            None => message.to_owned(),
        },
        None => message.to_owned(),
    }
}

// JavaScript stacks repeat the error message above the first frame.
fn truncate_stack_heading(stack: &str, max_chars: Limit) -> String {
    let (heading, frames) = sanitize::split_stack_heading(stack);
    let heading = truncate_message(heading.trim_end_matches('\n'), max_chars);
    match (heading.is_empty(), frames.is_empty()) {
        (_, true) => heading,
        (true, false) => frames.to_owned(),
        (false, false) => format!("{heading}\n{frames}"),
    }
}
