// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of the report stream and of detail files.
//!
//! The stream is a single `<test-run>` element. Attribute and text values are escaped; the
//! markdown context of each failure is embedded verbatim in a CDATA section.

use super::record::{FailureRecord, RecordView};
use crate::{
    sanitize::{cdata, error_summary, escape_xml},
    slow_tests::SlowTests,
};
use agent_report_metadata::RunStatus;
use swrite::{SWrite, swrite, swriteln};

/// Final counts for a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunCounts {
    /// Tests that passed on their first attempt.
    pub passed: usize,

    /// Tests whose final attempt failed.
    pub failed: usize,

    /// Tests that were skipped.
    pub skipped: usize,

    /// Tests that passed after failing at least once.
    pub flaky: usize,
}

/// A test that passed on a retry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlakyTest {
    /// The full title of the test.
    pub title: String,

    /// The retry on which the test passed.
    pub retry: u32,
}

pub(super) fn write_header(out: &mut String, total: usize, workers: usize, projects: &[String]) {
    swrite!(out, "<test-run total=\"{total}\" workers=\"{workers}\"");
    if !projects.is_empty() {
        swrite!(out, " project=\"{}\"", escape_xml(&projects.join(",")));
    }
    out.push_str(">\n");
}

pub(super) fn write_failure(out: &mut String, record: &FailureRecord, view: RecordView) {
    swriteln!(
        out,
        "<failure id=\"{}\" type=\"{}\" file=\"{}\" line=\"{}\" duration-ms=\"{}\" retry=\"{}\">",
        escape_xml(&record.identity),
        escape_xml(record.error_type.as_str()),
        escape_xml(&record.file),
        record.line,
        record.duration_ms,
        record.retry,
    );
    swriteln!(
        out,
        "<summary>{}</summary>",
        escape_xml(&error_summary(&record.message))
    );
    swriteln!(out, "<context>{}</context>", cdata(&context(record, view)));
    swriteln!(
        out,
        "<reproduce>{}</reproduce>",
        escape_xml(&record.reproduce_command)
    );
    if view == RecordView::Streamed
        && let Some(path) = &record.details_path
    {
        swriteln!(out, "<details path=\"{}\"/>", escape_xml(path.as_str()));
    }
    out.push_str("</failure>\n");
}

fn context(record: &FailureRecord, view: RecordView) -> String {
    let mut md = String::new();
    md.push('\n');
    swriteln!(md, "### {}", record.title);
    swriteln!(md, "- location: {}:{}", record.file, record.line);
    swriteln!(md, "- status: {}", record.status);
    swriteln!(md, "- duration: {}ms", record.duration_ms);
    swriteln!(md, "- retry: {}", record.retry);

    write_block(&mut md, "Error", record.message(view));
    write_block(&mut md, "Stack", record.stack(view));
    write_block(&mut md, "Console", record.log(view));

    if !record.attachments.is_empty() {
        md.push('\n');
        swriteln!(md, "**Attachments**");
        for attachment in &record.attachments {
            match &attachment.path {
                Some(path) => swriteln!(md, "- {}: {path}", attachment.name),
                None => swriteln!(md, "- {}", attachment.name),
            }
        }
    }

    md.push('\n');
    swriteln!(md, "**Hint**: {}", record.hint);
    if view == RecordView::Streamed
        && let Some(path) = &record.details_path
    {
        swriteln!(md, "**Details**: {path}");
    }
    md
}

fn write_block(md: &mut String, heading: &str, body: &str) {
    if body.is_empty() {
        return;
    }
    let fence = fence_for(body);
    md.push('\n');
    swriteln!(md, "**{heading}**");
    swriteln!(md, "{fence}");
    swriteln!(md, "{}", body.trim_end());
    swriteln!(md, "{fence}");
}

/// Returns a code fence longer than any run of backticks in `body`, and at least three long.
fn fence_for(body: &str) -> String {
    let longest_run = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or_default();
    "`".repeat(longest_run.max(2) + 1)
}

pub(super) fn write_overflow(out: &mut String, limit: usize, suppressed: usize) {
    swriteln!(
        out,
        "<overflow limit=\"{limit}\" suppressed=\"{suppressed}\"/>"
    );
}

pub(super) fn write_previous_failures<'a>(
    out: &mut String,
    names: impl ExactSizeIterator<Item = &'a str>,
) {
    if names.len() == 0 {
        return;
    }
    swriteln!(out, "<previous-failures count=\"{}\">", names.len());
    for name in names {
        swriteln!(out, "{}", escape_xml(name));
    }
    out.push_str("</previous-failures>\n");
}

pub(super) fn write_flaky(out: &mut String, flaky: &[FlakyTest]) {
    if flaky.is_empty() {
        return;
    }
    swriteln!(out, "<flaky count=\"{}\">", flaky.len());
    for test in flaky {
        swriteln!(
            out,
            "<test title=\"{}\" retry=\"{}\"/>",
            escape_xml(&test.title),
            test.retry
        );
    }
    out.push_str("</flaky>\n");
}

pub(super) fn write_slow_tests(out: &mut String, slow: &SlowTests) {
    if slow.is_empty() {
        return;
    }
    swriteln!(
        out,
        "<slow-tests threshold-ms=\"{:.0}\" count=\"{}\">",
        slow.threshold_ms,
        slow.records.len()
    );
    for record in &slow.records {
        swriteln!(
            out,
            "<test title=\"{}\" location=\"{}:{}\" duration-ms=\"{}\"/>",
            escape_xml(&record.title),
            escape_xml(&record.file),
            record.line,
            record.duration_ms
        );
    }
    out.push_str("</slow-tests>\n");
}

pub(super) fn write_warnings(out: &mut String, warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    swriteln!(out, "<warnings count=\"{}\">", warnings.len());
    for warning in warnings {
        swriteln!(out, "<warning>{}</warning>", escape_xml(warning));
    }
    out.push_str("</warnings>\n");
}

pub(super) fn write_summary(
    out: &mut String,
    status: RunStatus,
    counts: &RunCounts,
    duration_ms: u64,
) {
    swriteln!(
        out,
        "<summary status=\"{status}\" passed=\"{}\" failed=\"{}\" skipped=\"{}\" flaky=\"{}\" duration-ms=\"{duration_ms}\"/>",
        counts.passed,
        counts.failed,
        counts.skipped,
        counts.flaky,
    );
}

pub(super) fn write_footer(out: &mut String) {
    out.push_str("</test-run>\n");
}

/// Renders the contents of a detail file: the unbounded view of `record`.
pub fn detail_file_contents(record: &FailureRecord) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_failure(&mut out, record, RecordView::Detail);
    out
}
