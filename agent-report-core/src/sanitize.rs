// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure helpers that make strings safe to embed in the report.

use aho_corasick::AhoCorasick;
use std::{borrow::Cow, sync::LazyLock};
use swrite::{SWrite, swrite};

/// The maximum length of a sanitized test identity.
pub const MAX_IDENTITY_LEN: usize = 100;

/// The maximum number of characters of an error message shown in a failure summary.
pub const MAX_SUMMARY_CHARS: usize = 300;

/// Escapes `input` for use in XML text or attribute values.
///
/// Characters that are not allowed in XML 1.0 documents (most C0 control characters) are
/// replaced with U+FFFD first.
pub fn escape_xml(input: &str) -> Cow<'_, str> {
    match strip_invalid_xml_chars(input) {
        Cow::Borrowed(input) => quick_xml::escape::escape(input),
        Cow::Owned(stripped) => {
            Cow::Owned(quick_xml::escape::escape(stripped.as_str()).into_owned())
        }
    }
}

/// Wraps `input` in a CDATA section, leaving its contents unescaped.
///
/// Any `]]>` sequence inside `input` is split across two CDATA sections so that the result stays
/// well-formed.
pub fn cdata(input: &str) -> String {
    let input = strip_invalid_xml_chars(input);
    let mut out = String::with_capacity(input.len() + 12);
    out.push_str("<![CDATA[");
    out.push_str(&input.replace("]]>", "]]]]><![CDATA[>"));
    out.push_str("]]>");
    out
}

fn is_valid_xml_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{0}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}' => false,
        _ => true,
    }
}

fn strip_invalid_xml_chars(input: &str) -> Cow<'_, str> {
    if input.chars().all(is_valid_xml_char) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(
            input
                .chars()
                .map(|c| if is_valid_xml_char(c) { c } else { '\u{FFFD}' })
                .collect(),
        )
    }
}

/// Turns a joined test title into an identifier that is safe to use as a file name and as an XML
/// attribute.
///
/// Every run of non-alphanumeric ASCII characters becomes a single `_`, leading and trailing
/// underscores are trimmed, and the result is capped at [`MAX_IDENTITY_LEN`] bytes. The function is
/// idempotent.
pub fn sanitize_identity(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_IDENTITY_LEN));
    let mut pending_separator = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c);
            if out.len() >= MAX_IDENTITY_LEN {
                break;
            }
        } else {
            pending_separator = true;
        }
    }

    out.truncate(MAX_IDENTITY_LEN);
    let trimmed_len = out.trim_end_matches('_').len();
    out.truncate(trimmed_len);
    out
}

/// Returns the first non-blank line of `message`, trimmed and capped at [`MAX_SUMMARY_CHARS`]
/// characters.
pub fn error_summary(message: &str) -> Cow<'_, str> {
    let line = message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    match line.char_indices().nth(MAX_SUMMARY_CHARS) {
        Some((idx, _)) => Cow::Owned(format!("{}...", &line[..idx])),
        None => Cow::Borrowed(line),
    }
}

/// Path fragments identifying stack frames that belong to runtimes, test frameworks or
/// third-party dependencies.
pub const BUILTIN_STACK_FILTERS: &[&str] = &[
    "node_modules/",
    "node_modules\\",
    "node:internal",
    "internal/process/",
    "/rustc/",
    "/.cargo/registry/",
    "\\.cargo\\registry\\",
    "library/std/src/",
    "library/core/src/",
    "library/test/src/",
];

static BUILTIN_STACK_FILTER: LazyLock<StackFilter> = LazyLock::new(|| {
    StackFilter::new(std::iter::empty::<&str>()).expect("built-in stack filters are valid")
});

/// Decides which stack frames are dropped from the report.
#[derive(Clone, Debug)]
pub struct StackFilter {
    matcher: AhoCorasick,
}

impl StackFilter {
    /// Creates a filter from the built-in markers plus `extra` markers.
    pub fn new<I, S>(extra: I) -> Result<Self, aho_corasick::BuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = BUILTIN_STACK_FILTERS
            .iter()
            .map(|s| (*s).to_owned())
            .chain(extra.into_iter().map(|s| s.as_ref().to_owned()))
            .collect();
        Ok(Self {
            matcher: AhoCorasick::new(&patterns)?,
        })
    }

    /// Returns the filter made of the built-in markers alone.
    pub fn builtin() -> &'static Self {
        &BUILTIN_STACK_FILTER
    }

    /// Returns true if `frame` should be dropped.
    pub fn is_filtered(&self, frame: &str) -> bool {
        self.matcher.is_match(frame)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum LineKind {
    Text,
    // "at ..." in JavaScript stacks, or the location under a Rust frame.
    At,
    // Rust backtraces: "  12: crate::module::function"
    Numbered,
}

fn line_kind(line: &str) -> LineKind {
    let line = line.trim_start();
    if line.starts_with("at ") {
        return LineKind::At;
    }
    match line.split_once(": ") {
        Some((index, _)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            LineKind::Numbered
        }
        _ => LineKind::Text,
    }
}

/// Splits `stack` into the lines before its first frame, such as the error message a JavaScript
/// stack opens with, and the rest.
pub fn split_stack_heading(stack: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in stack.split_inclusive('\n') {
        if line_kind(line) != LineKind::Text {
            return stack.split_at(offset);
        }
        offset += line.len();
    }
    (stack, "")
}

/// A stack line that isn't a frame, or a frame with its continuation lines.
struct StackEntry<'a> {
    is_frame: bool,
    lines: Vec<&'a str>,
}

fn stack_entries(stack: &str) -> Vec<StackEntry<'_>> {
    let mut entries: Vec<StackEntry<'_>> = Vec::new();
    let mut after_numbered = false;
    for line in stack.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let kind = line_kind(line);
        if kind == LineKind::At
            && after_numbered
            && let Some(entry) = entries.last_mut()
        {
            entry.lines.push(line);
            continue;
        }
        after_numbered = kind == LineKind::Numbered;
        entries.push(StackEntry {
            is_frame: kind != LineKind::Text,
            lines: vec![line],
        });
    }
    entries
}

/// Removes framework and dependency frames from `stack`, keeping at most `max_frames` of the
/// remaining frames.
///
/// Lines that don't look like frames (such as the error message heading a stack) are kept. A
/// numbered Rust frame and the `at` lines under it count as one frame, and are dropped together
/// if any of them matches the filter. If frames were cut by `max_frames`, a final line records how
/// many.
pub fn prune_stack(stack: &str, filter: &StackFilter, max_frames: Option<usize>) -> String {
    let mut out = String::with_capacity(stack.len());
    let mut kept_frames = 0;
    let mut omitted_frames = 0;

    for entry in stack_entries(stack) {
        if entry.is_frame {
            if entry.lines.iter().any(|line| filter.is_filtered(line)) {
                continue;
            }
            if max_frames.is_some_and(|max| kept_frames >= max) {
                omitted_frames += 1;
                continue;
            }
            kept_frames += 1;
        }
        for line in entry.lines {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line.trim_end());
        }
    }

    if omitted_frames > 0 {
        if !out.is_empty() {
            out.push('\n');
        }
        let plural = if omitted_frames == 1 { "" } else { "s" };
        swrite!(out, "    ... {omitted_frames} more frame{plural}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("login > works", "login_works" ; "separator")]
    #[test_case("  Suite :: case #1!  ", "Suite_case_1" ; "trimmed and collapsed")]
    #[test_case("already_sanitized_id", "already_sanitized_id" ; "already sanitized")]
    #[test_case("émoji 🎉 test", "moji_test" ; "non ascii")]
    #[test_case("", "" ; "empty")]
    #[test_case("!!!", "" ; "only separators")]
    fn sanitize_identity_cases(input: &str, expected: &str) {
        assert_eq!(sanitize_identity(input), expected);
    }

    #[test]
    fn sanitize_identity_caps_length() {
        let input = "a".repeat(MAX_IDENTITY_LEN - 1) + " b";
        let output = sanitize_identity(&input);
        assert_eq!(output.len(), MAX_IDENTITY_LEN - 1);
        assert!(!output.ends_with('_'));
    }

    #[test_strategy::proptest]
    fn sanitize_identity_is_idempotent_and_bounded(input: String) {
        let once = sanitize_identity(&input);
        proptest::prop_assert!(once.len() <= MAX_IDENTITY_LEN);
        proptest::prop_assert_eq!(sanitize_identity(&once), once.clone());
    }

    #[test_case("a < b && c > \"d\"", "a &lt; b &amp;&amp; c &gt; &quot;d&quot;" ; "specials")]
    #[test_case("plain", "plain" ; "plain")]
    #[test_case("bell\u{7}here", "bell\u{FFFD}here" ; "control character")]
    #[test_case("\u{1b}[31mred\u{1b}[0m", "\u{FFFD}[31mred\u{FFFD}[0m" ; "escape sequence")]
    fn escape_xml_cases(input: &str, expected: &str) {
        assert_eq!(escape_xml(input), expected);
    }

    #[test]
    fn cdata_splits_terminator() {
        assert_eq!(cdata("a ]]> b"), "<![CDATA[a ]]]]><![CDATA[> b]]>");
        assert_eq!(cdata("<tag>"), "<![CDATA[<tag>]]>");
    }

    #[test]
    fn error_summary_first_line() {
        assert_eq!(error_summary("\n  first line  \nsecond"), "first line");
        assert_eq!(error_summary(""), "");

        let long = "x".repeat(MAX_SUMMARY_CHARS + 10);
        let summary = error_summary(&long);
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    const STACK: &str = indoc! {"
        Error: expected 3 to be 4
            at Object.<anonymous> (/repo/node_modules/expect/build/index.js:10:5)
            at /repo/tests/math.spec.ts:12:20
            at helper (/repo/tests/helpers.ts:4:3)
            at node:internal/process/task_queues:95:5
            at run (/repo/tests/math.spec.ts:30:1)
    "};

    #[test]
    fn prune_stack_drops_dependency_frames() {
        let pruned = prune_stack(STACK, StackFilter::builtin(), None);
        assert_eq!(
            pruned,
            indoc! {"
                Error: expected 3 to be 4
                    at /repo/tests/math.spec.ts:12:20
                    at helper (/repo/tests/helpers.ts:4:3)
                    at run (/repo/tests/math.spec.ts:30:1)"}
        );
    }

    #[test]
    fn prune_stack_caps_frames() {
        let pruned = prune_stack(STACK, StackFilter::builtin(), Some(1));
        assert_eq!(
            pruned,
            indoc! {"
                Error: expected 3 to be 4
                    at /repo/tests/math.spec.ts:12:20
                    ... 2 more frames"}
        );
    }

    #[test]
    fn prune_stack_rust_backtrace() {
        let stack = indoc! {"
               0: std::panicking::begin_panic
                         at /rustc/abc/library/std/src/panicking.rs:100:5
               1: my_crate::tests::it_works
                         at ./src/lib.rs:10:9
        "};
        let pruned = prune_stack(stack, StackFilter::builtin(), None);
        assert_eq!(
            pruned,
            "1: my_crate::tests::it_works\n          at ./src/lib.rs:10:9"
        );
    }

    #[test]
    fn rust_frame_and_location_count_once() {
        let stack = indoc! {"
            thread 'tests::it_works' panicked at src/lib.rs:10:9
               1: my_crate::helper
                         at ./src/helper.rs:3:5
               2: my_crate::tests::it_works
                         at ./src/lib.rs:10:9
               3: core::ops::function::FnOnce::call_once
                         at /rustc/abc/library/core/src/ops/function.rs:250:5
               4: my_crate::main
        "};
        let pruned = prune_stack(stack, StackFilter::builtin(), Some(1));
        assert_eq!(
            pruned,
            indoc! {"
                thread 'tests::it_works' panicked at src/lib.rs:10:9
                   1: my_crate::helper
                             at ./src/helper.rs:3:5
                    ... 2 more frames"}
        );
    }

    #[test]
    fn stack_heading() {
        let (heading, frames) = split_stack_heading(STACK);
        assert_eq!(heading, "Error: expected 3 to be 4\n");
        assert!(frames.starts_with("    at Object.<anonymous>"));

        assert_eq!(split_stack_heading("no frames\nat all"), ("no frames\n", "at all"));
        assert_eq!(split_stack_heading("just text"), ("just text", ""));
        assert_eq!(split_stack_heading(""), ("", ""));
    }

    #[test]
    fn prune_stack_extra_filters() {
        let filter = StackFilter::new(["tests/helpers.ts"]).unwrap();
        let pruned = prune_stack(STACK, &filter, None);
        assert!(!pruned.contains("helpers.ts"));
        assert!(pruned.contains("math.spec.ts:30:1"));
    }
}
