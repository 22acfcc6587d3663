// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use agent_report_core::{classify::classify, reporter::RunDisposition};
use agent_report_metadata::{AgentReportExitCode, RunStatus, TestStatus};
use camino_tempfile::Utf8TempDir;
use indoc::formatdoc;
use pretty_assertions::assert_eq;

const NO_DETAIL_FILES: &str = "write-detail-files = false";

#[tokio::test]
async fn full_report() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter(NO_DETAIL_FILES, &mut out);
    feed(
        &mut reporter,
        [
            begin(2, 1, dir.path()),
            TestFixture::passing("adds").event(),
            TestFixture::failing("divides").event(),
            end(RunStatus::Failed),
        ],
    )
    .await;
    assert!(reporter.is_finished());
    drop(reporter);

    let hint = classify("expect(received).toBe(expected)", &[]).hint;
    assert_eq!(
        out,
        formatdoc! {r#"
            <test-run total="2" workers="1" project="chromium">
            <failure id="suite_divides" type="assertion" file="tests/suite.spec.ts" line="10" duration-ms="100" retry="0">
            <summary>expect(received).toBe(expected)</summary>
            <context><![CDATA[
            ### suite > divides
            - location: tests/suite.spec.ts:10
            - status: failed
            - duration: 100ms
            - retry: 0

            **Error**
            ```
            expect(received).toBe(expected)
            ```

            **Stack**
            ```
            Error: expect(received).toBe(expected)
                at /repo/tests/suite.spec.ts:11:7
            ```

            **Console**
            ```
            log line
            ```

            **Hint**: {hint}
            ]]></context>
            <reproduce>npx playwright test tests/suite.spec.ts:10 --project=chromium</reproduce>
            </failure>
            <summary status="failed" passed="1" failed="1" skipped="0" flaky="0" duration-ms="5000"/>
            </test-run>
        "#}
    );
}

#[tokio::test]
async fn forty_five_tests_two_failures() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter("", &mut out);

    let mut events = vec![begin(45, 4, dir.path())];
    for i in 0..45 {
        let fixture = if i == 7 || i == 30 {
            TestFixture::failing(format!("test {i}"))
        } else {
            TestFixture::passing(format!("test {i}"))
        };
        events.push(fixture.event());
    }
    events.push(end(RunStatus::Failed));

    let dispositions = feed(&mut reporter, events).await;
    assert!(
        dispositions
            .iter()
            .all(|disposition| *disposition == RunDisposition::Continue)
    );
    drop(reporter);

    assert!(out.starts_with("<test-run total=\"45\" workers=\"4\" project=\"chromium\">\n"));
    assert_eq!(count_failures(&out), 2);
    assert!(
        out.contains(
            "<summary status=\"failed\" passed=\"43\" failed=\"2\" skipped=\"0\" flaky=\"0\" duration-ms=\"5000\"/>"
        ),
        "output: {out}"
    );
    assert!(out.ends_with("</test-run>\n"));

    for identity in ["suite_test_7", "suite_test_30"] {
        let path = dir.path().join(format!("{identity}-details.xml"));
        let contents = std::fs::read_to_string(&path).expect("detail file was written");
        assert!(contents.starts_with("<?xml"));
        assert!(contents.contains(&format!("<failure id=\"{identity}\"")));
        assert!(out.contains(&format!("<details path=\"{path}\"/>")));
    }
}

#[tokio::test]
async fn overflow_terminates_the_report() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter("max-failures = 1", &mut out);

    let dispositions = feed(
        &mut reporter,
        [
            begin(4, 1, dir.path()),
            TestFixture::passing("first").event(),
            TestFixture::failing("second").event(),
            TestFixture::failing("third").event(),
        ],
    )
    .await;
    assert_eq!(
        dispositions.last(),
        Some(&RunDisposition::Terminate {
            exit_code: AgentReportExitCode::TOO_MANY_FAILURES
        })
    );
    assert!(reporter.is_finished());

    // Later events are ignored.
    let later = feed(
        &mut reporter,
        [
            TestFixture::failing("fourth").event(),
            end(RunStatus::Failed),
        ],
    )
    .await;
    assert_eq!(
        later,
        vec![RunDisposition::Continue, RunDisposition::Continue]
    );
    drop(reporter);

    assert_eq!(count_failures(&out), 1);
    assert!(out.contains("<failure id=\"suite_second\""));
    assert!(!out.contains("suite_third\""));
    assert!(!out.contains("suite_fourth"));
    assert!(out.contains("<overflow limit=\"1\" suppressed=\"1\"/>\n"));
    assert!(
        out.contains("<summary status=\"failed\" passed=\"1\" failed=\"1\" skipped=\"0\" flaky=\"0\""),
        "output: {out}"
    );
    assert!(out.ends_with("</test-run>\n"));
    assert_eq!(out.matches("</test-run>").count(), 1);
}

#[tokio::test]
async fn retried_failures_are_flaky() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter("", &mut out);
    feed(
        &mut reporter,
        [
            begin(2, 1, dir.path()),
            TestFixture::failing("eventually").retry(0, 2).event(),
            TestFixture::failing("eventually").retry(1, 2).event(),
            TestFixture::passing("eventually").retry(2, 2).event(),
            TestFixture::passing("stable").event(),
            end(RunStatus::Passed),
        ],
    )
    .await;
    drop(reporter);

    assert_eq!(count_failures(&out), 0);
    assert!(out.contains("<flaky count=\"1\">\n<test title=\"suite &gt; eventually\" retry=\"2\"/>\n</flaky>\n"));
    assert!(out.contains(
        "<summary status=\"passed\" passed=\"1\" failed=\"0\" skipped=\"0\" flaky=\"1\""
    ));
    assert!(!dir.path().join("suite_eventually-details.xml").exists());
}

#[tokio::test]
async fn skipped_tests_are_counted_silently() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter(NO_DETAIL_FILES, &mut out);

    let mut skipped = TestFixture::passing("skipped");
    skipped.status = TestStatus::Skipped;
    feed(
        &mut reporter,
        [
            begin(2, 1, dir.path()),
            skipped.event(),
            TestFixture::passing("runs").event(),
            end(RunStatus::Passed),
        ],
    )
    .await;
    drop(reporter);

    assert!(!out.contains("suite_skipped"));
    assert!(out.contains("passed=\"1\" failed=\"0\" skipped=\"1\""));
}

#[tokio::test]
async fn slow_tests_are_summarized() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter("slow-test-stddev = 1.0", &mut out);

    let mut events = vec![begin(5, 1, dir.path())];
    for (title, duration) in [("a", 100), ("b", 100), ("c", 100), ("d", 100), ("e", 900)] {
        events.push(TestFixture::passing(title).duration(duration).event());
    }
    events.push(end(RunStatus::Passed));
    feed(&mut reporter, events).await;
    drop(reporter);

    assert!(
        out.contains(indoc::indoc! {r#"
            <slow-tests threshold-ms="580" count="1">
            <test title="suite &gt; e" location="tests/suite.spec.ts:10" duration-ms="900"/>
            </slow-tests>
        "#}),
        "output: {out}"
    );
}

#[tokio::test]
async fn config_warnings_are_reported() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter("max-stack-frames = 0\nmystery = 1", &mut out);
    feed(
        &mut reporter,
        [begin(0, 1, dir.path()), end(RunStatus::Passed)],
    )
    .await;
    drop(reporter);

    assert!(out.contains("<warnings count=\"2\">\n"), "output: {out}");
    assert!(out.contains("<warning>test.toml: ignoring unknown keys: mystery</warning>"));
    assert!(out.contains("<warning>max-stack-frames: "));
}

#[tokio::test]
async fn events_outside_a_run_are_ignored() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = build_reporter("", &mut out);

    let dispositions = feed(
        &mut reporter,
        [TestFixture::failing("early").event(), end(RunStatus::Failed)],
    )
    .await;
    assert_eq!(
        dispositions,
        vec![RunDisposition::Continue, RunDisposition::Continue]
    );
    assert!(!reporter.is_running());
    assert!(!reporter.is_finished());

    feed(&mut reporter, [begin(1, 1, dir.path())]).await;
    assert!(reporter.is_running());
    drop(reporter);

    assert_eq!(out, "<test-run total=\"1\" workers=\"1\" project=\"chromium\">\n");
}

#[tokio::test]
async fn reproduce_command_callback_wins() {
    let dir = Utf8TempDir::new().unwrap();
    let mut out = String::new();
    let mut reporter = agent_report_core::reporter::AgentReporterBuilder::new(load_config(
        "write-detail-files = false\nreproduce-command = \"from-template {line}\"",
    ))
    .set_reproduce_command(|cx| format!("from-callback {}:{}", cx.file, cx.line))
    .build(
        agent_report_core::reporter::ReporterOutput::Buffer(&mut out),
        tokio::runtime::Handle::current(),
    );
    feed(
        &mut reporter,
        [
            begin(1, 1, dir.path()),
            TestFixture::failing("one").event(),
            end(RunStatus::Failed),
        ],
    )
    .await;
    drop(reporter);

    assert!(out.contains("<reproduce>from-callback tests/suite.spec.ts:10</reproduce>"));
}
