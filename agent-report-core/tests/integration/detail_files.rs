// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use agent_report_metadata::RunStatus;
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use pretty_assertions::assert_eq;

const DETAIL_FILE: &str = "suite_login-details.xml";

async fn run(toml: &str, output_dir: &Utf8Path, fixtures: &[TestFixture]) -> String {
    let mut out = String::new();
    let mut reporter = build_reporter(toml, &mut out);
    let mut events = vec![begin(fixtures.len(), 1, output_dir)];
    events.extend(fixtures.iter().map(TestFixture::event));
    events.push(end(RunStatus::Passed));
    feed(&mut reporter, events).await;
    assert!(reporter.is_finished());
    drop(reporter);
    out
}

#[tokio::test]
async fn failure_is_persisted_then_retracted() {
    let dir = Utf8TempDir::new().unwrap();
    // The output directory is created lazily.
    let output_dir = dir.path().join("test-results");

    let out = run("", &output_dir, &[TestFixture::failing("login")]).await;
    let path = output_dir.join(DETAIL_FILE);
    assert!(path.exists(), "detail file written to {path}");
    assert!(out.contains(&format!("<details path=\"{path}\"/>")));

    // Once the test passes again, its detail file goes away.
    let out = run("", &output_dir, &[TestFixture::passing("login")]).await;
    assert!(!path.exists(), "detail file removed from {path}");
    assert!(!out.contains("<previous-failures"), "output: {out}");
    assert!(!out.contains("<warnings"), "output: {out}");
}

#[tokio::test]
async fn stale_files_are_listed_as_previous_failures() {
    let dir = Utf8TempDir::new().unwrap();
    std::fs::write(dir.path().join("suite_old-details.xml"), "stale").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "unrelated").unwrap();

    let out = run(
        "",
        dir.path(),
        &[TestFixture::passing("new"), TestFixture::failing("login")],
    )
    .await;

    assert!(
        out.contains("<previous-failures count=\"1\">\nsuite_old-details.xml\n</previous-failures>\n"),
        "output: {out}"
    );
    // Previous failures come after failures and before the summary.
    let previous = out.find("<previous-failures").unwrap();
    assert!(out.find("<failure ").unwrap() < previous);
    assert!(previous < out.find("<summary status").unwrap());

    // Untouched stale files are left alone.
    assert!(dir.path().join("suite_old-details.xml").exists());
    assert!(dir.path().join("notes.txt").exists());
}

#[tokio::test]
async fn previous_failures_can_be_silenced() {
    let dir = Utf8TempDir::new().unwrap();
    std::fs::write(dir.path().join("suite_old-details.xml"), "stale").unwrap();

    let out = run(
        "warn-previous-failures = false",
        dir.path(),
        &[TestFixture::passing("new")],
    )
    .await;
    assert!(!out.contains("<previous-failures"), "output: {out}");
}

#[tokio::test]
async fn rerun_failure_is_not_a_previous_failure() {
    let dir = Utf8TempDir::new().unwrap();
    std::fs::write(dir.path().join(DETAIL_FILE), "stale").unwrap();

    let out = run("", dir.path(), &[TestFixture::failing("login")]).await;
    assert!(!out.contains("<previous-failures"), "output: {out}");

    // The stale contents were replaced.
    let contents = std::fs::read_to_string(dir.path().join(DETAIL_FILE)).unwrap();
    assert!(contents.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
}

#[tokio::test]
async fn detail_file_has_unbounded_output() {
    let dir = Utf8TempDir::new().unwrap();
    let out = run(
        "max-log-lines = 0\nmax-stack-frames = 1",
        dir.path(),
        &[TestFixture::failing("login")],
    )
    .await;

    // The streamed report honors the limits.
    assert!(!out.contains("**Console**"), "output: {out}");
    assert!(!out.contains("log line"), "output: {out}");

    let contents = std::fs::read_to_string(dir.path().join(DETAIL_FILE)).unwrap();
    assert!(contents.contains("**Console**"), "contents: {contents}");
    assert!(contents.contains("log line"));
    assert!(contents.contains("at /repo/tests/suite.spec.ts:11:7"));
    assert!(!contents.contains("node_modules"));
    assert!(!contents.contains("<details"));
}

#[tokio::test]
async fn disabled_detail_files_touch_nothing() {
    let dir = Utf8TempDir::new().unwrap();
    std::fs::write(dir.path().join(DETAIL_FILE), "stale").unwrap();

    let out = run(
        "write-detail-files = false",
        dir.path(),
        &[TestFixture::failing("login"), TestFixture::passing("other")],
    )
    .await;
    assert!(!out.contains("<details"), "output: {out}");
    assert!(!out.contains("**Details**"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join(DETAIL_FILE)).unwrap(),
        "stale"
    );
}

#[tokio::test]
async fn unwritable_output_dir_is_a_warning() {
    let dir = Utf8TempDir::new().unwrap();
    // A regular file where the output directory should be.
    let output_dir = dir.path().join("blocked");
    std::fs::write(&output_dir, "not a directory").unwrap();

    let out = run("", &output_dir, &[TestFixture::failing("login")]).await;
    assert_eq!(count_failures(&out), 1);
    assert!(out.contains("<warnings count="), "output: {out}");
    assert!(out.contains("<summary status=\"passed\" passed=\"0\" failed=\"1\""));
    assert!(out.ends_with("</test-run>\n"));
}

#[tokio::test]
async fn same_title_in_two_projects_is_two_tests() {
    let dir = Utf8TempDir::new().unwrap();
    let out = run(
        "",
        dir.path(),
        &[
            TestFixture::failing("login").project("chromium"),
            TestFixture::passing("login").project("firefox"),
        ],
    )
    .await;

    assert!(
        out.contains("<summary status=\"passed\" passed=\"1\" failed=\"1\" skipped=\"0\" flaky=\"0\""),
        "output: {out}"
    );
    assert!(out.contains("<failure id=\"chromium_suite_login\""), "output: {out}");

    // The firefox pass leaves the chromium failure's detail file alone.
    let path = dir.path().join("chromium_suite_login-details.xml");
    assert!(path.exists(), "detail file kept at {path}");
    assert!(!dir.path().join(DETAIL_FILE).exists());

    // A clean chromium pass on the next run retracts it.
    run("", dir.path(), &[TestFixture::passing("login").project("chromium")]).await;
    assert!(!path.exists(), "detail file removed from {path}");
}

#[tokio::test]
async fn flaky_pass_in_one_project_keeps_failure_in_another() {
    let dir = Utf8TempDir::new().unwrap();
    let out = run(
        "",
        dir.path(),
        &[
            TestFixture::failing("login").project("chromium"),
            TestFixture::failing("login").project("firefox").retry(0, 1),
            TestFixture::passing("login").project("firefox").retry(1, 1),
        ],
    )
    .await;

    assert!(
        out.contains("<summary status=\"passed\" passed=\"0\" failed=\"1\" skipped=\"0\" flaky=\"1\""),
        "output: {out}"
    );
    assert!(dir.path().join("chromium_suite_login-details.xml").exists());
}

#[tokio::test]
async fn long_error_message_is_bounded_in_stream_only() {
    let dir = Utf8TempDir::new().unwrap();
    let message: &'static str = "Expected: 1\nReceived: 2\n".repeat(2000).leak();
    let fixture = TestFixture {
        message: Some(message),
        ..TestFixture::failing("login")
    };
    let out = run("max-error-chars = 100\nmax-log-chars = 100", dir.path(), &[fixture]).await;

    assert!(out.len() < 4000, "streamed report is {} bytes", out.len());
    assert!(out.contains("[message truncated, see details]"), "output: {out}");

    let contents = std::fs::read_to_string(dir.path().join(DETAIL_FILE)).unwrap();
    assert!(contents.contains(message.trim_end()), "detail file holds the whole message");
    assert!(!contents.contains("[message truncated"));
}
