// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detail files: one file per failing test, written as failures are reported and removed when the
//! test later passes cleanly.
//!
//! File operations run in the background on a Tokio runtime, so the report stream is never
//! held up by disk I/O. Operations on the same file are chained so they apply in the order they
//! were scheduled. [`DetailFiles::finish`] is the single point where all of them are awaited.

use super::record::DETAIL_FILE_SUFFIX;
use crate::errors::{DetailFileError, DisplayErrorChain};
use camino::{Utf8Path, Utf8PathBuf};
use debug_ignore::DebugIgnore;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::{
    collections::{BTreeSet, HashMap},
    io,
};
use tokio::{runtime::Handle, sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

/// Lists the detail files in `dir`.
///
/// A missing directory has no detail files.
pub fn scan(dir: &Utf8Path) -> Result<BTreeSet<String>, DetailFileError> {
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(err) => {
            return Err(DetailFileError::ReadDir {
                dir: dir.to_owned(),
                err,
            });
        }
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry in {dir}: {err}");
                continue;
            }
        };
        let is_file = entry.file_type().is_ok_and(|file_type| file_type.is_file());
        if is_file && entry.file_name().ends_with(DETAIL_FILE_SUFFIX) {
            names.insert(entry.file_name().to_owned());
        }
    }
    Ok(names)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum FileOpKind {
    Write,
    Remove,
}

#[derive(Debug)]
struct PendingOp {
    file_name: String,
    kind: FileOpKind,
    seq: u64,
    handle: JoinHandle<Result<(), DetailFileError>>,
}

/// Tracks and schedules detail file operations for one output directory.
#[derive(Debug)]
pub struct DetailFiles {
    output_dir: Utf8PathBuf,
    handle: Handle,
    // File names believed to exist once all scheduled operations settle.
    existing: BTreeSet<String>,
    // Files found by the initial scan that this run hasn't touched.
    previous: BTreeSet<String>,
    // Completes when the most recently scheduled operation on a file has finished.
    tails: DebugIgnore<HashMap<String, Shared<BoxFuture<'static, ()>>>>,
    latest_seq: HashMap<String, u64>,
    pending: Vec<PendingOp>,
    next_seq: u64,
}

impl DetailFiles {
    /// Creates a manager for `output_dir`, whose detail files are `existing` (see [`scan`]).
    ///
    /// Operations are spawned on `handle`.
    pub fn new(output_dir: Utf8PathBuf, existing: BTreeSet<String>, handle: Handle) -> Self {
        Self {
            output_dir,
            handle,
            previous: existing.clone(),
            existing,
            tails: DebugIgnore::default(),
            latest_seq: HashMap::new(),
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    /// Returns the output directory.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Returns true if `file_name` is known to exist, or is scheduled to be written.
    pub fn contains(&self, file_name: &str) -> bool {
        self.existing.contains(file_name)
    }

    /// Returns the detail files left behind by earlier runs that this run hasn't written or
    /// removed.
    pub fn previous_failures(&self) -> impl ExactSizeIterator<Item = &str> {
        self.previous.iter().map(String::as_str)
    }

    /// Schedules `contents` to be written to `file_name`, creating the output directory if
    /// necessary.
    pub fn persist(&mut self, file_name: &str, contents: String) {
        let dir = self.output_dir.clone();
        let file = self.output_dir.join(file_name);
        self.existing.insert(file_name.to_owned());
        self.previous.remove(file_name);

        self.schedule(file_name, FileOpKind::Write, async move {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|err| DetailFileError::CreateDir { dir, err })?;
            tokio::fs::write(&file, contents)
                .await
                .map_err(|err| DetailFileError::Write { file, err })
        });
    }

    /// Schedules `file_name` for removal if it's known to exist.
    ///
    /// Returns true if a removal was scheduled. A file that has already disappeared is not an
    /// error.
    pub fn retract(&mut self, file_name: &str) -> bool {
        if !self.existing.remove(file_name) {
            return false;
        }
        self.previous.remove(file_name);
        debug!("retracting detail file {file_name}");

        let file = self.output_dir.join(file_name);
        self.schedule(file_name, FileOpKind::Remove, async move {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(DetailFileError::Remove { file, err }),
            }
        });
        true
    }

    fn schedule<F>(&mut self, file_name: &str, kind: FileOpKind, op: F)
    where
        F: Future<Output = Result<(), DetailFileError>> + Send + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;

        let (done_tx, done_rx) = oneshot::channel::<()>();
        // The receiver errors out if the task panics, which still counts as done.
        let tail = done_rx.map(|_| ()).boxed().shared();
        let previous = self.tails.insert(file_name.to_owned(), tail);
        self.latest_seq.insert(file_name.to_owned(), seq);

        let handle = self.handle.spawn(async move {
            if let Some(previous) = previous {
                previous.await;
            }
            let result = op.await;
            _ = done_tx.send(());
            result
        });
        self.pending.push(PendingOp {
            file_name: file_name.to_owned(),
            kind,
            seq,
            handle,
        });
    }

    /// Waits for every scheduled operation to settle, returning the ones that failed.
    ///
    /// Failures are logged, and the set of known files is corrected to match what's on disk.
    pub async fn finish(&mut self) -> Vec<DetailFileError> {
        let mut errors = Vec::new();
        for op in std::mem::take(&mut self.pending) {
            let result = match op.handle.await {
                Ok(result) => result,
                Err(err) => Err(DetailFileError::TaskFailed {
                    file: self.output_dir.join(&op.file_name),
                    err,
                }),
            };
            let Err(error) = result else {
                continue;
            };

            warn!("{}", DisplayErrorChain::new(&error));
            // Only the last operation on a file decides whether it exists.
            if self.latest_seq.get(&op.file_name) == Some(&op.seq) {
                match op.kind {
                    FileOpKind::Write => {
                        self.existing.remove(&op.file_name);
                    }
                    FileOpKind::Remove => {
                        self.existing.insert(op.file_name);
                    }
                }
            }
            errors.push(error);
        }

        self.tails.clear();
        self.latest_seq.clear();
        errors
    }
}
