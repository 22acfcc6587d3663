// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn a test runner's lifecycle events into a bounded report for automated agents.
//!
//! `agent-report` reads a JSON-lines event stream (see
//! [`agent_report_metadata::ReporterEvent`]) and writes a compact XML report with embedded
//! markdown to standard output. Failing tests additionally get a detail file in the run's output
//! directory.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use output::{Color, OutputContext, StderrStyles};
