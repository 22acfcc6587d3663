// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate test lifecycle events into a bounded report for automated agents.
//!
//! The main type here is [`AgentReporter`], which is constructed via an
//! [`AgentReporterBuilder`].

mod aggregator;
pub mod detail_files;
mod imp;
pub mod record;
pub mod serialize;

pub use imp::*;
pub use serialize::{FlakyTest, RunCounts};
