// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [agent-report](https://crates.io/crates/agent-report).
//!
//! The engine consumes the lifecycle events described in [`agent_report_metadata`] and writes a
//! bounded report meant to be read by an automated agent. The main entry point is
//! [`reporter::AgentReporter`], built through [`reporter::AgentReporterBuilder`].

pub mod classify;
pub mod config;
pub mod errors;
pub mod log_window;
pub mod reporter;
pub mod sanitize;
pub mod write_str;
