// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable data model for [agent-report](https://crates.io/crates/agent-report).
//!
//! A test runner describes a run to `agent-report` as a stream of JSON-lines events: a single
//! [`RunBegin`], one [`TestEnd`] per finished test attempt, and a single [`RunEnd`]. This crate
//! contains the serde representation of those events, along with the documented exit codes of the
//! `agent-report` binary.

mod errors;
mod events;
mod exit_codes;

pub use errors::*;
pub use events::*;
pub use exit_codes::*;
