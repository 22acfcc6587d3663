// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter configuration.
//!
//! The configuration is read from an embedded `default-config.toml`, optionally layered with a
//! user-provided TOML file. Out-of-range values never fail the run: they're replaced with their
//! defaults, and a [`ConfigWarning`] is recorded so the correction shows up in the report.

mod imp;
mod limits;
mod max_failures;

pub use imp::*;
pub use limits::*;
pub use max_failures::*;
