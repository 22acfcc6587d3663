// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod basic;
mod detail_files;
mod fixtures;
