// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::RawBound;
use crate::errors::MaxFailuresParseError;
use std::{fmt, str::FromStr};

/// The number of final-attempt failures reported before the report is cut short.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MaxFailures {
    /// Report at most this many failures.
    Count(usize),

    /// Report every failure.
    Unbounded,
}

impl MaxFailures {
    pub(crate) const EXPECTED: &'static str = "a positive integer or \"unbounded\"";

    /// Returns true if `failed` final-attempt failures exceed the maximum.
    pub fn is_exceeded(&self, failed: usize) -> bool {
        match self {
            Self::Count(n) => failed > *n,
            Self::Unbounded => false,
        }
    }

    /// Returns the maximum as a count, or `None` if unbounded.
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Unbounded => None,
        }
    }

    pub(crate) fn from_raw(raw: &RawBound) -> Result<Self, MaxFailuresParseError> {
        match raw {
            RawBound::Int(n) if *n <= 0 => Err(MaxFailuresParseError::new(
                n.to_string(),
                "max-failures may not be <= 0",
            )),
            RawBound::Int(n) => usize::try_from(*n)
                .map(Self::Count)
                .map_err(|err| MaxFailuresParseError::new(n.to_string(), err.to_string())),
            RawBound::String(s) => s.parse(),
        }
    }
}

impl FromStr for MaxFailures {
    type Err = MaxFailuresParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("all") {
            return Ok(Self::Unbounded);
        }

        match s.parse::<isize>() {
            Err(e) => Err(MaxFailuresParseError::new(s, e.to_string())),
            Ok(j) if j <= 0 => Err(MaxFailuresParseError::new(
                s,
                "max-failures may not be <= 0",
            )),
            Ok(j) => Ok(MaxFailures::Count(j as usize)),
        }
    }
}

impl fmt::Display for MaxFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Count(n) => write!(f, "{n}"),
        }
    }
}
