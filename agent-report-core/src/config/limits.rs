// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::LimitParseError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// An upper bound on a quantity of output, such as lines or characters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Limit {
    /// At most this many items.
    Count(usize),

    /// No limit.
    Unbounded,
}

impl Limit {
    pub(crate) const EXPECTED: &'static str = "a non-negative integer or \"unbounded\"";

    /// Returns the limit as a count, or `None` if unbounded.
    pub fn count(self) -> Option<usize> {
        match self {
            Self::Count(n) => Some(n),
            Self::Unbounded => None,
        }
    }

    /// Returns true if this limit permits nothing at all.
    pub fn is_zero(self) -> bool {
        self == Self::Count(0)
    }

    /// Returns true if `n` items exceed this limit.
    pub fn is_exceeded_by(self, n: usize) -> bool {
        match self {
            Self::Count(max) => n > max,
            Self::Unbounded => false,
        }
    }

    /// Converts a raw config value, requiring counts to be at least `min`.
    pub(crate) fn from_raw(raw: &RawBound, min: usize) -> Result<Self, LimitParseError> {
        let limit = match raw {
            RawBound::Int(n) => {
                let n = usize::try_from(*n)
                    .map_err(|_| LimitParseError::new(n.to_string(), "negative value"))?;
                Self::Count(n)
            }
            RawBound::String(s) => s.parse()?,
        };
        match limit {
            Self::Count(n) if n < min => Err(LimitParseError::new(
                n.to_string(),
                format!("must be at least {min}"),
            )),
            limit => Ok(limit),
        }
    }
}

impl FromStr for Limit {
    type Err = LimitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }

        s.parse::<usize>()
            .map(Self::Count)
            .map_err(|err| LimitParseError::new(s, err.to_string()))
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// A config value that is either an integer or a keyword such as `"unbounded"`.
///
/// Range checks happen after deserialization so that out-of-range values can be corrected
/// rather than rejected.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawBound {
    Int(i64),
    String(String),
}
