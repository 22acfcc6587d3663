// Copyright (c) The agent-report Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of error messages into categories with remediation hints.
//!
//! Rules are plain data: a case-insensitive pattern, a category tag and a hint. Custom rules are
//! checked before the built-in table, and within each list the first matching rule wins.

use crate::errors::HintRuleError;
use regex::{Regex, RegexBuilder};
use std::{borrow::Cow, fmt, sync::LazyLock};

/// The category an error message was classified into.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ErrorType(Cow<'static, str>);

impl ErrorType {
    /// A wait, selector or action timed out.
    pub const TIMEOUT: Self = Self(Cow::Borrowed("timeout"));

    /// An expectation did not hold.
    pub const ASSERTION: Self = Self(Cow::Borrowed("assertion"));

    /// A request failed or a server could not be reached.
    pub const NETWORK: Self = Self(Cow::Borrowed("network"));

    /// The test was cancelled.
    pub const INTERRUPTED: Self = Self(Cow::Borrowed("interrupted"));

    /// No rule matched.
    pub const UNKNOWN: Self = Self(Cow::Borrowed("unknown"));

    /// Creates a category from a custom rule's tag.
    pub fn custom(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Returns the tag for this category.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single classification rule.
#[derive(Clone, Debug)]
pub struct HintRule {
    pattern: Regex,
    error_type: ErrorType,
    hint: Cow<'static, str>,
}

impl HintRule {
    /// Compiles a rule. `pattern` is a regular expression matched case-insensitively anywhere in
    /// the message.
    pub fn new(
        pattern: &str,
        error_type: ErrorType,
        hint: impl Into<Cow<'static, str>>,
    ) -> Result<Self, HintRuleError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| HintRuleError::new(pattern, err))?;
        Ok(Self {
            pattern,
            error_type,
            hint: hint.into(),
        })
    }

    /// Returns true if this rule matches `message`.
    pub fn is_match(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }

    /// Returns the category assigned by this rule.
    pub fn error_type(&self) -> &ErrorType {
        &self.error_type
    }

    /// Returns the remediation hint for this rule.
    pub fn hint(&self) -> &str {
        &self.hint
    }
}

/// The result of classifying an error message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Classification {
    /// The category the message was classified into.
    pub error_type: ErrorType,

    /// A remediation hint for the category.
    pub hint: Cow<'static, str>,
}

impl Classification {
    /// The hint used when no rule matches.
    pub const DEFAULT_HINT: &'static str = "inspect stack trace";

    fn unknown() -> Self {
        Self {
            error_type: ErrorType::UNKNOWN,
            hint: Cow::Borrowed(Self::DEFAULT_HINT),
        }
    }
}

impl From<&HintRule> for Classification {
    fn from(rule: &HintRule) -> Self {
        Self {
            error_type: rule.error_type.clone(),
            hint: rule.hint.clone(),
        }
    }
}

// Ordered: more specific assertion and timeout shapes come before the generic ones.
static BUILTIN_RULE_TABLE: &[(&str, ErrorType, &str)] = &[
    (
        r"to(?:Be)?Visible|toBeHidden|element\(s\) not found|not visible",
        ErrorType::ASSERTION,
        "Visibility assertion failed: the element was missing or hidden. Check the selector and \
         the navigation or state change that should have revealed it.",
    ),
    (
        r"toHaveURL|toHaveTitle|unexpected (?:url|title)",
        ErrorType::ASSERTION,
        "Page URL or title assertion failed: check redirects and whether navigation finished \
         before the assertion ran.",
    ),
    (
        r"expect\(|expected|received|assert",
        ErrorType::ASSERTION,
        "Expectation mismatch: compare the expected and received values to decide whether the \
         implementation or the expectation is wrong.",
    ),
    (
        r"waiting for (?:selector|locator)|(?:click|fill|hover|tap|press|check|selectOption|waitForSelector)\b.*timeout",
        ErrorType::TIMEOUT,
        "An action timed out waiting for an element: verify the selector still matches and the \
         element is visible, enabled and not covered.",
    ),
    (
        r"timeout|timed out|deadline exceeded",
        ErrorType::TIMEOUT,
        "The test or an operation exceeded its timeout: look for a missing response or element, \
         or raise the timeout if the operation is legitimately slow.",
    ),
    (
        r"(?:status|http|response)(?: code)?[\s:=]*[45]\d{2}\b",
        ErrorType::NETWORK,
        "A request returned an HTTP error status: check the backend logs and the request payload.",
    ),
    (
        r"econnrefused|econnreset|enotfound|connection refused|connection reset|net::err_|getaddrinfo|dns|socket hang up",
        ErrorType::NETWORK,
        "The server could not be reached: make sure the application under test is running and \
         the base URL is correct.",
    ),
    (
        r"interrupted|cancell?ed|aborted|sigint|sigterm",
        ErrorType::INTERRUPTED,
        "The test was cancelled before it finished, usually because the run was aborted or \
         another failure stopped it. Re-run it on its own.",
    ),
];

static BUILTIN_RULES: LazyLock<Vec<HintRule>> = LazyLock::new(|| {
    BUILTIN_RULE_TABLE
        .iter()
        .map(|(pattern, error_type, hint)| {
            HintRule::new(pattern, error_type.clone(), *hint)
                .expect("built-in hint rules are valid regexes")
        })
        .collect()
});

/// Returns the built-in rules, in evaluation order.
pub fn builtin_rules() -> &'static [HintRule] {
    &BUILTIN_RULES
}

/// Returns the first rule in `rules` that matches `message`.
pub fn first_match<'a>(
    rules: impl IntoIterator<Item = &'a HintRule>,
    message: &str,
) -> Option<&'a HintRule> {
    rules.into_iter().find(|rule| rule.is_match(message))
}

/// Classifies `message`, checking `custom_rules` before the built-in rules.
///
/// Falls back to [`ErrorType::UNKNOWN`] with [`Classification::DEFAULT_HINT`] if nothing matches.
pub fn classify(message: &str, custom_rules: &[HintRule]) -> Classification {
    first_match(custom_rules.iter().chain(builtin_rules()), message)
        .map(Classification::from)
        .unwrap_or_else(Classification::unknown)
}
