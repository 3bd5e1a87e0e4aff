// SPDX-FileCopyrightText: 2026 Sendry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Violation detection against a moderation policy.

use std::sync::LazyLock;

use regex::Regex;

use sendry_storage::ModerationPolicy;

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(https?://\S+)|(www\.\S+)").expect("link pattern is valid")
});

/// A policy violation found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Link,
    BannedTerm(String),
}

impl Violation {
    /// Human-readable reason used in warning messages.
    pub fn reason(&self) -> String {
        match self {
            Self::Link => "sharing links is not allowed".into(),
            Self::BannedTerm(term) => format!("use of the prohibited term \"{term}\""),
        }
    }
}

/// Check a message text against the policy. Link detection takes precedence
/// over banned terms; the first match wins.
///
/// Banned terms are matched as case-insensitive substrings. The stored terms
/// are already lowercase.
pub fn classify(text: &str, policy: &ModerationPolicy) -> Option<Violation> {
    if policy.anti_link && LINK_RE.is_match(text) {
        return Some(Violation::Link);
    }
    let lower = text.to_lowercase();
    policy
        .banned_terms
        .iter()
        .find(|term| !term.is_empty() && lower.contains(term.as_str()))
        .map(|term| Violation::BannedTerm(term.clone()))
}
