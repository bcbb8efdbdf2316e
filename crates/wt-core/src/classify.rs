//! Domain classification rules.
//!
//! Resolution order for a domain:
//! 1. the user's productive list (exact match)
//! 2. the user's unproductive list (exact match)
//! 3. built-in productive patterns (substring match)
//! 4. built-in unproductive patterns (substring match)
//! 5. neutral

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Classification, Domain};

/// Built-in productive patterns, consulted when no user rule matches.
pub const DEFAULT_PRODUCTIVE_PATTERNS: &[&str] =
    &["stackoverflow.com", "github.com", "leetcode.com"];

/// Built-in unproductive patterns, consulted when no user rule matches.
pub const DEFAULT_UNPRODUCTIVE_PATTERNS: &[&str] =
    &["facebook.com", "twitter.com", "instagram.com"];

const STARTER_PRODUCTIVE: &[&str] = &[
    "github.com",
    "stackoverflow.com",
    "leetcode.com",
    "developer.mozilla.org",
];

const STARTER_UNPRODUCTIVE: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "instagram.com",
    "youtube.com",
    "netflix.com",
];

/// User-configured classification lists.
///
/// Entries are normalized on construction (trimmed, lower-cased, blanks
/// dropped) so lookups compare against the same form as [`Domain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RuleLists")]
pub struct RuleSet {
    productive: BTreeSet<String>,
    unproductive: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RuleLists {
    #[serde(default)]
    productive: Vec<String>,
    #[serde(default)]
    unproductive: Vec<String>,
}

impl From<RuleLists> for RuleSet {
    fn from(lists: RuleLists) -> Self {
        Self::new(lists.productive, lists.unproductive)
    }
}

impl RuleSet {
    /// Builds a rule set from raw user input.
    pub fn new<P, U>(productive: P, unproductive: U) -> Self
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        U: IntoIterator,
        U::Item: AsRef<str>,
    {
        Self {
            productive: normalize_entries(productive),
            unproductive: normalize_entries(unproductive),
        }
    }

    /// The rule set a fresh installation starts with.
    pub fn starter() -> Self {
        Self::new(STARTER_PRODUCTIVE, STARTER_UNPRODUCTIVE)
    }

    pub const fn productive(&self) -> &BTreeSet<String> {
        &self.productive
    }

    pub const fn unproductive(&self) -> &BTreeSet<String> {
        &self.unproductive
    }

    /// Classifies a domain against the user lists and the built-in fallback.
    pub fn classify(&self, domain: &Domain) -> Classification {
        let domain = domain.as_str();
        if self.productive.contains(domain) {
            return Classification::Productive;
        }
        if self.unproductive.contains(domain) {
            return Classification::Unproductive;
        }
        if DEFAULT_PRODUCTIVE_PATTERNS
            .iter()
            .any(|pattern| domain.contains(pattern))
        {
            return Classification::Productive;
        }
        if DEFAULT_UNPRODUCTIVE_PATTERNS
            .iter()
            .any(|pattern| domain.contains(pattern))
        {
            return Classification::Unproductive;
        }
        Classification::Neutral
    }
}

fn normalize_entries<I>(entries: I) -> BTreeSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_ascii_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}
