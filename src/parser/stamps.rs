//! Stamp extraction from the `X-Phabricator-Stamps` header.
//!
//! The header is a space-separated list of `key(value)` tokens, e.g.
//! `actor(@Chlod) application(Maniphest) herald(H9) herald(H293) tag(#ultraviolet)`.
//! Keys may repeat. Every lookup scans the raw text again; the set is never
//! parsed into a map.

use regex::Regex;
use tracing::warn;

/// Value of the first `key(...)` token in `stamps`, if any.
///
/// The opening parenthesis must follow the key directly, so `tag` never
/// matches inside `task-priority(25)`. The value runs up to the next `)`.
pub fn find_stamp<'a>(key: &str, stamps: &'a str) -> Option<&'a str> {
    let pattern = format!(r"{}\(([^)]*)\)", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.captures(stamps)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Like [`find_stamp`], but logs a warning when the stamp is missing.
pub fn get_stamp<'a>(key: &str, stamps: &'a str) -> Option<&'a str> {
    let value = find_stamp(key, stamps);
    if value.is_none() {
        warn!(tag = "missing_stamp", stamp = key, "missing stamp");
    }
    value
}

/// Substring filters deciding which stamp sets are of interest.
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StampFilter {
    filters: Vec<String>,
}

impl StampFilter {
    pub fn new<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filters: filters
                .into_iter()
                .map(|f| {
                    let f: String = f.into();
                    f.trim().to_string()
                })
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    /// Build a filter from a comma-separated list such as
    /// `"tag(#ultraviolet),tag(#twinkle)"`.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// True iff `stamps` contains any filter as a literal substring.
    pub fn matches(&self, stamps: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| stamps.contains(f.as_str()))
    }
}
