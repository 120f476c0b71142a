//! Shared validation predicates for domain types.
//!
//! This module contains validation functions used by nutype-based domain types
//! across the resourcecore crates.

/// Validation predicate: reject glob metacharacters.
///
/// Identifiers reserve glob metacharacters (*, ?, [, ]) so id filters can
/// grow pattern matching without escaping rules.
pub(crate) fn no_glob_metacharacters(s: &str) -> bool {
    !s.contains(['*', '?', '[', ']'])
}

/// Validation predicate for opaque identifiers: no glob metacharacters and no
/// separators.
pub(crate) fn valid_identifier(s: &str) -> bool {
    no_glob_metacharacters(s) && no_separators(s)
}

/// Validation predicate: reject commas, which delimit id lists in provider
/// requests.
pub(crate) fn no_commas(s: &str) -> bool {
    !s.contains(',')
}

/// Validation predicate: reject characters used as separators in page cursors
/// and workspace labels.
pub(crate) fn no_separators(s: &str) -> bool {
    !s.contains([':', '/', '@']) && !s.chars().any(char::is_whitespace)
}
