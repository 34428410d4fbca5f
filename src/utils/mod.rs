//! Utility functions and helpers.

pub mod http;

/// Collapse runs of whitespace (including `&nbsp;` leftovers) into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `s` is a plausible race number: 1 to 8 ASCII digits.
pub fn is_bib(s: &str) -> bool {
    (1..=8).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}
