//! Query normalization.

use std::fmt;

/// A query after trimming, lowercasing, and whitespace splitting.
///
/// Two raw inputs that normalize to the same text are the same query: they
/// produce identical results and share a result cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedQuery {
    text: String,
    tokens: Vec<String>,
}

impl NormalizedQuery {
    pub fn new(raw: &str) -> Self {
        let tokens: Vec<String> = raw
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        Self {
            text: tokens.join(" "),
            tokens,
        }
    }

    /// Canonical form: lowercase tokens joined by single spaces.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token most selective for a prefix lookup: the longest one.
    pub fn longest_token(&self) -> Option<&str> {
        self.tokens
            .iter()
            .max_by_key(|token| token.chars().count())
            .map(String::as_str)
    }

    /// First character of every token, deduplicated, in token order.
    pub fn leading_chars(&self) -> Vec<char> {
        let mut chars = vec![];
        for c in self.tokens.iter().filter_map(|t| t.chars().next()) {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }
        chars
    }
}

impl fmt::Display for NormalizedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
