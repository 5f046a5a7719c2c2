//! Candidate token construction
//!
//! Every token compared within one run has the same length: the known-valid
//! prefix, one character under test, and padding up to the full token size.
//! Only the test character differs between the two candidates, so the length
//! of the token cannot itself leak through the timing channel.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-length candidate token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Token text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Character at a character index
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.0.chars().nth(index)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds candidate tokens and their `Authorization` header values
#[derive(Debug, Clone)]
pub struct TokenForge {
    padding: char,
    scheme: String,
}

impl Default for TokenForge {
    fn default() -> Self {
        Self {
            padding: crate::defaults::PADDING_CHAR,
            scheme: "Token".to_string(),
        }
    }
}

impl TokenForge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different authorization scheme (e.g. `Bearer`)
    pub fn with_scheme<S: Into<String>>(mut self, scheme: S) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Use a different padding character
    pub fn with_padding(mut self, padding: char) -> Self {
        self.padding = padding;
        self
    }

    /// Build `prefix + test_char + padding` with the default forge.
    ///
    /// `missing_length` counts every character after the prefix, the test
    /// character included.
    pub fn build(prefix: &str, test_char: &str, missing_length: usize) -> Result<Token> {
        Self::default().forge(prefix, test_char, missing_length)
    }

    /// Build a token with this forge's padding character
    pub fn forge(&self, prefix: &str, test_char: &str, missing_length: usize) -> Result<Token> {
        let mut chars = test_char.chars();
        let test = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(AppError::invalid_input(format!(
                    "test character must be exactly one character, got {:?}",
                    test_char
                )))
            }
        };

        if missing_length < 1 {
            return Err(AppError::invalid_input(
                "missing length must be at least 1 (the test character itself)",
            ));
        }

        let mut token = String::with_capacity(prefix.len() + missing_length * test.len_utf8());
        token.push_str(prefix);
        token.push(test);
        token.extend(std::iter::repeat(self.padding).take(missing_length - 1));

        Ok(Token(token))
    }

    /// Value for the `Authorization` header
    pub fn authorization_value(&self, token: &Token) -> String {
        format!("{} {}", self.scheme, token.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_build_pads_after_test_char() {
        let token = TokenForge::build("AAAA", "1", 3).unwrap();
        assert_eq!(token.as_str(), "AAAA100");

        let token = TokenForge::build("AAAA", "2", 3).unwrap();
        assert_eq!(token.as_str(), "AAAA200");
    }

    #[test]
    fn test_build_without_padding() {
        let token = TokenForge::build("abc", "z", 1).unwrap();
        assert_eq!(token.as_str(), "abcz");
    }

    #[test]
    fn test_build_with_empty_prefix() {
        let token = TokenForge::build("", "x", 4).unwrap();
        assert_eq!(token.as_str(), "x000");
    }

    #[test]
    fn test_rejects_multi_char_test_case() {
        let err = TokenForge::build("AAAA", "12", 3).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_empty_test_case() {
        let err = TokenForge::build("AAAA", "", 3).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_zero_missing_length() {
        let err = TokenForge::build("AAAA", "1", 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_custom_padding_and_scheme() {
        let forge = TokenForge::new().with_padding('x').with_scheme("Bearer");
        let token = forge.forge("k", "7", 3).unwrap();
        assert_eq!(token.as_str(), "k7xx");
        assert_eq!(forge.authorization_value(&token), "Bearer k7xx");
    }

    #[test]
    fn test_default_authorization_value() {
        let forge = TokenForge::new();
        let token = forge.forge("224a", "8", 2).unwrap();
        assert_eq!(forge.authorization_value(&token), "Token 224a80");
    }

    #[test]
    fn test_multibyte_test_char_counts_as_one() {
        let token = TokenForge::build("ab", "é", 2).unwrap();
        assert_eq!(token.len(), 4);
        assert_eq!(token.char_at(2), Some('é'));
    }

    proptest! {
        #[test]
        fn prop_length_and_position(
            prefix in "[0-9a-f]{0,40}",
            test_char in proptest::char::range('!', '~'),
            missing_length in 1usize..64,
        ) {
            let token = TokenForge::build(&prefix, &test_char.to_string(), missing_length).unwrap();
            let prefix_len = prefix.chars().count();
            prop_assert_eq!(token.len(), prefix_len + missing_length);
            prop_assert_eq!(token.char_at(prefix_len), Some(test_char));
            prop_assert!(token.as_str().starts_with(&prefix));
        }

        #[test]
        fn prop_candidates_have_equal_length(
            prefix in "[0-9a-f]{0,40}",
            a in proptest::char::range('0', 'z'),
            b in proptest::char::range('0', 'z'),
            missing_length in 1usize..64,
        ) {
            let ta = TokenForge::build(&prefix, &a.to_string(), missing_length).unwrap();
            let tb = TokenForge::build(&prefix, &b.to_string(), missing_length).unwrap();
            prop_assert_eq!(ta.len(), tb.len());
        }
    }
}
