//! Opaque auth token.

use std::fmt;

use super::ValidationError;

/// Short-lived auth token ("nonce") presented on every realtime request.
///
/// Tokens are only shape-checked: non-empty, within a bounded length window
/// and free of whitespace and control characters. `Debug` and `Display`
/// never print the full value; use [`Token::expose`] when building a request.
///
/// ```
/// use tidings_core::types::Token;
///
/// let token = Token::new("a1b2c3d4e5").unwrap();
/// assert_eq!(token.expose(), "a1b2c3d4e5");
/// assert_eq!(token.to_string(), "a1b2****");
/// assert!(Token::new("short").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Shortest accepted token.
    pub const MIN_LEN: usize = 8;
    /// Longest accepted token.
    pub const MAX_LEN: usize = 256;

    /// Creates a token after the shape check.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        Self::check_shape(&value)?;
        Ok(Self(value))
    }

    /// Checks a candidate value without constructing a token.
    pub fn check_shape(value: &str) -> Result<(), ValidationError> {
        if value.is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        let len = value.chars().count();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(ValidationError::TokenLength {
                len,
                min: Self::MIN_LEN,
                max: Self::MAX_LEN,
            });
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::TokenCharacters);
        }
        Ok(())
    }

    /// Returns true if the value would be accepted as a token.
    #[must_use]
    pub fn is_valid_shape(value: &str) -> bool {
        Self::check_shape(value).is_ok()
    }

    /// Returns the raw token for use in a request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn masked(&self) -> String {
        let visible: String = self.0.chars().take(4).collect();
        format!("{visible}****")
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Token").field(&self.masked()).finish()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl TryFrom<String> for Token {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_window() {
        assert!(Token::new("a".repeat(Token::MIN_LEN)).is_ok());
        assert!(Token::new("a".repeat(Token::MAX_LEN)).is_ok());
        assert!(matches!(
            Token::new("a".repeat(Token::MIN_LEN - 1)),
            Err(ValidationError::TokenLength { len: 7, .. })
        ));
        assert!(Token::new("a".repeat(Token::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert_eq!(Token::new(""), Err(ValidationError::EmptyToken));
        assert_eq!(
            Token::new("abcd efgh"),
            Err(ValidationError::TokenCharacters)
        );
        assert_eq!(
            Token::new("abcdefgh\n"),
            Err(ValidationError::TokenCharacters)
        );
    }

    #[test]
    fn test_debug_is_masked() {
        let token = Token::new("secretnonce123").unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("secretnonce123"));
        assert!(debug.contains("secr****"));
    }
}
