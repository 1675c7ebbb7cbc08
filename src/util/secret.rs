//! Redacted secret values
//!
//! Bearer tokens are read from configuration and compared on every request.
//! They must never reach a log line or a `Debug` dump of the config.

use serde::Deserialize;
use std::fmt;

/// A string that prints as `[REDACTED]`
///
/// ```ignore
/// let token = SecretString::new("s3cret");
/// assert_eq!(format!("{:?}", token), "[REDACTED]");
/// assert!(token.matches("s3cret"));
/// ```
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The raw value. Only call this where the value itself is needed.
    #[inline]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compare against a presented credential without short-circuiting on
    /// the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_output() {
        let secret = SecretString::new("my-secret-token");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn test_matches() {
        let secret = SecretString::new("abc123");
        assert!(secret.matches("abc123"));
        assert!(!secret.matches("abc124"));
        assert!(!secret.matches("abc"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_deserialize() {
        let secret: SecretString = serde_json::from_str(r#""test-token""#).unwrap();
        assert_eq!(secret.expose_secret(), "test-token");
        assert!(!secret.is_empty());
    }
}
