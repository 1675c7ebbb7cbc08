//! Wildcard permission matching
//!
//! Permission slugs are `resource.action` strings. Granted permissions and
//! configured rules may contain `*`, which matches any run of characters
//! (including none). Every other character is literal.
//!
//! ```text
//! users.read   matches  users.read, users.*, *.read, *, us*rs.re*d
//! users.read   rejects  users.write, products.*, *.write
//! ```
//!
//! Matching is case-sensitive and never normalizes; callers normalize slugs
//! before they are persisted or declared.

use crate::error::ConfigError;
use regex::Regex;

/// The pattern that grants everything
pub const MATCH_ALL: &str = "*";

/// A single compiled wildcard pattern
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
enum PatternKind {
    Any,
    Exact,
    Wildcard(Regex),
}

impl WildcardPattern {
    /// Compile a pattern. Returns `None` for the empty pattern.
    pub fn compile(pattern: &str) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }

        let kind = if pattern == MATCH_ALL {
            PatternKind::Any
        } else if !pattern.contains('*') {
            PatternKind::Exact
        } else {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            // Escaped literals joined by `.*` always form a valid expression
            PatternKind::Wildcard(Regex::new(&format!("^{}$", body)).ok()?)
        };

        Some(Self {
            source: pattern.to_string(),
            kind,
        })
    }

    /// Check whether a concrete slug satisfies this pattern
    pub fn is_match(&self, slug: &str) -> bool {
        match &self.kind {
            PatternKind::Any => true,
            PatternKind::Exact => self.source == slug,
            PatternKind::Wildcard(regex) => regex.is_match(slug),
        }
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Does `slug` satisfy `pattern`?
///
/// An empty pattern never matches.
pub fn matches(slug: &str, pattern: &str) -> bool {
    if pattern == MATCH_ALL {
        return true;
    }
    if !pattern.contains('*') {
        return !pattern.is_empty() && slug == pattern;
    }
    WildcardPattern::compile(pattern).is_some_and(|p| p.is_match(slug))
}

/// True if any required slug is covered by any granted pattern
pub fn has_any<R, G>(required: &[R], granted: &[G]) -> bool
where
    R: AsRef<str>,
    G: AsRef<str>,
{
    required
        .iter()
        .any(|r| granted.iter().any(|g| matches(r.as_ref(), g.as_ref())))
}

/// True if every required slug is covered by at least one granted pattern
pub fn has_all<R, G>(required: &[R], granted: &[G]) -> bool
where
    R: AsRef<str>,
    G: AsRef<str>,
{
    required
        .iter()
        .all(|r| granted.iter().any(|g| matches(r.as_ref(), g.as_ref())))
}

/// The subset of `universe` matched by `pattern`, in universe order
pub fn expand<S: AsRef<str>>(pattern: &str, universe: &[S]) -> Vec<String> {
    universe
        .iter()
        .filter(|slug| matches(slug.as_ref(), pattern))
        .map(|slug| slug.as_ref().to_string())
        .collect()
}

/// Is this a well-formed permission slug?
///
/// Accepts `*`, or exactly two non-empty dot-separated segments made of
/// `[a-z0-9-*]`.
pub fn is_valid_permission_slug(slug: &str) -> bool {
    if slug == MATCH_ALL {
        return true;
    }

    let mut parts = slug.split('.');
    let (Some(resource), Some(action), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    is_valid_segment(resource) && is_valid_segment(action)
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '*')
}

/// Normalize a permission slug: trim, lowercase, whitespace runs → `.`,
/// drop anything outside `[a-z0-9.*-]`.
pub fn normalize_permission_slug(slug: &str) -> String {
    normalize_with(slug, '.', |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '*' | '-')
    })
}

/// Normalize a role slug to kebab-case: trim, lowercase, whitespace runs → `-`,
/// drop anything outside `[a-z0-9-]`.
pub fn normalize_role_slug(slug: &str) -> String {
    normalize_with(slug, '-', |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
    })
}

fn normalize_with(input: &str, separator: char, keep: impl Fn(char) -> bool) -> String {
    let lowered = input.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(separator);
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if keep(c) {
            out.push(c);
        }
    }

    out
}

/// Compiled list of wildcard patterns
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    patterns: Vec<WildcardPattern>,
}

impl PatternMatcher {
    /// Compile a list of configured permission patterns
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            if !is_valid_permission_slug(pattern) {
                return Err(ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: "expected '*' or 'resource.action' with [a-z0-9-*] segments"
                        .to_string(),
                });
            }

            let wildcard =
                WildcardPattern::compile(pattern).ok_or_else(|| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: "pattern is empty".to_string(),
                })?;
            compiled.push(wildcard);
        }

        Ok(Self { patterns: compiled })
    }

    /// Create an empty pattern matcher (matches nothing)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if a slug matches any pattern
    pub fn matches(&self, slug: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(slug))
    }

    /// Check if a slug matches any pattern, returning the matching pattern
    pub fn find_match(&self, slug: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| p.is_match(slug))
            .map(WildcardPattern::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("users.read", "users.read", true)]
    #[case("users.read", "users.write", false)]
    #[case("users.read", "users.*", true)]
    #[case("products.read", "users.*", false)]
    #[case("users.read", "*.read", true)]
    #[case("users.write", "*.read", false)]
    #[case("users.read", "*", true)]
    #[case("users.read", "us*rs.re*d", true)]
    #[case("users.read", "u*.*", true)]
    #[case("users.read", "*s.read*", true)]
    #[case("users.read", "users", false)]
    #[case("users.read", "sers.*", false)]
    #[case("users.read", "", false)]
    fn test_matches(#[case] slug: &str, #[case] pattern: &str, #[case] expected: bool) {
        assert_eq!(matches(slug, pattern), expected, "{} vs {}", slug, pattern);
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        // '.' must not act as "any character"
        assert!(!matches("usersXread", "users.*"));
        assert!(!matches("usersXread", "*s.read"));
        assert!(matches("a+b.read", "a+b.*"));
        assert!(!matches("aab.read", "a+b.*"));
        assert!(matches("x(1).y", "x(*).y"));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(!matches("Users.read", "users.*"));
        assert!(!matches("users.read", "USERS.READ"));
    }

    #[test]
    fn test_has_any_and_has_all() {
        let granted = ["users.*", "products.read"];
        assert!(has_any(&["users.read", "orders.read"], &granted));
        assert!(!has_any(&["orders.read"], &granted));

        assert!(has_all(&["users.read", "users.delete", "products.read"], &granted));
        assert!(!has_all(&["users.read", "products.delete"], &granted));

        let none: [&str; 0] = [];
        assert!(has_all(&none, &granted));
        assert!(!has_any(&none, &granted));
    }

    #[test]
    fn test_expand() {
        let universe = ["users.read", "users.create", "products.read"];
        assert_eq!(
            expand("users.*", &universe),
            vec!["users.read".to_string(), "users.create".to_string()]
        );
        assert_eq!(expand("*", &universe).len(), 3);
        assert!(expand("orders.*", &universe).is_empty());
    }

    #[rstest]
    #[case("*", true)]
    #[case("users.read", true)]
    #[case("users.*", true)]
    #[case("*.read", true)]
    #[case("user-profiles.read-all", true)]
    #[case("v2.read", true)]
    #[case("users", false)]
    #[case("users.read.all", false)]
    #[case(".read", false)]
    #[case("users.", false)]
    #[case("Users.read", false)]
    #[case("users.re ad", false)]
    #[case("", false)]
    fn test_is_valid_permission_slug(#[case] slug: &str, #[case] expected: bool) {
        assert_eq!(is_valid_permission_slug(slug), expected, "{}", slug);
    }

    #[test]
    fn test_normalize_permission_slug() {
        assert_eq!(normalize_permission_slug("  Users.Read "), "users.read");
        assert_eq!(normalize_permission_slug("users   read"), "users.read");
        assert_eq!(normalize_permission_slug("users.*"), "users.*");
        assert_eq!(normalize_permission_slug("Users_Admin.Read!"), "usersadmin.read");
        assert_eq!(normalize_permission_slug("user-profiles.update"), "user-profiles.update");
    }

    #[test]
    fn test_normalize_role_slug() {
        assert_eq!(normalize_role_slug(" Content Editor "), "content-editor");
        assert_eq!(normalize_role_slug("Super-Admin"), "super-admin");
        assert_eq!(normalize_role_slug("admin*"), "admin");
        assert_eq!(normalize_role_slug("a  b\tc"), "a-b-c");
    }

    #[test]
    fn test_pattern_matcher() {
        let matcher =
            PatternMatcher::new(&["*.read".to_string(), "users.*".to_string()]).unwrap();

        assert!(matcher.matches("products.read"));
        assert!(matcher.matches("users.delete"));
        assert!(!matcher.matches("products.delete"));
        assert_eq!(matcher.find_match("users.read"), Some("*.read"));
        assert_eq!(matcher.find_match("users.delete"), Some("users.*"));
        assert_eq!(matcher.len(), 2);
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = PatternMatcher::empty();
        assert!(!matcher.matches("users.read"));
        assert!(matcher.is_empty());
    }

    #[test]
    fn test_invalid_pattern() {
        let result = PatternMatcher::new(&["users.read.all".to_string()]);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));

        let result = PatternMatcher::new(&[String::new()]);
        assert!(result.is_err());
    }
}
