use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;

use super::oracle::PolicyError;

/// Decides whether a policy field pattern covers a requested value. Used for
/// the object and action fields; subjects are resolved by the oracle.
pub trait PolicyMatcher: Send + Sync {
    fn matches(&self, pattern: &str, value: &str) -> Result<bool, PolicyError>;
}

/// Adapts a plain function or closure into a [`PolicyMatcher`].
pub struct FnMatcher<F>(pub F);

impl<F> PolicyMatcher for FnMatcher<F>
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn matches(&self, pattern: &str, value: &str) -> Result<bool, PolicyError> {
        Ok((self.0)(pattern, value))
    }
}

/// Path-style key matching: `*` matches any run of characters and a
/// `:name` segment matches exactly one path segment, so `/user/:id`
/// covers `/user/42` but not `/user/42/posts`.
#[derive(Default)]
pub struct KeyMatcher {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl KeyMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn regex_for(&self, pattern: &str) -> Result<Regex, PolicyError> {
        if let Some(regex) = self.compiled.read().get(pattern) {
            return Ok(regex.clone());
        }

        let regex = Regex::new(&pattern_to_regex(pattern)).map_err(|e| PolicyError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        self.compiled
            .write()
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl PolicyMatcher for KeyMatcher {
    fn matches(&self, pattern: &str, value: &str) -> Result<bool, PolicyError> {
        if pattern == "*" || pattern == value {
            return Ok(true);
        }

        if !pattern.contains('*') && !pattern.contains(':') {
            return Ok(false);
        }

        Ok(self.regex_for(pattern)?.is_match(value))
    }
}

fn pattern_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");

    for (i, segment) in pattern.split('/').enumerate() {
        if i > 0 {
            out.push('/');
        }

        if segment.len() > 1 && segment.starts_with(':') {
            out.push_str("[^/]+");
            continue;
        }

        let pieces: Vec<String> = segment.split('*').map(regex::escape).collect();
        out.push_str(&pieces.join(".*"));
    }

    out.push('$');
    out
}
