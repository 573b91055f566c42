//! Route pattern compilation.
//!
//! Compiles `/users/:id`-style patterns into a matcher that either tests a
//! full path (exact, method-style routes) or a path prefix (`use`-style
//! middleware), extracting named parameters in declaration order.

use crate::Error;
use regex::{Regex, RegexBuilder};

/// Options controlling how a pattern is compiled.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Case-sensitive matching (`case sensitive routing` setting).
    pub sensitive: bool,
    /// Trailing-slash strictness (`strict routing` setting).
    pub strict: bool,
    /// Whether the match must consume the whole path. `false` gives
    /// prefix-match semantics.
    pub end: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            sensitive: false,
            strict: false,
            end: true,
        }
    }
}

/// A successful match: the consumed prefix (or whole path) plus the raw
/// capture values, positionally aligned with [`PathMatcher::keys`].
#[derive(Debug, Clone)]
pub struct PathMatch {
    pub matched: String,
    pub captures: Vec<String>,
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    pattern: String,
    regex: Regex,
    keys: Vec<String>,
    end: bool,
}

impl PathMatcher {
    pub fn compile(pattern: &str, opts: MatchOptions) -> Result<Self, Error> {
        if !pattern.starts_with('/') {
            return Err(Error::InvalidPattern(pattern.to_string()));
        }

        let mut keys = Vec::new();
        let mut source = String::from("^");

        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(Error::InvalidPattern(pattern.to_string()));
                }
                keys.push(name.to_string());
                source.push_str("/([^/]+)");
            } else {
                source.push('/');
                source.push_str(&regex::escape(segment));
            }
        }

        if opts.end {
            if !opts.strict {
                source.push_str("/?");
            }
            source.push('$');
        }
        // Prefix mode carries no trailing constraints in the regex itself;
        // the segment boundary is verified in `matches`.

        let regex = RegexBuilder::new(&source)
            .case_insensitive(!opts.sensitive)
            .build()
            .map_err(|_| Error::InvalidPattern(pattern.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            keys,
            end: opts.end,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Named parameters in declaration order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Test `path`, returning the consumed prefix and captures on success.
    ///
    /// In prefix mode the match must end on a segment boundary, so the
    /// consumed text is always a true prefix of `path`.
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let caps = self.regex.captures(path)?;
        let whole = caps.get(0)?;

        if !self.end {
            let rest = &path[whole.end()..];
            if !(rest.is_empty() || rest.starts_with('/')) {
                return None;
            }
        }

        Some(PathMatch {
            matched: whole.as_str().to_string(),
            captures: caps
                .iter()
                .skip(1)
                .map(|c| c.map(|c| c.as_str().to_string()).unwrap_or_default())
                .collect(),
        })
    }
}
