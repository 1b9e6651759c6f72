//! Exclusion patterns
//!
//! Globs are translated to regular expressions once per module: `**` matches
//! any run of characters including separators, `*` any run of non-separator
//! characters and `?` a single non-separator character. Paths are normalized
//! to forward slashes before matching, and a pattern matches when it occurs
//! anywhere in the full path.

use regex::Regex;
use std::path::Path;

use crate::error::ConfigError;

/// One compiled exclusion glob
#[derive(Debug, Clone)]
pub struct ExclusionPattern {
    source: String,
    regex: Regex,
}

impl ExclusionPattern {
    /// Compile a glob
    pub fn compile(glob: &str, case_insensitive: bool) -> Result<Self, ConfigError> {
        let translated = glob_to_regex(glob, case_insensitive);
        let regex = Regex::new(&translated).map_err(|source| ConfigError::Pattern {
            pattern: glob.to_string(),
            source,
        })?;
        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    /// The glob as given
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, normalized_path: &str) -> bool {
        self.regex.is_match(normalized_path)
    }
}

/// All exclusion patterns of one module
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<ExclusionPattern>,
}

impl PatternSet {
    /// Compile every glob, failing on the first invalid one
    pub fn compile<I, S>(globs: I, case_insensitive: bool) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = globs
            .into_iter()
            .filter(|glob| !glob.as_ref().trim().is_empty())
            .map(|glob| ExclusionPattern::compile(glob.as_ref(), case_insensitive))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// First pattern matching the path, if any
    pub fn matching(&self, path: &Path) -> Option<&ExclusionPattern> {
        let normalized = normalize_path(path);
        self.patterns.iter().find(|p| p.is_match(&normalized))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.matching(path).is_some()
    }
}

/// Forward-slash form of a path
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn glob_to_regex(glob: &str, case_insensitive: bool) -> String {
    let glob = glob.trim().trim_matches('"').replace('\\', "/");

    let mut out = String::with_capacity(glob.len() * 2);
    if case_insensitive {
        out.push_str("(?i)");
    }

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out
}
