// src/exec/patterns.rs

use regex::Regex;

use crate::errors::{DevctlError, Result};

/// Caller-supplied stderr patterns meaning "no target will ever show up".
///
/// The runner gives up on a command as soon as its stderr matches one of
/// these, instead of waiting out the timeout.
#[derive(Debug, Clone, Default)]
pub struct NoTargetPatterns {
    patterns: Vec<Regex>,
}

impl NoTargetPatterns {
    /// Never matches.
    pub fn none() -> Self {
        Self::default()
    }

    /// Compile each entry as a regular expression.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(p).map_err(|e| {
                    DevctlError::ConfigError(format!("invalid no-target pattern {p:?}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Match each entry as a plain substring.
    pub fn literal<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = substrings
            .into_iter()
            .filter_map(|s| Regex::new(&regex::escape(s.as_ref())).ok())
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// The first pattern found in `text`, if any.
    pub fn find(&self, text: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(text))
            .map(|re| re.as_str())
    }
}
