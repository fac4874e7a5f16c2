// src/session/signatures.rs

//! Mapping of known output text to [`RecoverableSignature`] categories.

use crate::exec::CapturedOutput;
use crate::types::RecoverableSignature;

/// Ordered list of `(substring, signature)` pairs.
///
/// The first entry whose substring occurs in the output wins, so more
/// specific categories should be registered first.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    entries: Vec<(String, RecoverableSignature)>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every non-empty string in `needles` as `signature`.
    pub fn with<I, S>(mut self, signature: RecoverableSignature, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for needle in needles {
            let needle = needle.as_ref();
            if !needle.is_empty() {
                self.entries.push((needle.to_string(), signature));
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Classify a single piece of text.
    pub fn classify(&self, text: &str) -> Option<RecoverableSignature> {
        self.entries
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, signature)| *signature)
    }

    /// Classify a command's output, looking at stderr before stdout.
    pub fn classify_output(&self, output: &CapturedOutput) -> Option<RecoverableSignature> {
        self.classify(&output.stderr)
            .or_else(|| self.classify(&output.stdout))
    }
}
