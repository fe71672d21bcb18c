//! The regex engine used by the tokenizer, behind a trait so it can be swapped.
//!
//! The default is Oniguruma, the engine TextMate grammars are written for.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use onig::{RegSet, RegexOptions, SearchOptions};

use crate::error::{Error, TokenizerResult};

/// The text being scanned, a line with its trailing `\n`.
#[derive(Debug, Clone, Copy)]
pub struct Haystack<'a> {
    text: &'a str,
}

impl<'a> Haystack<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }
}

/// The result of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    /// Index of the pattern that matched in the list given to the scanner
    pub index: usize,
    /// Byte offsets of each capture group, the first one being the whole match.
    /// Offsets are relative to the start of the haystack.
    pub captures: Vec<Option<(usize, usize)>>,
}

impl ScanMatch {
    pub fn start(&self) -> usize {
        self.captures
            .first()
            .and_then(|c| c.map(|(start, _)| start))
            .unwrap_or(0)
    }

    pub fn end(&self) -> usize {
        self.captures
            .first()
            .and_then(|c| c.map(|(_, end)| end))
            .unwrap_or(0)
    }
}

/// A compiled list of patterns.
pub trait Scanner: Send + Sync + fmt::Debug {
    /// Finds the pattern matching the earliest from `start`.
    /// When several patterns match at the same position, the first one in the list wins.
    fn find_next_match(&self, haystack: &Haystack, start: usize) -> Option<ScanMatch>;
}

/// Creates scanners. A grammar keeps its engine for its whole lifetime.
pub trait RegexEngine: Send + Sync + fmt::Debug {
    fn create_scanner(&self, patterns: &[&str]) -> TokenizerResult<Box<dyn Scanner>>;

    fn create_haystack<'a>(&self, text: &'a str) -> Haystack<'a> {
        Haystack::new(text)
    }
}

/// Oniguruma, through `RegSet` so a list of patterns is searched in one call.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnigEngine;

impl RegexEngine for OnigEngine {
    fn create_scanner(&self, patterns: &[&str]) -> TokenizerResult<Box<dyn Scanner>> {
        if patterns.is_empty() {
            return Ok(Box::new(OnigScanner {
                patterns: Vec::new(),
                regset: None,
            }));
        }

        let regset = RegSet::with_options(patterns, RegexOptions::REGEX_OPTION_CAPTURE_GROUP)
            .map_err(|e| {
                // Find out which pattern is invalid for the error message
                for pattern in patterns {
                    if let Err(err) = onig::Regex::new(pattern) {
                        return Error::Regex {
                            pattern: pattern.to_string(),
                            message: err.to_string(),
                        };
                    }
                }
                Error::Regex {
                    pattern: patterns.join("|"),
                    message: e.to_string(),
                }
            })?;

        Ok(Box::new(OnigScanner {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            regset: Some(Mutex::new(regset)),
        }))
    }
}

/// A `RegSet` keeps match regions internally so searches on the same set are serialized.
struct OnigScanner {
    patterns: Vec<String>,
    regset: Option<Mutex<RegSet>>,
}

impl Scanner for OnigScanner {
    fn find_next_match(&self, haystack: &Haystack, start: usize) -> Option<ScanMatch> {
        let regset = self.regset.as_ref()?;
        let text = haystack.text();
        if start > text.len() {
            return None;
        }
        let regset = regset.lock().unwrap_or_else(PoisonError::into_inner);

        // We need to specify start/text.len() because some regex might do lookbehind
        let (index, captures) = regset.captures_with_options(
            text,
            start,
            text.len(),
            onig::RegSetLead::Position,
            SearchOptions::SEARCH_OPTION_NONE,
        )?;

        Some(ScanMatch {
            index,
            captures: (0..captures.len()).map(|i| captures.pos(i)).collect(),
        })
    }
}

impl fmt::Debug for OnigScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OnigScanner({} patterns)", self.patterns.len())?;
        for (i, pattern) in self.patterns.iter().enumerate() {
            write!(f, "\n  {i}: {pattern}")?;
        }
        Ok(())
    }
}
