use std::fmt;

use crate::tokenizer::AnchorActive;

/// What `\A` and `\G` are replaced with when they should not match.
/// Escaped by the backslash already in the pattern, it matches the U+FFFF noncharacter.
const INACTIVE_ANCHOR: char = '\u{FFFF}';

/// A regex pattern from a grammar, prepared for the regex engine.
///
/// `\z` is rewritten to something Oniguruma handles the same way as vscode-textmate since
/// lines always end with an added `\n`.
#[derive(Clone, PartialEq, Eq)]
pub struct RegexSource {
    source: String,
    has_anchor: bool,
    has_back_references: bool,
    /// The 4 versions of the pattern, in the [`AnchorActive`] order, only if it has anchors
    anchor_cache: Option<Box<[String; 4]>>,
}

impl RegexSource {
    pub fn new(pattern: &str) -> Self {
        let mut source = String::with_capacity(pattern.len());
        let mut has_anchor = false;
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            if c != '\\' {
                source.push(c);
                continue;
            }
            match chars.next() {
                Some('z') => source.push_str("$(?!\\n)(?<!\\n)"),
                Some(next) => {
                    if next == 'A' || next == 'G' {
                        has_anchor = true;
                    }
                    source.push('\\');
                    source.push(next);
                }
                None => source.push('\\'),
            }
        }

        let has_back_references = has_back_references(&source);
        let anchor_cache = if has_anchor {
            Some(Box::new(build_anchor_cache(&source)))
        } else {
            None
        };

        Self {
            source,
            has_anchor,
            has_back_references,
            anchor_cache,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_anchor(&self) -> bool {
        self.has_anchor
    }

    pub fn has_back_references(&self) -> bool {
        self.has_back_references
    }

    /// The pattern with `\A` and `\G` disabled as needed
    pub fn resolve_anchors(&self, anchor: AnchorActive) -> &str {
        match &self.anchor_cache {
            Some(cache) => &cache[anchor.index()],
            None => &self.source,
        }
    }

    /// Replaces `\1`, `\2`... with the escaped text of the matching capture groups.
    /// Groups that didn't participate in the match are replaced by nothing.
    pub fn resolve_back_references(
        &self,
        line: &str,
        captures: &[Option<(usize, usize)>],
    ) -> String {
        let mut out = String::with_capacity(self.source.len());
        let bytes = self.source.as_bytes();
        let mut last = 0;
        let mut i = 0;

        while i < bytes.len() {
            if bytes[i] == b'\\' {
                let digits = bytes[i + 1..]
                    .iter()
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                if digits > 0 {
                    out.push_str(&self.source[last..i]);
                    let group: usize = self.source[i + 1..i + 1 + digits]
                        .parse()
                        .unwrap_or(usize::MAX);
                    if let Some(Some((start, end))) = captures.get(group)
                        && let Some(text) = line.get(*start..*end)
                    {
                        escape_regex_chars(text, &mut out);
                    }
                    i += 1 + digits;
                    last = i;
                    continue;
                }
            }
            i += 1;
        }
        out.push_str(&self.source[last..]);
        out
    }
}

impl fmt::Debug for RegexSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn has_back_references(source: &str) -> bool {
    let bytes = source.as_bytes();
    bytes
        .windows(2)
        .any(|w| w[0] == b'\\' && w[1].is_ascii_digit())
}

fn build_anchor_cache(source: &str) -> [String; 4] {
    let mut variants: [String; 4] = Default::default();
    let mut chars = source.chars();

    while let Some(c) = chars.next() {
        for v in variants.iter_mut() {
            v.push(c);
        }
        if c != '\\' {
            continue;
        }
        let Some(next) = chars.next() else {
            break;
        };
        for anchor in AnchorActive::ALL {
            let replacement = match next {
                'A' if !anchor.allows_a() => INACTIVE_ANCHOR,
                'G' if !anchor.allows_g() => INACTIVE_ANCHOR,
                _ => next,
            };
            variants[anchor.index()].push(replacement);
        }
    }

    variants
}

/// Escapes the characters that have a meaning in a regex, same set as vscode-textmate
pub(crate) fn escape_regex_chars(text: &str, out: &mut String) {
    for c in text.chars() {
        if matches!(
            c,
            '-' | '\\'
                | '{'
                | '}'
                | '*'
                | '+'
                | '?'
                | '|'
                | '^'
                | '$'
                | '.'
                | ','
                | '['
                | ']'
                | '('
                | ')'
                | '#'
        ) || c.is_whitespace()
        {
            out.push('\\');
        }
        out.push(c);
    }
}
