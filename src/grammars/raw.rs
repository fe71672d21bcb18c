use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::error::TokenizerResult;

/// A rule of a TextMate grammar, as written in the grammar file.
///
/// All the rule kinds share the same shape, what the rule does is decided when compiling it:
/// - `match` set: a single regex match
/// - `begin` and `while` set: the region continues as long as `while` matches on each line
/// - `begin` set: the region lasts until `end` matches
/// - anything else: only includes other patterns
///
/// # Examples
/// ```json
/// {
///   "name": "string.quoted.double.js",
///   "begin": "\"",
///   "end": "\"",
///   "beginCaptures": {
///     "0": { "name": "punctuation.definition.string.begin.js" }
///   },
///   "patterns": [
///     { "match": "\\\\.", "name": "constant.character.escape.js" }
///   ]
/// }
/// ```
///
/// ```json
/// { "include": "source.js#expressions" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct RawRule {
    /// Reference to other patterns
    /// - "#name" - repository entry, looked up from the innermost repository
    /// - "source.lang" - another grammar's root patterns
    /// - "source.lang#name" - repository entry in another grammar
    /// - "$self" - the current grammar's root patterns
    /// - "$base" - the root patterns of the grammar being tokenized
    pub include: Option<String>,
    /// Scope name for the whole match or region, can refer to captures like `$1`
    pub name: Option<String>,
    /// Scope name for the content between begin and end
    pub content_name: Option<String>,
    #[serde(rename(deserialize = "match"))]
    pub match_: Option<String>,
    /// Capture groups, used by begin/end/while when their own captures are not set
    pub captures: Option<Captures>,
    pub begin: Option<String>,
    pub begin_captures: Option<Captures>,
    /// Can reference captures of `begin` with `\1`, `\2` etc
    pub end: Option<String>,
    pub end_captures: Option<Captures>,
    #[serde(rename(deserialize = "while"))]
    pub while_: Option<String>,
    pub while_captures: Option<Captures>,
    pub patterns: Option<Vec<RawRule>>,
    #[serde(deserialize_with = "deserialize_repository")]
    pub repository: Option<Repository>,
    /// Try the nested patterns before `end`
    #[serde(deserialize_with = "deserialize_bool_or_number")]
    pub apply_end_pattern_last: bool,
}

/// Capture group number (as a string) to rule
pub type Captures = BTreeMap<String, RawRule>;

/// Named rules that can be included with `#name`
pub type Repository = HashMap<String, RawRule>;

/// Some grammars use a bare list of patterns as repository entry.
#[derive(Deserialize)]
#[serde(untagged)]
enum RepositoryEntry {
    Patterns(Vec<RawRule>),
    Rule(Box<RawRule>),
}

fn deserialize_repository<'de, D>(deserializer: D) -> Result<Option<Repository>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<HashMap<String, RepositoryEntry>> = Option::deserialize(deserializer)?;
    Ok(entries.map(|entries| {
        entries
            .into_iter()
            .map(|(name, entry)| {
                let rule = match entry {
                    RepositoryEntry::Patterns(patterns) => RawRule {
                        patterns: Some(patterns),
                        ..Default::default()
                    },
                    RepositoryEntry::Rule(rule) => *rule,
                };
                (name, rule)
            })
            .collect()
    }))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrNumber {
    Bool(bool),
    Number(f64),
}

/// `applyEndPatternLast` is written as `1` in a lot of grammars
fn deserialize_bool_or_number<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<BoolOrNumber> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(BoolOrNumber::Bool(b)) => b,
        Some(BoolOrNumber::Number(n)) => n != 0.0,
        None => false,
    })
}

/// Top-level structure representing a complete TextMate grammar
///
/// # Examples
/// ```json
/// {
///   "name": "JavaScript",
///   "scopeName": "source.js",
///   "fileTypes": ["js", "jsx", "mjs"],
///   "patterns": [
///     { "include": "#statements" }
///   ],
///   "repository": {
///     "statements": {
///       "patterns": [
///         { "include": "#keywords" }
///       ]
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct RawGrammar {
    /// Unique identifier for this grammar's scope
    /// Example: "source.js", "text.html.markdown", "source.rust"
    pub scope_name: String,
    /// Human-readable name of the language
    pub name: Option<String>,
    /// Root patterns
    pub patterns: Vec<RawRule>,
    #[serde(deserialize_with = "deserialize_repository")]
    pub repository: Option<Repository>,
    /// Selector to rule, active wherever the selector matches the current scopes.
    /// Kept in declaration order, which decides between injections of the same priority.
    pub injections: Option<IndexMap<String, RawRule>>,
    /// When this grammar is injected into another one, where its patterns are active.
    /// Example: "L:source.js -comment"
    pub injection_selector: Option<String>,
    pub file_types: Vec<String>,
    pub first_line_match: Option<String>,
}

impl RawGrammar {
    pub fn from_json(input: &str) -> TokenizerResult<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_grammar() {
        let grammar = RawGrammar::from_json(
            r##"{
              "scopeName": "source.test",
              "name": "Test",
              "fileTypes": ["test"],
              "patterns": [{ "include": "#string" }, { "match": "\\d+", "name": "constant.numeric" }],
              "repository": {
                "string": {
                  "begin": "\"",
                  "end": "\"",
                  "applyEndPatternLast": 1,
                  "beginCaptures": { "0": { "name": "punctuation" } }
                },
                "keywords": [{ "match": "if", "name": "keyword" }]
              },
              "injections": { "L:comment": { "patterns": [{ "match": "TODO" }] } }
            }"##,
        )
        .unwrap();

        assert_eq!(grammar.scope_name, "source.test");
        assert_eq!(grammar.patterns.len(), 2);
        assert_eq!(grammar.patterns[0].include.as_deref(), Some("#string"));
        assert_eq!(grammar.patterns[1].match_.as_deref(), Some("\\d+"));

        let repository = grammar.repository.as_ref().unwrap();
        let string = &repository["string"];
        assert!(string.apply_end_pattern_last);
        assert_eq!(string.end.as_deref(), Some("\""));
        assert_eq!(
            string.begin_captures.as_ref().unwrap()["0"].name.as_deref(),
            Some("punctuation")
        );
        // bare lists become a rule with only patterns
        let keywords = &repository["keywords"];
        assert_eq!(keywords.patterns.as_ref().unwrap().len(), 1);
        assert!(keywords.match_.is_none());

        assert!(grammar.injections.unwrap().contains_key("L:comment"));
    }

    #[test]
    fn apply_end_pattern_last_accepts_bools_and_numbers() {
        for (input, expected) in [
            (r#"{"applyEndPatternLast": true}"#, true),
            (r#"{"applyEndPatternLast": 0}"#, false),
            (r#"{"applyEndPatternLast": 1}"#, true),
            (r#"{}"#, false),
        ] {
            let rule: RawRule = serde_json::from_str(input).unwrap();
            assert_eq!(rule.apply_end_pattern_last, expected, "{input}");
        }
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(RawGrammar::from_json("{ nope").is_err());
    }
}
