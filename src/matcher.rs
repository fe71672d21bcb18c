//! Scope selector expressions, used by injections, token type overrides and bracket selectors.
//!
//! Syntax, from lowest to highest precedence:
//! - `,` separates top-level alternatives, each of them returned as its own matcher
//! - `|` (or `,`) is alternation inside parentheses
//! - a space separated list of identifiers needs to match as an ordered subsequence
//! - `-` negates the following operand
//! - `(...)` groups
//!
//! A top-level alternative can be prefixed by `L:` or `R:` to set its priority.

use std::sync::LazyLock;

use onig::Regex;

use crate::error::{Error, TokenizerResult};

/// Regex used to split selectors into tokens, same as vscode-textmate
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([LR]:|[\w.:][\w.:\-]*|[,|\-()])").expect("Invalid selector regex")
});

/// Priority of a top-level selector alternative.
/// Sorting by priority puts `L:` first and `R:` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// `L:` prefix, wins ties against regular patterns
    Left,
    #[default]
    Normal,
    /// `R:` prefix
    Right,
}

impl Priority {
    pub fn value(self) -> i8 {
        match self {
            Priority::Left => -1,
            Priority::Normal => 0,
            Priority::Right => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Identifiers that must all match, in order.
    /// Matching is delegated to the name matcher given at evaluation time.
    Identifiers(Vec<String>),
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    /// Evaluates the expression against `input` using `name_matcher` for identifier lists.
    pub fn matches<T, F>(&self, input: &T, name_matcher: &F) -> bool
    where
        T: ?Sized,
        F: Fn(&[String], &T) -> bool,
    {
        match self {
            Matcher::Identifiers(ids) => name_matcher(ids, input),
            Matcher::And(matchers) => matchers.iter().all(|m| m.matches(input, name_matcher)),
            Matcher::Or(matchers) => matchers.iter().any(|m| m.matches(input, name_matcher)),
            Matcher::Not(m) => !m.matches(input, name_matcher),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatcherWithPriority {
    pub matcher: Matcher,
    pub priority: Priority,
}

fn is_identifier(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == ':')
}

struct Parser<'s> {
    selector: &'s str,
    tokens: Vec<&'s str>,
    position: usize,
}

impl<'s> Parser<'s> {
    fn new(selector: &'s str) -> Self {
        let tokens = TOKEN_REGEX
            .find_iter(selector)
            .map(|(start, end)| &selector[start..end])
            .collect();
        Self {
            selector,
            tokens,
            position: 0,
        }
    }

    fn peek(&self) -> Option<&'s str> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidSelector {
            selector: self.selector.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_operand(&mut self) -> TokenizerResult<Option<Matcher>> {
        match self.peek() {
            Some("-") => {
                self.advance();
                match self.parse_operand()? {
                    Some(m) => Ok(Some(Matcher::Not(Box::new(m)))),
                    None => Err(self.error("`-` is not followed by an operand")),
                }
            }
            Some("(") => {
                self.advance();
                let mut alternatives = self.parse_inner_expression()?;
                if self.peek() != Some(")") {
                    return Err(self.error("unclosed parenthesis"));
                }
                self.advance();
                match alternatives.len() {
                    0 => Err(self.error("empty group")),
                    1 => Ok(alternatives.pop()),
                    _ => Ok(Some(Matcher::Or(alternatives))),
                }
            }
            Some(token) if is_identifier(token) => {
                let mut identifiers = Vec::new();
                while let Some(token) = self.peek()
                    && is_identifier(token)
                {
                    identifiers.push(token.to_string());
                    self.advance();
                }
                Ok(Some(Matcher::Identifiers(identifiers)))
            }
            _ => Ok(None),
        }
    }

    /// Returns `None` if there was no operand at all
    fn parse_conjunction(&mut self) -> TokenizerResult<Option<Matcher>> {
        let mut matchers = Vec::new();
        while let Some(m) = self.parse_operand()? {
            matchers.push(m);
        }

        Ok(match matchers.len() {
            0 => None,
            1 => matchers.pop(),
            _ => Some(Matcher::And(matchers)),
        })
    }

    fn parse_inner_expression(&mut self) -> TokenizerResult<Vec<Matcher>> {
        let mut alternatives = Vec::new();
        loop {
            if let Some(m) = self.parse_conjunction()? {
                alternatives.push(m);
            }
            if matches!(self.peek(), Some("|" | ",")) {
                while matches!(self.peek(), Some("|" | ",")) {
                    self.advance();
                }
            } else {
                break;
            }
        }
        Ok(alternatives)
    }
}

/// Compiles a selector into one matcher per top-level alternative.
pub fn create_matchers(selector: &str) -> TokenizerResult<Vec<MatcherWithPriority>> {
    let mut parser = Parser::new(selector);
    let mut out = Vec::new();

    while let Some(token) = parser.peek() {
        let priority = match token {
            "L:" => Priority::Left,
            "R:" => Priority::Right,
            _ => Priority::Normal,
        };
        if priority != Priority::Normal {
            parser.advance();
        }

        match parser.parse_conjunction()? {
            Some(matcher) => out.push(MatcherWithPriority { matcher, priority }),
            None if priority != Priority::Normal => {
                return Err(parser.error("priority prefix is not followed by a selector"));
            }
            None => (),
        }

        match parser.peek() {
            Some("," | "|") => parser.advance(),
            Some(token) => return Err(parser.error(format!("unexpected `{token}`"))),
            None => break,
        }
    }

    Ok(out)
}
