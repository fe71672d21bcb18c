use std::sync::Arc;

use crate::error::TokenizerResult;
use crate::matcher::{Matcher, create_matchers};
use crate::scope::name_matcher;
use crate::tokenizer::metadata::{self, StandardTokenType};
use crate::tokenizer::scopes::AttributedScopeStack;
use crate::tokenizer::stack::StateStack;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Byte offset of the start of the token in the line, inclusive
    pub start: usize,
    /// Byte offset of the end of the token in the line, exclusive
    pub end: usize,
    /// Hierarchical scope names, ordered from outermost to innermost
    /// (e.g., source.js -> string.quoted.double -> punctuation.definition.string).
    pub scopes: Vec<String>,
}

/// Forces a token type on the binary tokens whose scopes match the selector
#[derive(Debug, Clone)]
pub struct TokenTypeMatcher {
    pub matcher: Matcher,
    pub token_type: StandardTokenType,
}

impl TokenTypeMatcher {
    pub fn from_selector(
        selector: &str,
        token_type: StandardTokenType,
    ) -> TokenizerResult<Vec<Self>> {
        Ok(create_matchers(selector)?
            .into_iter()
            .map(|m| Self {
                matcher: m.matcher,
                token_type,
            })
            .collect())
    }
}

/// Decides which tokens can contain brackets that should be balanced.
/// `*` as a balanced selector allows everything not excluded by an unbalanced selector.
#[derive(Debug, Clone, Default)]
pub struct BalancedBracketSelectors {
    balanced: Vec<Matcher>,
    unbalanced: Vec<Matcher>,
    allow_any: bool,
}

impl BalancedBracketSelectors {
    pub fn new(balanced: &[String], unbalanced: &[String]) -> TokenizerResult<Self> {
        let mut out = Self::default();
        for selector in balanced {
            if selector == "*" {
                out.allow_any = true;
                continue;
            }
            out.balanced
                .extend(create_matchers(selector)?.into_iter().map(|m| m.matcher));
        }
        for selector in unbalanced {
            out.unbalanced
                .extend(create_matchers(selector)?.into_iter().map(|m| m.matcher));
        }
        Ok(out)
    }

    pub fn matches_always(&self) -> bool {
        self.allow_any && self.unbalanced.is_empty()
    }

    pub fn matches_never(&self) -> bool {
        self.balanced.is_empty() && !self.allow_any
    }

    pub fn matches(&self, scopes: &[String]) -> bool {
        if self
            .unbalanced
            .iter()
            .any(|m| m.matches(scopes, &name_matcher::<String>))
        {
            return false;
        }
        if self
            .balanced
            .iter()
            .any(|m| m.matches(scopes, &name_matcher::<String>))
        {
            return true;
        }
        self.allow_any
    }
}

/// Collects the tokens of a line, making sure they are contiguous and never empty.
pub(crate) struct LineTokens<'a> {
    emit_binary_tokens: bool,
    tokens: Vec<Token>,
    /// (start, metadata) pairs
    binary_tokens: Vec<u32>,
    /// One flag per binary token, only filled when bracket selectors are configured
    brackets: Vec<bool>,
    /// Position up to which tokens have been generated
    last_end_pos: usize,
    token_type_matchers: &'a [TokenTypeMatcher],
    balanced_bracket_selectors: Option<&'a BalancedBracketSelectors>,
    debug: bool,
}

impl<'a> LineTokens<'a> {
    pub fn new(
        emit_binary_tokens: bool,
        token_type_matchers: &'a [TokenTypeMatcher],
        balanced_bracket_selectors: Option<&'a BalancedBracketSelectors>,
        debug: bool,
    ) -> Self {
        Self {
            emit_binary_tokens,
            tokens: Vec::new(),
            binary_tokens: Vec::new(),
            brackets: Vec::new(),
            last_end_pos: 0,
            token_type_matchers,
            balanced_bracket_selectors,
            debug,
        }
    }

    pub fn produce(&mut self, stack: &StateStack, end_pos: usize) {
        self.produce_from_scopes(stack.content_scopes(), end_pos);
    }

    pub fn produce_from_scopes(
        &mut self,
        scopes: Option<&Arc<AttributedScopeStack>>,
        end_pos: usize,
    ) {
        // Skip empty tokens (can happen with zero-width matches)
        if self.last_end_pos >= end_pos {
            return;
        }

        if self.debug {
            log::trace!(
                "[produce] [{}..{end_pos}] {}",
                self.last_end_pos,
                scopes.map(|s| s.scope_path().to_string()).unwrap_or_default()
            );
        }

        if self.emit_binary_tokens {
            self.produce_binary(scopes, end_pos);
            return;
        }

        self.tokens.push(Token {
            start: self.last_end_pos,
            end: end_pos,
            scopes: scopes.map(|s| s.scope_names()).unwrap_or_default(),
        });
        self.last_end_pos = end_pos;
    }

    fn produce_binary(&mut self, scopes: Option<&Arc<AttributedScopeStack>>, end_pos: usize) {
        let mut token_metadata = scopes.map_or(0, |s| s.token_attributes());
        let brackets = self.balanced_bracket_selectors;
        let mut has_balanced_brackets = brackets.is_some_and(|b| b.matches_always());

        if !self.token_type_matchers.is_empty()
            || brackets.is_some_and(|b| !b.matches_always() && !b.matches_never())
        {
            let names = scopes.map(|s| s.scope_names()).unwrap_or_default();
            for token_type in self.token_type_matchers {
                if token_type
                    .matcher
                    .matches(names.as_slice(), &name_matcher::<String>)
                {
                    token_metadata = metadata::set(
                        token_metadata,
                        0,
                        Some(token_type.token_type),
                        None,
                        0,
                        0,
                    );
                }
            }
            if let Some(brackets) = brackets {
                has_balanced_brackets = brackets.matches(&names);
            }
        }

        let same_brackets = brackets.is_none() || self.brackets.last() == Some(&has_balanced_brackets);
        if self.binary_tokens.last() == Some(&token_metadata) && same_brackets {
            // Same as the previous token, extend it
            self.last_end_pos = end_pos;
            return;
        }

        self.binary_tokens.push(self.last_end_pos as u32);
        self.binary_tokens.push(token_metadata);
        if brackets.is_some() {
            self.brackets.push(has_balanced_brackets);
        }
        self.last_end_pos = end_pos;
    }

    /// `line_len` includes the `\n` added for matching
    pub fn into_tokens(mut self, stack: &StateStack, line_len: usize) -> Vec<Token> {
        // Pop the token for the added newline if there is one
        if let Some(token) = self.tokens.last()
            && token.start == line_len - 1
        {
            self.tokens.pop();
        }

        if self.tokens.is_empty() {
            self.last_end_pos = 0;
            self.produce(stack, line_len);
        }

        // Don't include the trailing newline
        if let Some(token) = self.tokens.last_mut()
            && token.end >= line_len
        {
            token.end = line_len - 1;
        }

        self.tokens
    }

    /// `line_len` includes the `\n` added for matching
    pub fn into_binary_tokens(
        mut self,
        stack: &StateStack,
        line_len: usize,
    ) -> (Vec<u32>, Option<Vec<bool>>) {
        let len = self.binary_tokens.len();
        if len >= 2 && self.binary_tokens[len - 2] as usize == line_len - 1 {
            self.binary_tokens.truncate(len - 2);
            self.brackets.pop();
        }

        if self.binary_tokens.is_empty() {
            self.last_end_pos = 0;
            self.produce(stack, line_len);
        }

        let brackets = self.balanced_bracket_selectors.map(|_| self.brackets);
        (self.binary_tokens, brackets)
    }
}
