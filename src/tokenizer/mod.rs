//! This file replicates the line tokenization of <https://github.com/microsoft/vscode-textmate>

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::TokenizerResult;
use crate::grammars::{
    END_RULE_ID, Grammar, Haystack, PatternSetMatch, Rule, RuleId, WHILE_RULE_ID,
};
use crate::matcher::Priority;
use crate::themes::Theme;

mod anchors;
mod line_tokens;
pub mod metadata;
mod scopes;
mod stack;

pub use anchors::AnchorActive;
pub use line_tokens::{BalancedBracketSelectors, Token, TokenTypeMatcher};
pub use metadata::StandardTokenType;
pub(crate) use scopes::AttributeResolver;
pub use scopes::{AttributedScopeStack, BasicScopeAttributes, BasicScopeAttributesProvider};
pub use stack::StateStack;

use line_tokens::LineTokens;

/// The tokens of a line with the state to give when tokenizing the next one.
#[derive(Debug, Clone)]
pub struct TokenizeLineResult {
    pub tokens: Vec<Token>,
    pub rule_stack: StateStack,
    /// The time limit was reached before the end of the line. The tokens only cover the
    /// start of the line and `rule_stack` is the state at the point where it stopped.
    pub stopped_early: bool,
}

/// Same as [`TokenizeLineResult`] with tokens encoded as `(start, metadata)` pairs,
/// see [`metadata`] to decode them.
#[derive(Debug, Clone)]
pub struct TokenizeLineResult2 {
    pub tokens: Vec<u32>,
    /// Whether each token can contain balanced brackets, only set when the grammar
    /// was loaded with bracket selectors.
    pub balanced_brackets: Option<Vec<bool>>,
    pub rule_stack: StateStack,
    pub stopped_early: bool,
}

/// Where the while conditions left the line
struct WhileCheckResult {
    stack: StateStack,
    pos: usize,
    anchor_position: Option<usize>,
    is_first_line: bool,
}

/// Tokenizes lines of a single grammar with a snapshot of the theme.
pub(crate) struct Tokenizer<'g> {
    grammar: &'g Grammar,
    resolver: AttributeResolver<'g>,
    /// Attributes of a scope list starting from nothing
    default_attributes: u32,
    debug: bool,
    retry_without_anchor: bool,
}

impl<'g> Tokenizer<'g> {
    pub fn new(grammar: &'g Grammar, theme: &'g Theme) -> Self {
        let provider = grammar.attributes();
        let defaults = provider.default_attributes();
        let style = theme.defaults();
        let default_attributes = metadata::set(
            0,
            defaults.language_id,
            defaults.token_type,
            style.font_style,
            style.foreground_id,
            style.background_id,
        );
        let options = grammar.options();

        Self {
            grammar,
            resolver: AttributeResolver { provider, theme },
            default_attributes,
            debug: options.debug,
            retry_without_anchor: options.retry_without_anchor,
        }
    }

    pub fn tokenize_line(
        &self,
        line: &str,
        prev_state: &StateStack,
        time_limit: Option<Duration>,
    ) -> TokenizerResult<TokenizeLineResult> {
        let (tokens, rule_stack, stopped_early, line_len) =
            self.tokenize(line, prev_state, false, time_limit)?;
        Ok(TokenizeLineResult {
            tokens: tokens.into_tokens(&rule_stack, line_len),
            rule_stack,
            stopped_early,
        })
    }

    pub fn tokenize_line2(
        &self,
        line: &str,
        prev_state: &StateStack,
        time_limit: Option<Duration>,
    ) -> TokenizerResult<TokenizeLineResult2> {
        let (tokens, rule_stack, stopped_early, line_len) =
            self.tokenize(line, prev_state, true, time_limit)?;
        let (tokens, balanced_brackets) = tokens.into_binary_tokens(&rule_stack, line_len);
        Ok(TokenizeLineResult2 {
            tokens,
            balanced_brackets,
            rule_stack,
            stopped_early,
        })
    }

    fn tokenize(
        &self,
        line: &str,
        prev_state: &StateStack,
        emit_binary_tokens: bool,
        time_limit: Option<Duration>,
    ) -> TokenizerResult<(LineTokens<'g>, StateStack, bool, usize)> {
        let (stack, is_first_line) = if prev_state.is_initial() {
            let scope_name = self.grammar.scope_name();
            let root_scopes = if scope_name.is_empty() {
                None
            } else {
                Some(AttributedScopeStack::create_root_and_lookup(
                    scope_name,
                    self.default_attributes,
                    self.resolver,
                ))
            };
            (StateStack::root(root_scopes), true)
        } else {
            (prev_state.reset(), false)
        };

        // Always add a new line, some regex expect it
        let line = format!("{line}\n");
        let line_len = line.len();
        let mut tokens = LineTokens::new(
            emit_binary_tokens,
            self.grammar.token_type_matchers(),
            self.grammar.balanced_bracket_selectors(),
            self.debug,
        );

        let (stack, stopped_early) = self.tokenize_string(
            &line,
            is_first_line,
            0,
            stack,
            &mut tokens,
            true,
            time_limit,
        )?;
        Ok((tokens, stack, stopped_early, line_len))
    }

    fn rule(&self, rule_id: RuleId) -> Option<&'g Rule> {
        self.grammar.rules().get(rule_id.as_index())
    }

    fn push_scopes(
        &self,
        base: Option<&Arc<AttributedScopeStack>>,
        scope_path: Option<&str>,
    ) -> Option<Arc<AttributedScopeStack>> {
        AttributedScopeStack::push_onto(base, scope_path, self.default_attributes, self.resolver)
    }

    fn match_rule(
        &self,
        haystack: &Haystack,
        is_first_line: bool,
        pos: usize,
        stack: &StateStack,
        anchor_position: Option<usize>,
    ) -> TokenizerResult<Option<PatternSetMatch>> {
        let pattern_sets = self.grammar.pattern_sets();
        let rules = self.grammar.rules();
        // The resolved pattern of a BeginWhile frame is its while, checked separately
        let pattern_set = match (stack.end_rule(), self.rule(stack.rule_id())) {
            (Some(end), Some(Rule::BeginEnd(_))) => stack.end_patterns(|| {
                pattern_sets.for_rule(rules, stack.rule_id(), Some(end))
            }),
            _ => pattern_sets.for_rule(rules, stack.rule_id(), None),
        };
        if self.debug {
            log::trace!("[match_rule] {pattern_set:?}");
        }

        let anchor = AnchorActive::new(is_first_line, anchor_position, pos);
        let engine = self.grammar.engine();
        let found = pattern_set.find_at(engine, haystack, pos, anchor)?;
        if found.is_none() && self.retry_without_anchor && !anchor.allows_g() {
            return pattern_set.find_at(engine, haystack, pos, anchor.with_g());
        }
        Ok(found)
    }

    /// The earliest match of the injections active for the current scopes
    fn match_injections(
        &self,
        haystack: &Haystack,
        is_first_line: bool,
        pos: usize,
        stack: &StateStack,
        anchor_position: Option<usize>,
    ) -> TokenizerResult<Option<(Priority, PatternSetMatch)>> {
        let injections = self.grammar.injections();
        if injections.is_empty() {
            return Ok(None);
        }

        let scope_names = stack.scope_names();
        let scopes: Vec<&str> = scope_names.iter().map(String::as_str).collect();
        let anchor = AnchorActive::new(is_first_line, anchor_position, pos);
        let mut best: Option<(Priority, PatternSetMatch)> = None;

        for injection in injections {
            if !injection.matches(&scopes) {
                continue;
            }

            let pattern_set =
                self.grammar
                    .pattern_sets()
                    .for_rule(self.grammar.rules(), injection.rule_id, None);
            let Some(found) =
                pattern_set.find_at(self.grammar.engine(), haystack, pos, anchor)?
            else {
                continue;
            };

            if let Some((_, current)) = &best
                && found.start >= current.start
            {
                continue;
            }

            if self.debug {
                log::debug!(
                    "[match_injections] injection {:?} matched at {}",
                    injection.selector,
                    found.start
                );
            }
            let done = found.start == pos;
            best = Some((injection.priority, found));
            // Can't do better than matching right where we are
            if done {
                break;
            }
        }

        Ok(best)
    }

    fn match_rule_or_injections(
        &self,
        haystack: &Haystack,
        is_first_line: bool,
        pos: usize,
        stack: &StateStack,
        anchor_position: Option<usize>,
    ) -> TokenizerResult<Option<PatternSetMatch>> {
        let rule_match = self.match_rule(haystack, is_first_line, pos, stack, anchor_position)?;
        let Some((priority, injection_match)) =
            self.match_injections(haystack, is_first_line, pos, stack, anchor_position)?
        else {
            return Ok(rule_match);
        };

        let Some(rule_match) = rule_match else {
            return Ok(Some(injection_match));
        };

        // Injections win when they start earlier, or at the same position with L: priority
        if injection_match.start < rule_match.start
            || (injection_match.start == rule_match.start && priority == Priority::Left)
        {
            return Ok(Some(injection_match));
        }
        Ok(Some(rule_match))
    }

    /// Pops every BeginWhile rule whose while pattern doesn't match at the start of the line,
    /// along with everything above it.
    fn check_while_conditions(
        &self,
        haystack: &Haystack,
        mut is_first_line: bool,
        mut pos: usize,
        stack: StateStack,
        tokens: &mut LineTokens<'g>,
    ) -> TokenizerResult<WhileCheckResult> {
        let mut anchor_position = if stack.begin_rule_has_captured_eol() {
            Some(0)
        } else {
            None
        };

        let mut while_frames = Vec::new();
        let mut node = Some(&stack);
        while let Some(frame) = node {
            if let Some(Rule::BeginWhile(rule)) = self.rule(frame.rule_id()) {
                while_frames.push((rule, frame.clone()));
            }
            node = frame.parent();
        }

        let mut result = stack.clone();
        // Outermost first
        for (rule, frame) in while_frames.into_iter().rev() {
            let pattern_sets = self.grammar.pattern_sets();
            let rules = self.grammar.rules();
            let pattern_set = match frame.end_rule() {
                Some(resolved) => frame.end_patterns(|| {
                    pattern_sets.for_while(rules, frame.rule_id(), Some(resolved))
                }),
                None => pattern_sets.for_while(rules, frame.rule_id(), None),
            };
            let anchor = AnchorActive::new(is_first_line, anchor_position, pos);
            let found = pattern_set.find_at(self.grammar.engine(), haystack, pos, anchor)?;

            match found {
                Some(m) if m.rule_id == WHILE_RULE_ID => {
                    if self.debug {
                        log::debug!(
                            "[check_while_conditions] while of {} still matches [{}..{}]",
                            rule.begin.source(),
                            m.start,
                            m.end
                        );
                    }
                    tokens.produce(&frame, m.start);
                    self.handle_captures(
                        haystack,
                        is_first_line,
                        &frame,
                        tokens,
                        &rule.while_captures,
                        &m.capture_pos,
                    )?;
                    tokens.produce(&frame, m.end);
                    anchor_position = Some(m.end);
                    if m.end > pos {
                        pos = m.end;
                        is_first_line = false;
                    }
                }
                _ => {
                    if self.debug {
                        log::debug!(
                            "[check_while_conditions] while of {} failed, popping",
                            rule.begin.source()
                        );
                    }
                    result = frame.safe_pop();
                    break;
                }
            }
        }

        Ok(WhileCheckResult {
            stack: result,
            pos,
            anchor_position,
            is_first_line,
        })
    }

    /// Produces the tokens for the capture groups of a match.
    /// Captures with patterns are tokenized again on their own, the others only add their
    /// name on top of the enclosing scopes.
    fn handle_captures(
        &self,
        haystack: &Haystack,
        is_first_line: bool,
        stack: &StateStack,
        tokens: &mut LineTokens<'g>,
        captures: &[Option<RuleId>],
        capture_pos: &[Option<(usize, usize)>],
    ) -> TokenizerResult<()> {
        if captures.is_empty() {
            return Ok(());
        }
        let Some(Some((_, max_end))) = capture_pos.first().copied() else {
            return Ok(());
        };

        let line = haystack.text();
        // Captures can be nested, the innermost one is last
        let mut local_stack: Vec<(Option<Arc<AttributedScopeStack>>, usize)> = Vec::new();

        for (capture_rule, capture) in captures.iter().zip(capture_pos) {
            let (Some(rule_id), Some((start, end))) = (*capture_rule, *capture) else {
                continue;
            };
            let Some(Rule::Capture(rule)) = self.rule(rule_id) else {
                continue;
            };
            if start == end {
                continue;
            }
            // Captures inside a lookahead can be after the match
            if start > max_end {
                break;
            }

            while let Some((scopes, end_pos)) = local_stack.last()
                && *end_pos <= start
            {
                tokens.produce_from_scopes(scopes.as_ref(), *end_pos);
                local_stack.pop();
            }
            match local_stack.last() {
                Some((scopes, _)) => tokens.produce_from_scopes(scopes.as_ref(), start),
                None => tokens.produce(stack, start),
            }

            if let Some(retokenize_id) = rule.retokenize_captured_with {
                let name = rule.name.as_ref().map(|n| n.resolve(line, capture_pos));
                let name_scopes = self.push_scopes(stack.content_scopes(), name.as_deref());
                let content_name = rule
                    .content_name
                    .as_ref()
                    .map(|n| n.resolve(line, capture_pos));
                let content_scopes = self.push_scopes(name_scopes.as_ref(), content_name.as_deref());

                if self.debug {
                    log::debug!("[handle_captures] tokenizing capture [{start}..{end}] again");
                }
                let capture_stack = stack.push(
                    retokenize_id,
                    Some(start),
                    None,
                    false,
                    None,
                    name_scopes,
                    content_scopes,
                );
                self.tokenize_string(
                    &line[..end],
                    is_first_line && start == 0,
                    start,
                    capture_stack,
                    tokens,
                    false,
                    None,
                )?;
                continue;
            }

            if let Some(name) = &rule.name {
                let name = name.resolve(line, capture_pos);
                let base = match local_stack.last() {
                    Some((scopes, _)) => scopes.clone(),
                    None => stack.content_scopes().cloned(),
                };
                let scopes = self.push_scopes(base.as_ref(), Some(&name));
                local_stack.push((scopes, end));
            }
        }

        while let Some((scopes, end_pos)) = local_stack.pop() {
            tokens.produce_from_scopes(scopes.as_ref(), end_pos);
        }
        Ok(())
    }

    /// Tokenizes `line` from `pos`, returning the state at the end and whether the time limit
    /// was reached.
    #[allow(clippy::too_many_arguments)]
    fn tokenize_string(
        &self,
        line: &str,
        mut is_first_line: bool,
        mut pos: usize,
        mut stack: StateStack,
        tokens: &mut LineTokens<'g>,
        check_while_conditions: bool,
        time_limit: Option<Duration>,
    ) -> TokenizerResult<(StateStack, bool)> {
        let haystack = self.grammar.engine().create_haystack(line);
        let line_len = line.len();
        let mut anchor_position = None;

        // 1. Pop the BeginWhile rules that don't continue on this line
        if check_while_conditions {
            let res = self.check_while_conditions(&haystack, is_first_line, pos, stack, tokens)?;
            stack = res.stack;
            pos = res.pos;
            anchor_position = res.anchor_position;
            is_first_line = res.is_first_line;
        }

        // 2. Match until the end of the line
        let start_time = Instant::now();
        loop {
            if let Some(limit) = time_limit
                && start_time.elapsed() >= limit
            {
                log::warn!("[tokenize_string] time limit reached at {pos}, stopping");
                return Ok((stack, true));
            }

            if self.debug {
                log::trace!("[tokenize_string] scanning {pos}: |{:?}|", &line[pos..]);
            }

            let Some(m) =
                self.match_rule_or_injections(&haystack, is_first_line, pos, &stack, anchor_position)?
            else {
                if self.debug {
                    log::debug!("[tokenize_string] no more matches");
                }
                tokens.produce(&stack, line_len);
                break;
            };

            if self.debug {
                log::debug!(
                    "[tokenize_string] matched {} [{}..{}] {:?}",
                    m.rule_id,
                    m.start,
                    m.end,
                    &line[m.start..m.end]
                );
            }

            let has_advanced = m.end > pos;
            // Set when the grammar didn't advance: the state to continue from
            let mut recovery: Option<StateStack> = None;

            if m.rule_id == END_RULE_ID {
                let end_captures: &[Option<RuleId>] = match self.rule(stack.rule_id()) {
                    Some(Rule::BeginEnd(rule)) => &rule.end_captures,
                    _ => &[],
                };

                tokens.produce(&stack, m.start);
                stack = stack.with_content_scopes(stack.name_scopes().cloned());
                self.handle_captures(
                    &haystack,
                    is_first_line,
                    &stack,
                    tokens,
                    end_captures,
                    &m.capture_pos,
                )?;
                tokens.produce(&stack, m.end);

                let popped = stack;
                stack = popped.safe_pop();
                anchor_position = popped.anchor_position();

                if !has_advanced && popped.enter_position() == Some(pos) {
                    // See https://github.com/Microsoft/vscode-textmate/issues/12
                    log::warn!(
                        "[tokenize_string] grammar pushed and popped a rule without advancing at {pos}"
                    );
                    recovery = Some(popped);
                }
            } else {
                let Some(rule) = self.rule(m.rule_id) else {
                    tokens.produce(&stack, line_len);
                    break;
                };

                tokens.produce(&stack, m.start);
                let before_push = stack.clone();
                let name = rule.name().map(|n| n.resolve(line, &m.capture_pos));
                let name_scopes = self.push_scopes(stack.content_scopes(), name.as_deref());
                stack = stack.push(
                    m.rule_id,
                    Some(pos),
                    anchor_position,
                    m.end == line_len,
                    None,
                    name_scopes.clone(),
                    name_scopes.clone(),
                );

                let begin = match rule {
                    Rule::BeginEnd(r) => Some((&r.begin_captures, &r.end)),
                    Rule::BeginWhile(r) => Some((&r.begin_captures, &r.while_)),
                    _ => None,
                };

                if let Some((begin_captures, end)) = begin {
                    if self.debug {
                        log::debug!("[tokenize_string] pushing {}", rule.original_name());
                    }
                    self.handle_captures(
                        &haystack,
                        is_first_line,
                        &stack,
                        tokens,
                        begin_captures,
                        &m.capture_pos,
                    )?;
                    tokens.produce(&stack, m.end);
                    anchor_position = Some(m.end);

                    let content_name = rule.content_name().map(|n| n.resolve(line, &m.capture_pos));
                    let content_scopes =
                        self.push_scopes(name_scopes.as_ref(), content_name.as_deref());
                    stack = stack.with_content_scopes(content_scopes);

                    if end.has_back_references() {
                        stack =
                            stack.with_end_rule(end.resolve_back_references(line, &m.capture_pos));
                    }

                    if !has_advanced && before_push.has_same_rule_as(&stack) {
                        log::warn!(
                            "[tokenize_string] {} pushed again at {pos} without advancing",
                            rule.original_name()
                        );
                        recovery = Some(stack.safe_pop());
                    }
                } else {
                    let captures: &[Option<RuleId>] = match rule {
                        Rule::Match(r) => &r.captures,
                        _ => &[],
                    };
                    self.handle_captures(
                        &haystack,
                        is_first_line,
                        &stack,
                        tokens,
                        captures,
                        &m.capture_pos,
                    )?;
                    tokens.produce(&stack, m.end);
                    // Match rules are done as soon as they matched
                    stack = stack.safe_pop();

                    if !has_advanced {
                        log::warn!(
                            "[tokenize_string] {} matched without advancing at {pos}",
                            rule.original_name()
                        );
                        recovery = Some(stack.safe_pop());
                    }
                }
            }

            if let Some(recovery) = recovery {
                // Skip a character with the recovered state to guarantee progress
                stack = recovery;
                let next = pos + line[pos..].chars().next().map_or(1, char::len_utf8);
                tokens.produce(&stack, next.min(line_len));
                if next >= line_len {
                    break;
                }
                pos = next;
                is_first_line = false;
                continue;
            }

            if has_advanced {
                pos = m.end;
                is_first_line = false;
            }
        }

        Ok((stack, false))
    }
}
