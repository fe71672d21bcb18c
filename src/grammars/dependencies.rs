//! Finds the grammars a grammar needs before it can be compiled.
//!
//! Loading happens in rounds: the registry loads every grammar in the queue, then
//! [`DependencyProcessor::process_queue`] walks what was loaded and queues the grammars they
//! refer to that were not requested yet.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, TokenizerResult};
use crate::grammars::compiled::Reference;
use crate::grammars::raw::{RawGrammar, RawRule, Repository};

/// A grammar, or a single repository rule of a grammar, that needs to be available
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbsoluteRuleReference {
    TopLevel(String),
    TopLevelRepository { scope_name: String, rule: String },
}

impl AbsoluteRuleReference {
    pub fn scope_name(&self) -> &str {
        match self {
            AbsoluteRuleReference::TopLevel(scope_name) => scope_name,
            AbsoluteRuleReference::TopLevelRepository { scope_name, .. } => scope_name,
        }
    }

    fn to_key(&self) -> String {
        match self {
            AbsoluteRuleReference::TopLevel(scope_name) => scope_name.clone(),
            AbsoluteRuleReference::TopLevelRepository { scope_name, rule } => {
                format!("{scope_name}#{rule}")
            }
        }
    }
}

#[derive(Default)]
struct ExternalReferenceCollector {
    references: Vec<AbsoluteRuleReference>,
    seen: HashSet<String>,
    visited_rules: HashSet<*const RawRule>,
}

impl ExternalReferenceCollector {
    fn add(&mut self, reference: AbsoluteRuleReference) {
        if self.seen.insert(reference.to_key()) {
            self.references.push(reference);
        }
    }
}

#[derive(Clone)]
struct WalkContext<'g> {
    base_grammar: &'g RawGrammar,
    self_grammar: &'g RawGrammar,
    /// Repositories of the rules we are in, innermost last
    repositories: Vec<&'g Repository>,
}

impl<'g> WalkContext<'g> {
    fn for_grammar(&self, grammar: &'g RawGrammar) -> Self {
        Self {
            base_grammar: self.base_grammar,
            self_grammar: grammar,
            repositories: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<&'g RawRule> {
        for repository in self.repositories.iter().rev() {
            if let Some(rule) = repository.get(name) {
                return Some(rule);
            }
        }
        self.self_grammar.repository.as_ref()?.get(name)
    }
}

fn walk_top_level_rule<'g>(ctx: &WalkContext<'g>, out: &mut ExternalReferenceCollector) {
    walk_rules(ctx.self_grammar.patterns.iter(), ctx, out);
    if let Some(injections) = &ctx.self_grammar.injections {
        walk_rules(injections.values(), ctx, out);
    }
}

fn walk_repository_rule<'g>(
    name: &str,
    ctx: &WalkContext<'g>,
    out: &mut ExternalReferenceCollector,
) {
    if let Some(rule) = ctx.lookup(name) {
        walk_rules(std::iter::once(rule), ctx, out);
    }
}

fn walk_rules<'g>(
    rules: impl Iterator<Item = &'g RawRule>,
    ctx: &WalkContext<'g>,
    out: &mut ExternalReferenceCollector,
) {
    for rule in rules {
        if !out.visited_rules.insert(rule as *const RawRule) {
            continue;
        }

        let nested_ctx;
        let ctx = match &rule.repository {
            Some(repository) => {
                let mut c = ctx.clone();
                c.repositories.push(repository);
                nested_ctx = c;
                &nested_ctx
            }
            None => ctx,
        };

        if let Some(patterns) = &rule.patterns {
            walk_rules(patterns.iter(), ctx, out);
        }
        for captures in [
            &rule.captures,
            &rule.begin_captures,
            &rule.end_captures,
            &rule.while_captures,
        ]
        .into_iter()
        .flatten()
        {
            walk_rules(captures.values(), ctx, out);
        }

        let Some(include) = &rule.include else {
            continue;
        };
        match Reference::from(include.as_str()) {
            Reference::Base => walk_top_level_rule(&ctx.for_grammar(ctx.base_grammar), out),
            Reference::Self_ => walk_top_level_rule(&ctx.for_grammar(ctx.self_grammar), out),
            Reference::Local(name) => walk_repository_rule(name, ctx, out),
            Reference::OtherComplete(scope_name) | Reference::OtherSpecific(scope_name, _) => {
                let rule_name = match Reference::from(include.as_str()) {
                    Reference::OtherSpecific(_, rule) => Some(rule),
                    _ => None,
                };
                let known = if scope_name == ctx.self_grammar.scope_name {
                    Some(ctx.self_grammar)
                } else if scope_name == ctx.base_grammar.scope_name {
                    Some(ctx.base_grammar)
                } else {
                    None
                };

                match (known, rule_name) {
                    (Some(grammar), Some(rule)) => {
                        walk_repository_rule(rule, &ctx.for_grammar(grammar), out)
                    }
                    (Some(grammar), None) => walk_top_level_rule(&ctx.for_grammar(grammar), out),
                    (None, Some(rule)) => out.add(AbsoluteRuleReference::TopLevelRepository {
                        scope_name: scope_name.to_string(),
                        rule: rule.to_string(),
                    }),
                    (None, None) => out.add(AbsoluteRuleReference::TopLevel(scope_name.to_string())),
                }
            }
        }
    }
}

/// Queue of the grammar references to load, see the module documentation
#[derive(Debug)]
pub struct DependencyProcessor {
    initial_scope_name: String,
    seen_full_scope_requests: HashSet<String>,
    seen_partial_scope_requests: HashSet<String>,
    pub queue: Vec<AbsoluteRuleReference>,
}

impl DependencyProcessor {
    pub fn new(initial_scope_name: &str) -> Self {
        Self {
            initial_scope_name: initial_scope_name.to_string(),
            seen_full_scope_requests: HashSet::from([initial_scope_name.to_string()]),
            seen_partial_scope_requests: HashSet::new(),
            queue: vec![AbsoluteRuleReference::TopLevel(
                initial_scope_name.to_string(),
            )],
        }
    }

    /// Walks the grammars of the current queue, which should be loaded by now, and replaces
    /// the queue with the references they contain that were never requested.
    ///
    /// Errors if the initial grammar itself is not available.
    pub fn process_queue(
        &mut self,
        grammars: &HashMap<String, Arc<RawGrammar>>,
        injections: &HashMap<String, Vec<String>>,
    ) -> TokenizerResult<()> {
        let queue = std::mem::take(&mut self.queue);
        let mut collector = ExternalReferenceCollector::default();

        for reference in &queue {
            let Some(self_grammar) = grammars.get(reference.scope_name()) else {
                if reference.scope_name() == self.initial_scope_name {
                    return Err(Error::GrammarNotFound(self.initial_scope_name.clone()));
                }
                continue;
            };
            let Some(base_grammar) = grammars.get(&self.initial_scope_name) else {
                return Err(Error::GrammarNotFound(self.initial_scope_name.clone()));
            };

            let ctx = WalkContext {
                base_grammar,
                self_grammar,
                repositories: Vec::new(),
            };
            match reference {
                AbsoluteRuleReference::TopLevel(_) => walk_top_level_rule(&ctx, &mut collector),
                AbsoluteRuleReference::TopLevelRepository { rule, .. } => {
                    walk_repository_rule(rule, &ctx, &mut collector)
                }
            }

            if let Some(injected) = injections.get(reference.scope_name()) {
                for scope_name in injected {
                    collector.add(AbsoluteRuleReference::TopLevel(scope_name.clone()));
                }
            }
        }

        for reference in collector.references {
            let scope_name = reference.scope_name();
            if self.seen_full_scope_requests.contains(scope_name) {
                continue;
            }
            match &reference {
                AbsoluteRuleReference::TopLevel(_) => {
                    self.seen_full_scope_requests.insert(scope_name.to_string());
                }
                AbsoluteRuleReference::TopLevelRepository { .. } => {
                    if !self.seen_partial_scope_requests.insert(reference.to_key()) {
                        continue;
                    }
                }
            }
            self.queue.push(reference);
        }

        Ok(())
    }
}
