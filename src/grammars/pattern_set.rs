use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock};

use crate::error::TokenizerResult;
use crate::grammars::compiled::{END_RULE_ID, Rule, RuleId, WHILE_RULE_ID};
use crate::grammars::regex::RegexSource;
use crate::grammars::scanner::{Haystack, RegexEngine, Scanner};
use crate::tokenizer::AnchorActive;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PatternSetMatch {
    pub rule_id: RuleId,
    pub start: usize,
    pub end: usize,
    pub capture_pos: Vec<Option<(usize, usize)>>,
}

/// The patterns that can match in a given state, in priority order.
/// A scanner is compiled lazily for each anchor combination actually used.
pub struct PatternSet {
    items: Vec<(RuleId, RegexSource)>,
    has_anchors: bool,
    scanners: [OnceLock<Box<dyn Scanner>>; 4],
}

impl PatternSet {
    pub fn new(items: Vec<(RuleId, RegexSource)>) -> Self {
        let has_anchors = items.iter().any(|(_, re)| re.has_anchor());
        Self {
            items,
            has_anchors,
            scanners: Default::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn scanner(
        &self,
        engine: &dyn RegexEngine,
        anchor: AnchorActive,
    ) -> TokenizerResult<&dyn Scanner> {
        // Without anchors all the variants are the same pattern
        let slot = if self.has_anchors { anchor.index() } else { 0 };
        let lock = &self.scanners[slot];
        if let Some(scanner) = lock.get() {
            return Ok(scanner.as_ref());
        }

        let patterns: Vec<&str> = self
            .items
            .iter()
            .map(|(_, re)| re.resolve_anchors(anchor))
            .collect();
        let scanner = engine.create_scanner(&patterns)?;
        // Another thread might have been faster, it doesn't matter which one is kept
        Ok(lock.get_or_init(|| scanner).as_ref())
    }

    pub(crate) fn find_at(
        &self,
        engine: &dyn RegexEngine,
        haystack: &Haystack,
        pos: usize,
        anchor: AnchorActive,
    ) -> TokenizerResult<Option<PatternSetMatch>> {
        if self.items.is_empty() {
            return Ok(None);
        }

        let scanner = self.scanner(engine, anchor)?;
        let Some(found) = scanner.find_next_match(haystack, pos) else {
            return Ok(None);
        };
        let Some((rule_id, _)) = self.items.get(found.index) else {
            return Ok(None);
        };

        Ok(Some(PatternSetMatch {
            rule_id: *rule_id,
            start: found.start(),
            end: found.end(),
            capture_pos: found.captures,
        }))
    }
}

impl Debug for PatternSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PatternSet({} rules)", self.items.len())?;
        for (rule_id, re) in &self.items {
            write!(f, "\n  {rule_id}: {re:?}")?;
        }
        Ok(())
    }
}

/// Adds the regexes that can start a match for the rule: its own for Match, the begin for
/// BeginEnd/BeginWhile and the ones of all the included rules for IncludeOnly.
fn collect_patterns(
    rules: &[Rule],
    rule_id: RuleId,
    out: &mut Vec<(RuleId, RegexSource)>,
    visiting: &mut Vec<RuleId>,
) {
    match rules.get(rule_id.as_index()) {
        Some(Rule::Match(r)) => out.push((rule_id, r.regex.clone())),
        Some(Rule::BeginEnd(r)) => out.push((rule_id, r.begin.clone())),
        Some(Rule::BeginWhile(r)) => out.push((rule_id, r.begin.clone())),
        Some(Rule::IncludeOnly(r)) => {
            // Includes cycling back to a rule being flattened add nothing new
            if visiting.contains(&rule_id) {
                return;
            }
            visiting.push(rule_id);
            for &pattern in &r.patterns {
                collect_patterns(rules, pattern, out, visiting);
            }
            visiting.pop();
        }
        Some(Rule::Capture(_)) | Some(Rule::Noop) | None => (),
    }
}

fn build_rule_patterns(rules: &[Rule], rule_id: RuleId, end: Option<&str>) -> PatternSet {
    let mut items = Vec::new();
    let mut visiting = Vec::new();

    match rules.get(rule_id.as_index()) {
        Some(Rule::BeginEnd(r)) => {
            for &pattern in &r.patterns {
                collect_patterns(rules, pattern, &mut items, &mut visiting);
            }
            let end = match end {
                Some(resolved) => RegexSource::new(resolved),
                None => r.end.clone(),
            };
            if r.apply_end_pattern_last {
                items.push((END_RULE_ID, end));
            } else {
                items.insert(0, (END_RULE_ID, end));
            }
        }
        Some(Rule::BeginWhile(r)) => {
            for &pattern in &r.patterns {
                collect_patterns(rules, pattern, &mut items, &mut visiting);
            }
        }
        _ => collect_patterns(rules, rule_id, &mut items, &mut visiting),
    }

    PatternSet::new(items)
}

/// Pattern sets of all the rules of a grammar.
///
/// End and while patterns with back references are resolved when their rule is pushed. Their
/// pattern sets are built on demand and not kept here: the stack frame holding the resolved
/// pattern keeps them instead, so they go away with the state.
pub(crate) struct PatternSetCache {
    rules: Vec<OnceLock<Arc<PatternSet>>>,
    whiles: Vec<OnceLock<Arc<PatternSet>>>,
}

impl PatternSetCache {
    pub fn new(rule_count: usize) -> Self {
        Self {
            rules: (0..rule_count).map(|_| OnceLock::new()).collect(),
            whiles: (0..rule_count).map(|_| OnceLock::new()).collect(),
        }
    }

    /// The patterns to scan when `rule_id` is on top of the stack.
    /// `end_rule` is the end pattern with back references resolved, if it had any.
    pub fn for_rule(
        &self,
        rules: &[Rule],
        rule_id: RuleId,
        end_rule: Option<&str>,
    ) -> Arc<PatternSet> {
        if let Some(end) = end_rule
            && matches!(rules.get(rule_id.as_index()), Some(Rule::BeginEnd(_)))
        {
            return Arc::new(build_rule_patterns(rules, rule_id, Some(end)));
        }

        match self.rules.get(rule_id.as_index()) {
            Some(lock) => Arc::clone(
                lock.get_or_init(|| Arc::new(build_rule_patterns(rules, rule_id, None))),
            ),
            None => Arc::new(PatternSet::new(Vec::new())),
        }
    }

    /// The while pattern of a BeginWhile rule
    pub fn for_while(
        &self,
        rules: &[Rule],
        rule_id: RuleId,
        while_rule: Option<&str>,
    ) -> Arc<PatternSet> {
        let Some(Rule::BeginWhile(rule)) = rules.get(rule_id.as_index()) else {
            return Arc::new(PatternSet::new(Vec::new()));
        };

        if let Some(resolved) = while_rule {
            return Arc::new(PatternSet::new(vec![(
                WHILE_RULE_ID,
                RegexSource::new(resolved),
            )]));
        }

        match self.whiles.get(rule_id.as_index()) {
            Some(lock) => Arc::clone(lock.get_or_init(|| {
                Arc::new(PatternSet::new(vec![(WHILE_RULE_ID, rule.while_.clone())]))
            })),
            None => Arc::new(PatternSet::new(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::grammars::compiled::RuleCompiler;
    use crate::grammars::raw::RawGrammar;
    use crate::grammars::scanner::OnigEngine;

    fn compile(json: &str) -> Vec<Rule> {
        let grammar = Arc::new(RawGrammar::from_json(json).unwrap());
        let grammars = HashMap::from([(grammar.scope_name.clone(), Arc::clone(&grammar))]);
        let mut compiler = RuleCompiler::new(&grammar, &grammars);
        compiler.compile_root();
        compiler.finish()
    }

    fn sources(set: &PatternSet) -> Vec<(RuleId, String)> {
        set.items
            .iter()
            .map(|(id, re)| (*id, re.source().to_string()))
            .collect()
    }

    #[test]
    fn flattens_include_only_rules() {
        let rules = compile(
            r##"{
              "scopeName": "source.test",
              "patterns": [
                { "include": "#group" },
                { "match": "c" }
              ],
              "repository": {
                "group": { "patterns": [{ "match": "a" }, { "begin": "b", "end": "e" }, { "include": "$self" }] }
              }
            }"##,
        );
        let cache = PatternSetCache::new(rules.len());
        let set = cache.for_rule(&rules, RuleId(0), None);
        let found: Vec<_> = sources(&set).into_iter().map(|(_, s)| s).collect();
        assert_eq!(found, vec!["a", "b", "c"]);
        // cached
        assert!(Arc::ptr_eq(&set, &cache.for_rule(&rules, RuleId(0), None)));
    }

    #[test]
    fn end_pattern_position_and_back_references() {
        let rules = compile(
            r##"{
              "scopeName": "source.test",
              "patterns": [
                { "begin": "(\\w+)", "end": "\\1", "patterns": [{ "match": "x" }] },
                { "begin": "<", "end": ">", "applyEndPatternLast": true, "patterns": [{ "match": "y" }] }
              ]
            }"##,
        );
        let cache = PatternSetCache::new(rules.len());
        let root = rules[0].patterns().to_vec();

        let set = cache.for_rule(&rules, root[0], Some("abc"));
        let found = sources(&set);
        assert_eq!(found[0], (END_RULE_ID, "abc".to_string()));
        assert_eq!(found[1].1, "x");
        // resolved end patterns are owned by the caller, nothing piles up in the cache
        let again = cache.for_rule(&rules, root[0], Some("abc"));
        assert!(!Arc::ptr_eq(&set, &again));

        let set = cache.for_rule(&rules, root[1], None);
        let found = sources(&set);
        assert_eq!(found[0].1, "y");
        assert_eq!(found[1], (END_RULE_ID, ">".to_string()));
    }

    #[test]
    fn finds_matches_with_anchors() {
        let set = PatternSet::new(vec![
            (RuleId(1), RegexSource::new(r"\Ga")),
            (RuleId(2), RegexSource::new("a")),
        ]);
        let engine = OnigEngine;
        let haystack = engine.create_haystack("xa\n");

        let m = set
            .find_at(&engine, &haystack, 1, AnchorActive::G)
            .unwrap()
            .unwrap();
        assert_eq!((m.rule_id, m.start, m.end), (RuleId(1), 1, 2));

        let m = set
            .find_at(&engine, &haystack, 1, AnchorActive::None)
            .unwrap()
            .unwrap();
        assert_eq!(m.rule_id, RuleId(2));
    }
}
