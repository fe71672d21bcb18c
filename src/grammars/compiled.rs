use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use onig::Regex;

use crate::grammars::raw::{Captures, RawGrammar, RawRule, Repository};
use crate::grammars::regex::RegexSource;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);

impl RuleId {
    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `$self` rule of the grammar being tokenized
pub const ROOT_RULE_ID: RuleId = RuleId(0);
/// Marks the end pattern of a BeginEnd rule in a pattern list
pub const END_RULE_ID: RuleId = RuleId(u32::MAX);
/// Marks the while pattern of a BeginWhile rule in a pattern list
pub const WHILE_RULE_ID: RuleId = RuleId(u32::MAX - 1);

static CAPTURE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\d+)|\$\{(\d+):/(downcase|upcase)\}").expect("Invalid capture reference regex")
});

/// A scope name that can refer to the text of capture groups:
/// `$1`, `${1:/downcase}` or `${1:/upcase}`.
#[derive(Clone, PartialEq, Eq)]
pub struct ScopeTemplate {
    template: String,
    has_captures: bool,
}

impl ScopeTemplate {
    /// Empty names are the same as no name at all
    pub fn new(template: Option<&str>) -> Option<Self> {
        let template = template.filter(|t| !t.is_empty())?;
        Some(Self {
            template: template.to_string(),
            has_captures: CAPTURE_REFERENCE.find(template).is_some(),
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Replaces capture references with the captured text, without its leading dots.
    /// References to groups the match doesn't have are kept as is.
    pub fn resolve<'a>(&'a self, line: &str, captures: &[Option<(usize, usize)>]) -> Cow<'a, str> {
        if !self.has_captures {
            return Cow::Borrowed(&self.template);
        }

        let mut out = String::with_capacity(self.template.len());
        let mut last = 0;
        for caps in CAPTURE_REFERENCE.captures_iter(&self.template) {
            let Some((start, end)) = caps.pos(0) else {
                continue;
            };
            out.push_str(&self.template[last..start]);
            last = end;

            let (index, command) = match caps.at(1) {
                Some(index) => (index, None),
                None => (caps.at(2).unwrap_or_default(), caps.at(3)),
            };
            let Some(capture) = index.parse::<usize>().ok().and_then(|i| captures.get(i)) else {
                out.push_str(&self.template[start..end]);
                continue;
            };

            let text = capture
                .and_then(|(s, e)| line.get(s..e))
                .unwrap_or_default()
                .trim_start_matches('.');
            match command {
                Some("downcase") => out.push_str(&text.to_lowercase()),
                Some("upcase") => out.push_str(&text.to_uppercase()),
                _ => out.push_str(text),
            }
        }
        out.push_str(&self.template[last..]);
        Cow::Owned(out)
    }
}

impl fmt::Debug for ScopeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.template)
    }
}

/// per vscode-textmate:
///  Allowed values:
///  * Scope Name, e.g. `source.ts`
///  * Top level scope reference, e.g. `source.ts#entity.name.class`
///  * Relative scope reference, e.g. `#entity.name.class`
///  * self, e.g. `$self`
///  * base, e.g. `$base`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Reference<'a> {
    Self_,
    Base,
    Local(&'a str),
    OtherComplete(&'a str),
    OtherSpecific(&'a str, &'a str),
}

impl<'a> From<&'a str> for Reference<'a> {
    fn from(value: &'a str) -> Self {
        match value {
            "$self" => Self::Self_,
            "$base" => Self::Base,
            _ => match value.split_once('#') {
                None => Self::OtherComplete(value),
                Some(("", rule)) => Self::Local(rule),
                Some((scope, rule)) => Self::OtherSpecific(scope, rule),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchRule {
    pub name: Option<ScopeTemplate>,
    pub regex: RegexSource,
    /// Index is the capture group
    pub captures: Vec<Option<RuleId>>,
}

/// Only holds patterns, it never appears on the stack by itself
#[derive(Debug, Clone)]
pub struct IncludeOnlyRule {
    pub name: Option<ScopeTemplate>,
    pub content_name: Option<ScopeTemplate>,
    pub patterns: Vec<RuleId>,
    pub has_missing_patterns: bool,
}

#[derive(Debug, Clone)]
pub struct BeginEndRule {
    pub name: Option<ScopeTemplate>,
    pub content_name: Option<ScopeTemplate>,
    pub begin: RegexSource,
    pub begin_captures: Vec<Option<RuleId>>,
    pub end: RegexSource,
    pub end_captures: Vec<Option<RuleId>>,
    pub apply_end_pattern_last: bool,
    pub patterns: Vec<RuleId>,
    pub has_missing_patterns: bool,
}

#[derive(Debug, Clone)]
pub struct BeginWhileRule {
    pub name: Option<ScopeTemplate>,
    pub content_name: Option<ScopeTemplate>,
    pub begin: RegexSource,
    pub begin_captures: Vec<Option<RuleId>>,
    pub while_: RegexSource,
    pub while_captures: Vec<Option<RuleId>>,
    pub patterns: Vec<RuleId>,
    pub has_missing_patterns: bool,
}

/// Scopes given to a capture group, and the rule used to tokenize its content if it has
/// patterns.
#[derive(Debug, Clone)]
pub struct CaptureRule {
    pub name: Option<ScopeTemplate>,
    pub content_name: Option<ScopeTemplate>,
    pub retokenize_captured_with: Option<RuleId>,
}

#[derive(Debug, Clone)]
pub enum Rule {
    Match(MatchRule),
    IncludeOnly(IncludeOnlyRule),
    BeginEnd(BeginEndRule),
    BeginWhile(BeginWhileRule),
    Capture(CaptureRule),
    /// Placeholder while the rule body is being compiled
    Noop,
}

impl Rule {
    pub fn name(&self) -> Option<&ScopeTemplate> {
        match self {
            Rule::Match(r) => r.name.as_ref(),
            Rule::IncludeOnly(r) => r.name.as_ref(),
            Rule::BeginEnd(r) => r.name.as_ref(),
            Rule::BeginWhile(r) => r.name.as_ref(),
            Rule::Capture(r) => r.name.as_ref(),
            Rule::Noop => None,
        }
    }

    pub fn content_name(&self) -> Option<&ScopeTemplate> {
        match self {
            Rule::IncludeOnly(r) => r.content_name.as_ref(),
            Rule::BeginEnd(r) => r.content_name.as_ref(),
            Rule::BeginWhile(r) => r.content_name.as_ref(),
            Rule::Capture(r) => r.content_name.as_ref(),
            Rule::Match(_) | Rule::Noop => None,
        }
    }

    pub fn patterns(&self) -> &[RuleId] {
        match self {
            Rule::IncludeOnly(r) => &r.patterns,
            Rule::BeginEnd(r) => &r.patterns,
            Rule::BeginWhile(r) => &r.patterns,
            Rule::Match(_) | Rule::Capture(_) | Rule::Noop => &[],
        }
    }

    fn is_inert(&self) -> bool {
        match self {
            Rule::IncludeOnly(r) => r.has_missing_patterns && r.patterns.is_empty(),
            Rule::BeginEnd(r) => r.has_missing_patterns && r.patterns.is_empty(),
            Rule::BeginWhile(r) => r.has_missing_patterns && r.patterns.is_empty(),
            _ => false,
        }
    }

    /// For debug logs
    pub fn original_name(&self) -> &str {
        self.name().map(|n| n.template()).unwrap_or("No name")
    }
}

/// A chain of repositories, the innermost first.
/// The grammar repository is not part of it, it is always looked up last.
struct RepositoryLayer<'c, 'g> {
    repository: &'g Repository,
    parent: Option<&'c RepositoryLayer<'c, 'g>>,
}

/// Where includes are resolved from
#[derive(Clone, Copy)]
struct CompileContext<'c, 'g> {
    grammar: &'g RawGrammar,
    repositories: Option<&'c RepositoryLayer<'c, 'g>>,
}

impl<'c, 'g> CompileContext<'c, 'g> {
    fn new(grammar: &'g RawGrammar) -> Self {
        Self {
            grammar,
            repositories: None,
        }
    }

    fn lookup(&self, name: &str) -> Option<&'g RawRule> {
        let mut layer = self.repositories;
        while let Some(l) = layer {
            if let Some(rule) = l.repository.get(name) {
                return Some(rule);
            }
            layer = l.parent;
        }
        self.grammar.repository.as_ref()?.get(name)
    }
}

/// Turns the raw rules of a grammar and the grammars it includes into a flat list of rules.
///
/// Ids are reserved before a rule body is compiled so recursive includes resolve to the id of
/// the rule being compiled. Each raw rule is only compiled once.
pub(crate) struct RuleCompiler<'g> {
    rules: Vec<Rule>,
    compiled_rules: HashMap<*const RawRule, RuleId>,
    compiled_grammars: HashMap<*const RawGrammar, RuleId>,
    /// The grammar being tokenized, what `$base` refers to
    base: &'g RawGrammar,
    grammars: &'g HashMap<String, Arc<RawGrammar>>,
    missing_includes: usize,
}

impl<'g> RuleCompiler<'g> {
    pub fn new(base: &'g RawGrammar, grammars: &'g HashMap<String, Arc<RawGrammar>>) -> Self {
        Self {
            rules: Vec::new(),
            compiled_rules: HashMap::new(),
            compiled_grammars: HashMap::new(),
            base,
            grammars,
            missing_includes: 0,
        }
    }

    pub fn base(&self) -> &'g RawGrammar {
        self.base
    }

    /// Compiles the root rule of the base grammar, which is always the first one.
    pub fn compile_root(&mut self) -> RuleId {
        self.compile_grammar(self.base)
    }

    /// A grammar known to the registry, the base grammar being always available.
    pub fn external_grammar(&self, scope_name: &str) -> Option<&'g RawGrammar> {
        if let Some(grammar) = self.grammars.get(scope_name) {
            return Some(grammar.as_ref());
        }
        if scope_name == self.base.scope_name {
            return Some(self.base);
        }
        None
    }

    /// The `$self` rule of a grammar: its root patterns
    pub fn compile_grammar(&mut self, grammar: &'g RawGrammar) -> RuleId {
        let key = grammar as *const RawGrammar;
        if let Some(&id) = self.compiled_grammars.get(&key) {
            return id;
        }

        let id = self.reserve();
        self.compiled_grammars.insert(key, id);
        let (patterns, has_missing_patterns) =
            self.compile_patterns(Some(&grammar.patterns), CompileContext::new(grammar));
        self.rules[id.as_index()] = Rule::IncludeOnly(IncludeOnlyRule {
            name: ScopeTemplate::new(Some(&grammar.scope_name)),
            content_name: None,
            patterns,
            has_missing_patterns,
        });
        id
    }

    /// Compiles a rule from the injections of the base grammar
    pub fn compile_injection(&mut self, rule: &'g RawRule) -> RuleId {
        self.compile_rule(rule, CompileContext::new(self.base))
    }

    fn reserve(&mut self) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(Rule::Noop);
        id
    }

    fn push(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.rules.len() as u32);
        self.rules.push(rule);
        id
    }

    fn compile_rule(&mut self, raw: &'g RawRule, ctx: CompileContext<'_, 'g>) -> RuleId {
        let key = raw as *const RawRule;
        if let Some(&id) = self.compiled_rules.get(&key) {
            return id;
        }

        let id = self.reserve();
        self.compiled_rules.insert(key, id);

        let name = ScopeTemplate::new(raw.name.as_deref());
        let content_name = ScopeTemplate::new(raw.content_name.as_deref());
        let non_empty = |s: &'g Option<String>| s.as_deref().filter(|s| !s.is_empty());

        let rule = if let Some(match_) = non_empty(&raw.match_) {
            Rule::Match(MatchRule {
                name,
                regex: RegexSource::new(match_),
                captures: self.compile_captures(raw.captures.as_ref(), ctx),
            })
        } else if let Some(begin) = non_empty(&raw.begin) {
            let (patterns, has_missing_patterns) =
                self.compile_patterns(raw.patterns.as_deref(), ctx);
            if let Some(while_) = non_empty(&raw.while_) {
                Rule::BeginWhile(BeginWhileRule {
                    name,
                    content_name,
                    begin: RegexSource::new(begin),
                    begin_captures: self.compile_captures(
                        raw.begin_captures.as_ref().or(raw.captures.as_ref()),
                        ctx,
                    ),
                    while_: RegexSource::new(while_),
                    while_captures: self.compile_captures(
                        raw.while_captures.as_ref().or(raw.captures.as_ref()),
                        ctx,
                    ),
                    patterns,
                    has_missing_patterns,
                })
            } else {
                // A missing end can never match
                let end = non_empty(&raw.end).unwrap_or("\u{FFFF}");
                Rule::BeginEnd(BeginEndRule {
                    name,
                    content_name,
                    begin: RegexSource::new(begin),
                    begin_captures: self.compile_captures(
                        raw.begin_captures.as_ref().or(raw.captures.as_ref()),
                        ctx,
                    ),
                    end: RegexSource::new(end),
                    end_captures: self.compile_captures(
                        raw.end_captures.as_ref().or(raw.captures.as_ref()),
                        ctx,
                    ),
                    apply_end_pattern_last: raw.apply_end_pattern_last,
                    patterns,
                    has_missing_patterns,
                })
            }
        } else {
            let layer;
            let ctx = match &raw.repository {
                Some(repository) => {
                    layer = RepositoryLayer {
                        repository,
                        parent: ctx.repositories,
                    };
                    CompileContext {
                        grammar: ctx.grammar,
                        repositories: Some(&layer),
                    }
                }
                None => ctx,
            };

            let (patterns, has_missing_patterns) = match (&raw.patterns, &raw.include) {
                (None, Some(include)) => match self.resolve_include(include, ctx) {
                    Some(id) => (vec![id], false),
                    None => (Vec::new(), true),
                },
                _ => self.compile_patterns(raw.patterns.as_deref(), ctx),
            };
            Rule::IncludeOnly(IncludeOnlyRule {
                name,
                content_name,
                patterns,
                has_missing_patterns,
            })
        };

        self.rules[id.as_index()] = rule;
        id
    }

    fn compile_captures(
        &mut self,
        captures: Option<&'g Captures>,
        ctx: CompileContext<'_, 'g>,
    ) -> Vec<Option<RuleId>> {
        let Some(captures) = captures else {
            return Vec::new();
        };

        let numbered: Vec<(usize, &'g RawRule)> = captures
            .iter()
            .filter_map(|(key, rule)| key.parse::<usize>().ok().map(|i| (i, rule)))
            .collect();
        let Some(max) = numbered.iter().map(|(i, _)| *i).max() else {
            return Vec::new();
        };

        let mut out = vec![None; max + 1];
        for (index, raw) in numbered {
            let retokenize_captured_with = if raw.patterns.is_some() {
                Some(self.compile_rule(raw, ctx))
            } else {
                None
            };
            out[index] = Some(self.push(Rule::Capture(CaptureRule {
                name: ScopeTemplate::new(raw.name.as_deref()),
                content_name: ScopeTemplate::new(raw.content_name.as_deref()),
                retokenize_captured_with,
            })));
        }
        out
    }

    /// Returns the compiled ids and whether some includes could not be resolved
    fn compile_patterns(
        &mut self,
        patterns: Option<&'g [RawRule]>,
        ctx: CompileContext<'_, 'g>,
    ) -> (Vec<RuleId>, bool) {
        let mut ids = Vec::new();
        let mut has_missing_patterns = false;

        for pattern in patterns.unwrap_or_default() {
            let id = match &pattern.include {
                Some(include) => match self.resolve_include(include, ctx) {
                    Some(id) => id,
                    None => {
                        has_missing_patterns = true;
                        continue;
                    }
                },
                None => self.compile_rule(pattern, ctx),
            };

            // Rules whose patterns were all missing can never match anything
            if self.rules[id.as_index()].is_inert() {
                continue;
            }
            ids.push(id);
        }

        (ids, has_missing_patterns)
    }

    fn resolve_include(&mut self, include: &str, ctx: CompileContext<'_, 'g>) -> Option<RuleId> {
        let id = match Reference::from(include) {
            Reference::Base | Reference::Local("$base") => Some(self.compile_grammar(self.base)),
            Reference::Self_ | Reference::Local("$self") => Some(self.compile_grammar(ctx.grammar)),
            Reference::Local(name) => ctx.lookup(name).map(|rule| self.compile_rule(rule, ctx)),
            Reference::OtherComplete(scope) => self
                .external_grammar(scope)
                .map(|grammar| self.compile_grammar(grammar)),
            Reference::OtherSpecific(scope, name) => {
                self.external_grammar(scope).and_then(|grammar| {
                    let rule = grammar.repository.as_ref()?.get(name)?;
                    Some(self.compile_rule(rule, CompileContext::new(grammar)))
                })
            }
        };

        if id.is_none() {
            self.missing_includes += 1;
            log::warn!(
                "[compile] could not resolve include `{include}` in {}",
                ctx.grammar.scope_name
            );
        }
        id
    }

    pub fn missing_includes(&self) -> usize {
        self.missing_includes
    }

    pub fn finish(self) -> Vec<Rule> {
        self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammars(raw: &[&str]) -> HashMap<String, Arc<RawGrammar>> {
        raw.iter()
            .map(|json| {
                let grammar = RawGrammar::from_json(json).unwrap();
                (grammar.scope_name.clone(), Arc::new(grammar))
            })
            .collect()
    }

    fn compile(raw: &[&str], base: &str) -> (Vec<Rule>, usize) {
        let grammars = grammars(raw);
        let mut compiler = RuleCompiler::new(&grammars[base], &grammars);
        assert_eq!(compiler.compile_root(), ROOT_RULE_ID);
        let missing = compiler.missing_includes();
        (compiler.finish(), missing)
    }

    #[test]
    fn resolves_scope_templates() {
        let line = "foo .Bar\n";
        let captures = [Some((0, 8)), Some((0, 3)), Some((4, 8)), None];
        let resolve = |t: &str| {
            ScopeTemplate::new(Some(t))
                .unwrap()
                .resolve(line, &captures)
                .into_owned()
        };

        assert_eq!(resolve("entity.name.$1"), "entity.name.foo");
        assert_eq!(resolve("a.$2.${1:/upcase}"), "a.Bar.FOO");
        assert_eq!(resolve("a.${2:/downcase}"), "a.bar");
        assert_eq!(resolve("a.$3"), "a.");
        assert_eq!(resolve("a.$9"), "a.$9");
        assert_eq!(resolve("plain"), "plain");
        assert!(ScopeTemplate::new(Some("")).is_none());
    }

    #[test]
    fn parses_references() {
        assert_eq!(Reference::from("$self"), Reference::Self_);
        assert_eq!(Reference::from("$base"), Reference::Base);
        assert_eq!(Reference::from("#string"), Reference::Local("string"));
        assert_eq!(
            Reference::from("source.js"),
            Reference::OtherComplete("source.js")
        );
        assert_eq!(
            Reference::from("source.js#expr"),
            Reference::OtherSpecific("source.js", "expr")
        );
    }

    #[test]
    fn compiles_rule_kinds() {
        let (rules, missing) = compile(
            &[r##"{
              "scopeName": "source.test",
              "patterns": [
                { "match": "a(b)", "name": "m", "captures": { "1": { "name": "cap" }, "x": {} } },
                { "begin": "\\(", "end": "\\)", "name": "paren", "patterns": [{ "include": "$self" }] },
                { "begin": "^>", "while": "^>", "captures": { "0": { "name": "q" } } },
                { "include": "#rec" }
              ],
              "repository": {
                "rec": { "begin": "\\[", "end": "\\]", "applyEndPatternLast": 1, "patterns": [{ "include": "#rec" }] }
              }
            }"##],
            "source.test",
        );
        assert_eq!(missing, 0);

        let Rule::IncludeOnly(root) = &rules[0] else {
            panic!("root should be an include only rule");
        };
        assert_eq!(root.name.as_ref().unwrap().template(), "source.test");
        assert_eq!(root.patterns.len(), 4);

        let Rule::Match(m) = &rules[root.patterns[0].as_index()] else {
            panic!("expected a match rule");
        };
        // non numeric capture keys are ignored
        assert_eq!(m.captures.len(), 2);
        assert!(m.captures[0].is_none());
        let Some(Rule::Capture(cap)) = m.captures[1].map(|id| &rules[id.as_index()]) else {
            panic!("expected a capture rule");
        };
        assert_eq!(cap.name.as_ref().unwrap().template(), "cap");
        assert!(cap.retokenize_captured_with.is_none());

        let Rule::BeginEnd(paren) = &rules[root.patterns[1].as_index()] else {
            panic!("expected a begin/end rule");
        };
        assert_eq!(paren.patterns, vec![ROOT_RULE_ID]);
        assert!(!paren.apply_end_pattern_last);

        let Rule::BeginWhile(quote) = &rules[root.patterns[2].as_index()] else {
            panic!("expected a begin/while rule");
        };
        // captures are used for both begin and while
        assert_eq!(quote.begin_captures.len(), 1);
        assert_eq!(quote.while_captures.len(), 1);

        let rec_id = root.patterns[3];
        let Rule::BeginEnd(rec) = &rules[rec_id.as_index()] else {
            panic!("expected a begin/end rule");
        };
        assert!(rec.apply_end_pattern_last);
        assert_eq!(rec.patterns, vec![rec_id]);
    }

    #[test]
    fn missing_end_never_matches() {
        let (rules, _) = compile(
            &[r#"{"scopeName": "source.test", "patterns": [{ "begin": "a" }]}"#],
            "source.test",
        );
        let Rule::BeginEnd(rule) = &rules[rules[0].patterns()[0].as_index()] else {
            panic!("expected a begin/end rule");
        };
        assert_eq!(rule.end.source(), "\u{FFFF}");
    }

    #[test]
    fn unresolved_includes_are_skipped() {
        let (rules, missing) = compile(
            &[r##"{
              "scopeName": "source.test",
              "patterns": [
                { "include": "#nope" },
                { "include": "source.other" },
                { "patterns": [{ "include": "#nope" }] },
                { "match": "a" }
              ]
            }"##],
            "source.test",
        );
        assert_eq!(missing, 3);
        let Rule::IncludeOnly(root) = &rules[0] else {
            panic!("root should be an include only rule");
        };
        // the nested rule only had missing patterns so it is skipped as well
        assert_eq!(root.patterns.len(), 1);
        assert!(root.has_missing_patterns);
        assert!(matches!(rules[root.patterns[0].as_index()], Rule::Match(_)));
    }

    #[test]
    fn nested_repositories_shadow_outer_ones() {
        let (rules, _) = compile(
            &[r##"{
              "scopeName": "source.test",
              "patterns": [
                { "include": "#x" },
                { "repository": { "x": { "match": "inner" } }, "patterns": [{ "include": "#x" }] }
              ],
              "repository": { "x": { "match": "outer" } }
            }"##],
            "source.test",
        );
        let root = rules[0].patterns();
        let Rule::Match(outer) = &rules[root[0].as_index()] else {
            panic!("expected a match rule");
        };
        assert_eq!(outer.regex.source(), "outer");
        let nested = rules[root[1].as_index()].patterns();
        let Rule::Match(inner) = &rules[nested[0].as_index()] else {
            panic!("expected a match rule");
        };
        assert_eq!(inner.regex.source(), "inner");
    }

    #[test]
    fn external_grammars_keep_the_base() {
        let (rules, missing) = compile(
            &[
                r##"{"scopeName": "source.outer", "patterns": [{ "include": "source.inner#thing" }, { "include": "source.inner" }]}"##,
                r##"{
                  "scopeName": "source.inner",
                  "patterns": [{ "include": "$base" }, { "include": "$self" }],
                  "repository": { "thing": { "patterns": [{ "include": "#other" }] }, "other": { "match": "o" } }
                }"##,
            ],
            "source.outer",
        );
        assert_eq!(missing, 0);
        let root = rules[0].patterns();
        // source.inner#thing resolved `#other` in the inner grammar
        let thing = rules[root[0].as_index()].patterns();
        assert!(matches!(rules[thing[0].as_index()], Rule::Match(_)));

        let inner_self = root[1];
        assert_eq!(
            rules[inner_self.as_index()].patterns(),
            &[ROOT_RULE_ID, inner_self]
        );
    }
}
