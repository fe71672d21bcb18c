mod compiled;
mod dependencies;
mod grammar;
mod injections;
mod pattern_set;
mod raw;
mod regex;
mod scanner;

pub use compiled::{
    BeginEndRule, BeginWhileRule, CaptureRule, END_RULE_ID, IncludeOnlyRule, MatchRule,
    ROOT_RULE_ID, Rule, RuleId, ScopeTemplate, WHILE_RULE_ID,
};
pub use dependencies::{AbsoluteRuleReference, DependencyProcessor};
pub use grammar::Grammar;
pub(crate) use grammar::GrammarEnv;
pub use injections::Injection;
pub use pattern_set::{PatternSet, PatternSetMatch};
pub use raw::{Captures, RawGrammar, RawRule, Repository};
pub use regex::RegexSource;
pub use scanner::{Haystack, OnigEngine, RegexEngine, ScanMatch, Scanner};
