//! Injections: rules active wherever their selector matches the current scopes, whatever the
//! rule on top of the stack is.

use crate::error::TokenizerResult;
use crate::grammars::compiled::{RuleCompiler, RuleId};
use crate::matcher::{Matcher, Priority, create_matchers};
use crate::scope::name_matcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Kept for debugging
    pub selector: String,
    pub matcher: Matcher,
    pub priority: Priority,
    pub rule_id: RuleId,
}

impl Injection {
    pub fn matches(&self, scopes: &[&str]) -> bool {
        self.matcher.matches(scopes, &name_matcher::<&str>)
    }
}

fn push_injections(
    out: &mut Vec<Injection>,
    selector: &str,
    rule_id: RuleId,
) -> TokenizerResult<()> {
    for m in create_matchers(selector)? {
        out.push(Injection {
            selector: selector.to_string(),
            matcher: m.matcher,
            priority: m.priority,
            rule_id,
        });
    }
    Ok(())
}

/// Collects the injections of the base grammar and of the grammars injected into it.
/// `injection_grammars` are the scope names the loader listed for the base grammar, only the
/// ones with an `injectionSelector` are used.
///
/// The result is sorted by priority, `L:` first, keeping the declaration order otherwise.
pub(crate) fn collect_injections(
    compiler: &mut RuleCompiler<'_>,
    injection_grammars: &[String],
) -> TokenizerResult<Vec<Injection>> {
    let mut out = Vec::new();
    let base = compiler.base();

    if let Some(injections) = &base.injections {
        for (selector, rule) in injections {
            let rule_id = compiler.compile_injection(rule);
            push_injections(&mut out, selector, rule_id)?;
        }
    }

    for scope_name in injection_grammars {
        let Some(grammar) = compiler.external_grammar(scope_name) else {
            log::warn!("[collect_injections] injection grammar {scope_name} was not loaded");
            continue;
        };
        let Some(selector) = &grammar.injection_selector else {
            continue;
        };
        let rule_id = compiler.compile_grammar(grammar);
        push_injections(&mut out, selector, rule_id)?;
    }

    out.sort_by_key(|injection| injection.priority);
    Ok(out)
}
