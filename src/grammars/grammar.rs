use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::error::{Error, TokenizerResult};
use crate::grammars::compiled::{Rule, RuleCompiler};
use crate::grammars::injections::{Injection, collect_injections};
use crate::grammars::pattern_set::PatternSetCache;
use crate::grammars::raw::RawGrammar;
use crate::grammars::scanner::RegexEngine;
use crate::options::{GrammarConfiguration, TokenizerOptions};
use crate::themes::Theme;
use crate::tokenizer::{
    BalancedBracketSelectors, BasicScopeAttributesProvider, StateStack, Token,
    TokenTypeMatcher, TokenizeLineResult, TokenizeLineResult2, Tokenizer,
};

/// What a grammar shares with the registry that created it
#[derive(Clone)]
pub(crate) struct GrammarEnv {
    pub engine: Arc<dyn RegexEngine>,
    /// Swapped by `Registry::set_theme`, grammars see the new theme on their next line
    pub theme: Arc<RwLock<Arc<Theme>>>,
    pub options: TokenizerOptions,
}

/// A compiled grammar, ready to tokenize.
///
/// The rules of all the grammars it includes are compiled along with it. Regexes are only
/// compiled when first needed. A grammar can be used from several threads at once.
pub struct Grammar {
    scope_name: String,
    rules: Vec<Rule>,
    injections: Vec<Injection>,
    pattern_sets: PatternSetCache,
    attributes: BasicScopeAttributesProvider,
    token_type_matchers: Vec<TokenTypeMatcher>,
    balanced_bracket_selectors: Option<BalancedBracketSelectors>,
    env: GrammarEnv,
}

impl Grammar {
    /// `grammars` holds every raw grammar known so far, includes of grammars missing from it
    /// are skipped. `configuration` is only given when loading with a configuration, in which
    /// case bracket information is reported.
    pub(crate) fn compile(
        base: &RawGrammar,
        grammars: &HashMap<String, Arc<RawGrammar>>,
        injection_grammars: &[String],
        initial_language_id: u32,
        configuration: Option<&GrammarConfiguration>,
        env: GrammarEnv,
    ) -> TokenizerResult<Self> {
        let mut compiler = RuleCompiler::new(base, grammars);
        compiler.compile_root();
        let injections = collect_injections(&mut compiler, injection_grammars)?;
        if compiler.missing_includes() > 0 {
            log::warn!(
                "[Grammar::compile] {}: {} include(s) could not be resolved",
                base.scope_name,
                compiler.missing_includes()
            );
        }
        let rules = compiler.finish();
        log::debug!(
            "[Grammar::compile] {}: {} rules, {} injections",
            base.scope_name,
            rules.len(),
            injections.len()
        );

        let default_configuration = GrammarConfiguration::default();
        let config = configuration.unwrap_or(&default_configuration);

        let attributes =
            BasicScopeAttributesProvider::new(initial_language_id, &config.embedded_languages);
        let mut token_type_matchers = Vec::new();
        for (selector, token_type) in &config.token_types {
            token_type_matchers.extend(TokenTypeMatcher::from_selector(selector, *token_type)?);
        }
        let balanced_bracket_selectors = match configuration {
            Some(c) => Some(BalancedBracketSelectors::new(
                &c.balanced_bracket_selectors,
                &c.unbalanced_bracket_selectors,
            )?),
            None => None,
        };

        Ok(Self {
            scope_name: base.scope_name.clone(),
            pattern_sets: PatternSetCache::new(rules.len()),
            rules,
            injections,
            attributes,
            token_type_matchers,
            balanced_bracket_selectors,
            env,
        })
    }

    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn injections(&self) -> &[Injection] {
        &self.injections
    }

    pub(crate) fn pattern_sets(&self) -> &PatternSetCache {
        &self.pattern_sets
    }

    pub(crate) fn engine(&self) -> &dyn RegexEngine {
        self.env.engine.as_ref()
    }

    pub fn attributes(&self) -> &BasicScopeAttributesProvider {
        &self.attributes
    }

    pub(crate) fn token_type_matchers(&self) -> &[TokenTypeMatcher] {
        &self.token_type_matchers
    }

    pub(crate) fn balanced_bracket_selectors(&self) -> Option<&BalancedBracketSelectors> {
        self.balanced_bracket_selectors.as_ref()
    }

    pub fn options(&self) -> TokenizerOptions {
        self.env.options
    }

    fn theme(&self) -> Arc<Theme> {
        Arc::clone(
            &self
                .env
                .theme
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Tokenizes a line, without its line terminator.
    ///
    /// Pass [`StateStack::initial()`] for the first line and the `rule_stack` of the previous
    /// line otherwise. Tokenization stops once `time_limit` is reached, see
    /// [`TokenizeLineResult::stopped_early`].
    pub fn tokenize_line(
        &self,
        line: &str,
        prev_state: &StateStack,
        time_limit: Option<Duration>,
    ) -> TokenizerResult<TokenizeLineResult> {
        let theme = self.theme();
        Tokenizer::new(self, &theme).tokenize_line(line, prev_state, time_limit)
    }

    /// Same as [`Grammar::tokenize_line`] but returns the binary encoding of the tokens
    pub fn tokenize_line2(
        &self,
        line: &str,
        prev_state: &StateStack,
        time_limit: Option<Duration>,
    ) -> TokenizerResult<TokenizeLineResult2> {
        let theme = self.theme();
        Tokenizer::new(self, &theme).tokenize_line2(line, prev_state, time_limit)
    }

    /// Tokenizes a whole text split on `\n`, carrying the state from line to line.
    pub fn tokenize_text(&self, text: &str) -> TokenizerResult<Vec<Vec<Token>>> {
        let theme = self.theme();
        let tokenizer = Tokenizer::new(self, &theme);
        let mut state = StateStack::initial();
        let mut out = Vec::new();

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            let res = tokenizer.tokenize_line(line, &state, None)?;
            out.push(res.tokens);
            state = res.rule_stack;
        }
        Ok(out)
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("scope_name", &self.scope_name)
            .field("rules", &self.rules.len())
            .field("injections", &self.injections)
            .field("options", &self.env.options)
            .finish()
    }
}

/// Compiles a grammar on its own, with no theme and no other grammar to include.
impl TryFrom<RawGrammar> for Grammar {
    type Error = Error;

    fn try_from(raw: RawGrammar) -> Result<Self, Self::Error> {
        let theme = Theme::create_from_raw_theme(None, None)?;
        let env = GrammarEnv {
            engine: Arc::new(crate::grammars::OnigEngine),
            theme: Arc::new(RwLock::new(Arc::new(theme))),
            options: TokenizerOptions::default(),
        };
        Grammar::compile(&raw, &HashMap::new(), &[], 0, None, env)
    }
}
