use std::collections::HashMap;
use std::sync::Arc;

use crate::grammars::{OnigEngine, RegexEngine};
use crate::registry::GrammarLoader;
use crate::themes::RawTheme;
use crate::tokenizer::StandardTokenType;

/// Options affecting how lines are tokenized
#[derive(Default, Copy, Clone, Eq, PartialEq, Debug)]
pub struct TokenizerOptions {
    /// Logs every scan, match and produced token at the `debug`/`trace` levels
    pub debug: bool,
    /// When nothing matches and `\G` was not active, scan again as if the position was the
    /// anchor position. vscode-textmate doesn't do that so it's off by default.
    pub retry_without_anchor: bool,
}

impl TokenizerOptions {
    pub fn debug(mut self, value: bool) -> Self {
        self.debug = value;
        self
    }

    pub fn retry_without_anchor(mut self, value: bool) -> Self {
        self.retry_without_anchor = value;
        self
    }
}

/// The options to create a [`crate::Registry`] with.
#[derive(Clone)]
pub struct RegistryOptions {
    pub(crate) theme: Option<RawTheme>,
    pub(crate) color_map: Option<Vec<String>>,
    pub(crate) loader: Option<Arc<dyn GrammarLoader>>,
    pub(crate) engine: Arc<dyn RegexEngine>,
    pub(crate) tokenizer: TokenizerOptions,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            theme: None,
            color_map: None,
            loader: None,
            engine: Arc::new(OnigEngine),
            tokenizer: TokenizerOptions::default(),
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The theme used to compute the metadata of binary tokens
    pub fn theme(mut self, theme: RawTheme) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Fixed color ids, the position of a color being its id. Theme colors missing from it
    /// are an error.
    pub fn color_map(mut self, colors: Vec<String>) -> Self {
        self.color_map = Some(colors);
        self
    }

    /// Where grammars are loaded from by [`crate::Registry::load_grammar`]
    pub fn loader(mut self, loader: Arc<dyn GrammarLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn regex_engine(mut self, engine: impl RegexEngine + 'static) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn tokenizer_options(mut self, options: TokenizerOptions) -> Self {
        self.tokenizer = options;
        self
    }
}

impl std::fmt::Debug for RegistryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryOptions")
            .field("theme", &self.theme.as_ref().and_then(|t| t.name.as_deref()))
            .field("color_map", &self.color_map)
            .field("has_loader", &self.loader.is_some())
            .field("engine", &self.engine)
            .field("tokenizer", &self.tokenizer)
            .finish()
    }
}

/// Per grammar settings for the binary tokens.
#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct GrammarConfiguration {
    /// Scope prefix to language id. Please do not use language id 0.
    pub(crate) embedded_languages: HashMap<String, u32>,
    /// Selector to token type, applied in order
    pub(crate) token_types: Vec<(String, StandardTokenType)>,
    pub(crate) balanced_bracket_selectors: Vec<String>,
    pub(crate) unbalanced_bracket_selectors: Vec<String>,
}

impl GrammarConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedded_language(mut self, scope_name: impl Into<String>, language_id: u32) -> Self {
        self.embedded_languages.insert(scope_name.into(), language_id);
        self
    }

    /// Forces the token type of the tokens matching the selector
    pub fn token_type(mut self, selector: impl Into<String>, token_type: StandardTokenType) -> Self {
        self.token_types.push((selector.into(), token_type));
        self
    }

    /// Tokens matching these selectors can contain balanced brackets. `*` matches everything.
    pub fn balanced_bracket_selectors(mut self, selectors: Vec<String>) -> Self {
        self.balanced_bracket_selectors = selectors;
        self
    }

    /// Tokens matching these selectors never contain balanced brackets
    pub fn unbalanced_bracket_selectors(mut self, selectors: Vec<String>) -> Self {
        self.unbalanced_bracket_selectors = selectors;
        self
    }
}
