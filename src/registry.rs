use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};

use crate::error::{Error, TokenizerResult};
use crate::grammars::{DependencyProcessor, Grammar, GrammarEnv, RawGrammar, RegexEngine};
use crate::options::{GrammarConfiguration, RegistryOptions, TokenizerOptions};
use crate::themes::{RawTheme, Theme};

/// Where the registry gets grammars from.
#[async_trait]
pub trait GrammarLoader: Send + Sync {
    /// Returns `None` if the loader doesn't know that scope.
    /// Called at most once per scope name for a given registry.
    async fn load_grammar(&self, scope_name: &str) -> Result<Option<RawGrammar>, Error>;

    /// The scope names of the grammars to inject in the given grammar
    fn injections(&self, _scope_name: &str) -> Option<Vec<String>> {
        None
    }
}

/// A load started by one caller and awaited by everyone needing the same scope
type SharedLoad = Shared<BoxFuture<'static, TokenizerResult<()>>>;

/// The raw grammars known to a registry, shared with the loads in flight
#[derive(Default)]
struct GrammarStore {
    raw_grammars: RwLock<HashMap<String, Arc<RawGrammar>>>,
    /// Scope name to the scope names of the grammars injected in it
    injection_grammars: RwLock<HashMap<String, Vec<String>>>,
}

impl GrammarStore {
    fn insert(&self, raw_grammar: RawGrammar, injections: Option<Vec<String>>) {
        let scope_name = raw_grammar.scope_name.clone();
        log::debug!("[Registry] storing grammar {scope_name}");
        if let Some(injections) = injections {
            self.injection_grammars
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(scope_name.clone(), injections);
        }
        self.raw_grammars
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope_name, Arc::new(raw_grammar));
    }
}

/// Loads grammars and their dependencies, and owns the theme they all use.
///
/// Grammars are compiled once per scope name, the first configuration used for a scope
/// being the one kept.
pub struct Registry {
    loader: Option<Arc<dyn GrammarLoader>>,
    engine: Arc<dyn RegexEngine>,
    tokenizer_options: TokenizerOptions,
    theme: Arc<RwLock<Arc<Theme>>>,
    store: Arc<GrammarStore>,
    grammars: papaya::HashMap<String, Arc<Grammar>>,
    /// Every load ever started, finished or not
    loads: Mutex<HashMap<String, SharedLoad>>,
}

impl Registry {
    /// Errors if the theme uses a color missing from the given color map
    pub fn new(options: RegistryOptions) -> TokenizerResult<Self> {
        let theme =
            Theme::create_from_raw_theme(options.theme.as_ref(), options.color_map.as_deref())?;
        Ok(Self {
            loader: options.loader,
            engine: options.engine,
            tokenizer_options: options.tokenizer,
            theme: Arc::new(RwLock::new(Arc::new(theme))),
            store: Arc::new(GrammarStore::default()),
            grammars: papaya::HashMap::new(),
            loads: Mutex::new(HashMap::new()),
        })
    }

    /// Replaces the theme of the registry and of every grammar it created.
    pub fn set_theme(&self, theme: &RawTheme, color_map: Option<&[String]>) -> TokenizerResult<()> {
        let theme = Theme::create_from_raw_theme(Some(theme), color_map)?;
        *self.theme.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(theme);
        Ok(())
    }

    pub fn theme(&self) -> Arc<Theme> {
        Arc::clone(&self.theme.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The colors of the current theme, indexed by the color ids of the token metadata.
    /// Id 0 is unused.
    pub fn color_map(&self) -> Vec<String> {
        self.theme().color_map().colors().to_vec()
    }

    /// Adds a grammar without going through the loader, replacing any grammar with the same
    /// scope name. The grammars it includes must have been added or loaded before.
    pub fn add_grammar(
        &self,
        raw_grammar: RawGrammar,
        injections: Vec<String>,
    ) -> TokenizerResult<Arc<Grammar>> {
        let scope_name = raw_grammar.scope_name.clone();
        let injections = if injections.is_empty() {
            None
        } else {
            Some(injections)
        };
        self.store.insert(raw_grammar, injections);
        self.grammars.pin().remove(&scope_name);
        self.grammar_for_scope_name(&scope_name, 0, None)
    }

    /// Loads a grammar and everything it includes with the loader
    pub async fn load_grammar(&self, scope_name: &str) -> TokenizerResult<Arc<Grammar>> {
        self.load_dependencies(scope_name).await?;
        self.grammar_for_scope_name(scope_name, 0, None)
    }

    /// Same as [`Registry::load_grammar`] with the settings used for binary tokens.
    /// Grammars loaded this way report balanced brackets.
    pub async fn load_grammar_with_configuration(
        &self,
        scope_name: &str,
        initial_language_id: u32,
        configuration: &GrammarConfiguration,
    ) -> TokenizerResult<Arc<Grammar>> {
        self.load_dependencies(scope_name).await?;
        self.grammar_for_scope_name(scope_name, initial_language_id, Some(configuration))
    }

    /// A grammar that was already loaded or added
    pub fn grammar(&self, scope_name: &str) -> Option<Arc<Grammar>> {
        self.grammars.pin().get(scope_name).cloned()
    }

    /// The load of `scope_name`, started if nobody asked for that scope before.
    /// Failed loads are kept too: the loader is not asked again.
    fn shared_load(&self, loader: &Arc<dyn GrammarLoader>, scope_name: &str) -> SharedLoad {
        let mut loads = self.loads.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(load) = loads.get(scope_name) {
            return load.clone();
        }

        let loader = Arc::clone(loader);
        let store = Arc::clone(&self.store);
        let scope = scope_name.to_string();
        let load = async move {
            match loader.load_grammar(&scope).await? {
                Some(raw_grammar) => store.insert(raw_grammar, loader.injections(&scope)),
                None => log::warn!("[Registry] the loader has no grammar for {scope}"),
            }
            Ok::<_, Error>(())
        }
        .boxed()
        .shared();
        loads.insert(scope_name.to_string(), load.clone());
        load
    }

    /// Loads the grammar and its dependencies round by round, each round loading everything
    /// the previous one referenced.
    /// Scopes another caller is already loading are awaited rather than skipped.
    async fn load_dependencies(&self, scope_name: &str) -> TokenizerResult<()> {
        let mut processor = DependencyProcessor::new(scope_name);

        while !processor.queue.is_empty() {
            if let Some(loader) = &self.loader {
                let pending: Vec<SharedLoad> = {
                    let raw_grammars = self
                        .store
                        .raw_grammars
                        .read()
                        .unwrap_or_else(PoisonError::into_inner);
                    processor
                        .queue
                        .iter()
                        .map(|r| r.scope_name())
                        .filter(|s| !raw_grammars.contains_key(*s))
                        .map(|s| self.shared_load(loader, s))
                        .collect()
                };

                for res in join_all(pending).await {
                    res?;
                }
            }

            let raw_grammars = self
                .store
                .raw_grammars
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let injections = self
                .store
                .injection_grammars
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            processor.process_queue(&raw_grammars, &injections)?;
        }

        Ok(())
    }

    fn grammar_for_scope_name(
        &self,
        scope_name: &str,
        initial_language_id: u32,
        configuration: Option<&GrammarConfiguration>,
    ) -> TokenizerResult<Arc<Grammar>> {
        if let Some(grammar) = self.grammars.pin().get(scope_name) {
            return Ok(Arc::clone(grammar));
        }

        let raw_grammars = self
            .store
            .raw_grammars
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(base) = raw_grammars.get(scope_name) else {
            return Err(Error::GrammarNotFound(scope_name.to_string()));
        };
        let injections = self
            .store
            .injection_grammars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope_name)
            .cloned()
            .unwrap_or_default();

        let env = GrammarEnv {
            engine: Arc::clone(&self.engine),
            theme: Arc::clone(&self.theme),
            options: self.tokenizer_options,
        };
        let grammar = Arc::new(Grammar::compile(
            base,
            &raw_grammars,
            &injections,
            initial_language_id,
            configuration,
            env,
        )?);

        let grammars = self.grammars.pin();
        Ok(Arc::clone(
            grammars.get_or_insert(scope_name.to_string(), grammar),
        ))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut scopes: Vec<String> = self
            .store
            .raw_grammars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        scopes.sort();
        f.debug_struct("Registry")
            .field("grammars", &scopes)
            .field("engine", &self.engine)
            .field("tokenizer_options", &self.tokenizer_options)
            .finish()
    }
}
