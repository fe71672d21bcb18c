//! Scope lists carrying the token metadata resolved for them.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use onig::Regex;

use crate::scope::{ScopeStack, scope_matches};
use crate::themes::{StyleAttributes, Theme};
use crate::tokenizer::metadata::{self, StandardTokenType};

static STANDARD_TOKEN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(comment|string|regex|meta\.embedded)\b").expect("Invalid token type regex")
});

/// What the grammar configuration says about a scope, before any theme is involved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicScopeAttributes {
    pub language_id: u32,
    /// None when the scope name doesn't say anything about it
    pub token_type: Option<StandardTokenType>,
}

fn standard_token_type(scope_name: &str) -> Option<StandardTokenType> {
    let captures = STANDARD_TOKEN_TYPE.captures(scope_name)?;
    match captures.at(1)? {
        "comment" => Some(StandardTokenType::Comment),
        "string" => Some(StandardTokenType::String),
        "regex" => Some(StandardTokenType::RegEx),
        _ => Some(StandardTokenType::Other),
    }
}

/// Language ids and token types of scope names, cached per scope name.
pub struct BasicScopeAttributesProvider {
    default_attributes: BasicScopeAttributes,
    embedded_languages: Vec<(String, u32)>,
    cache: papaya::HashMap<String, BasicScopeAttributes>,
}

impl BasicScopeAttributesProvider {
    pub fn new(initial_language_id: u32, embedded_languages: &HashMap<String, u32>) -> Self {
        Self {
            default_attributes: BasicScopeAttributes {
                language_id: initial_language_id,
                token_type: None,
            },
            embedded_languages: embedded_languages
                .iter()
                .map(|(scope, id)| (scope.clone(), *id))
                .collect(),
            cache: papaya::HashMap::new(),
        }
    }

    pub fn default_attributes(&self) -> BasicScopeAttributes {
        self.default_attributes
    }

    /// The language is the one of the longest embedded language scope the scope name
    /// starts with, 0 if there isn't any.
    fn language_id(&self, scope_name: &str) -> u32 {
        self.embedded_languages
            .iter()
            .filter(|(scope, _)| scope_matches(scope_name, scope))
            .max_by_key(|(scope, _)| scope.len())
            .map(|(_, id)| *id)
            .unwrap_or(0)
    }

    pub fn get(&self, scope_name: &str) -> BasicScopeAttributes {
        let cache = self.cache.pin();
        *cache.get_or_insert_with(scope_name.to_string(), || BasicScopeAttributes {
            language_id: self.language_id(scope_name),
            token_type: standard_token_type(scope_name),
        })
    }
}

impl fmt::Debug for BasicScopeAttributesProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicScopeAttributesProvider")
            .field("default_attributes", &self.default_attributes)
            .field("embedded_languages", &self.embedded_languages)
            .finish()
    }
}

/// Everything needed to compute the metadata of a scope
#[derive(Clone, Copy)]
pub(crate) struct AttributeResolver<'a> {
    pub provider: &'a BasicScopeAttributesProvider,
    pub theme: &'a Theme,
}

/// A scope path with the metadata of its innermost scope, parent linked like [`ScopeStack`].
pub struct AttributedScopeStack {
    parent: Option<Arc<AttributedScopeStack>>,
    scope_path: Arc<ScopeStack>,
    token_attributes: u32,
}

impl AttributedScopeStack {
    pub(crate) fn create_root_and_lookup(
        scope_name: &str,
        token_attributes: u32,
        resolver: AttributeResolver,
    ) -> Arc<Self> {
        let scope_path = ScopeStack::new(None, scope_name);
        let token_attributes = Self::merge_attributes(
            token_attributes,
            resolver.provider.get(scope_name),
            resolver.theme.match_scope_path(Some(&scope_path)),
        );
        Arc::new(Self {
            parent: None,
            scope_path,
            token_attributes,
        })
    }

    pub fn scope_name(&self) -> &str {
        self.scope_path.scope_name()
    }

    pub fn scope_path(&self) -> &Arc<ScopeStack> {
        &self.scope_path
    }

    pub fn token_attributes(&self) -> u32 {
        self.token_attributes
    }

    pub fn parent(&self) -> Option<&Arc<AttributedScopeStack>> {
        self.parent.as_ref()
    }

    /// Outermost first
    pub fn scope_names(&self) -> Vec<String> {
        self.scope_path.segments()
    }

    /// Compares scope names and metadata of every level
    pub fn equals(a: Option<&Arc<Self>>, b: Option<&Arc<Self>>) -> bool {
        let (mut a, mut b) = (a, b);
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(x, y) {
                        return true;
                    }
                    if x.scope_name() != y.scope_name() || x.token_attributes != y.token_attributes
                    {
                        return false;
                    }
                    a = x.parent.as_ref();
                    b = y.parent.as_ref();
                }
                _ => return false,
            }
        }
    }

    pub fn merge_attributes(
        existing: u32,
        basic: BasicScopeAttributes,
        style: Option<StyleAttributes>,
    ) -> u32 {
        let (font_style, foreground, background) = match style {
            Some(style) => (style.font_style, style.foreground_id, style.background_id),
            None => (None, 0, 0),
        };
        metadata::set(
            existing,
            basic.language_id,
            basic.token_type,
            font_style,
            foreground,
            background,
        )
    }

    fn push_one(self: &Arc<Self>, scope_name: &str, resolver: AttributeResolver) -> Arc<Self> {
        let scope_path = self.scope_path.push(scope_name);
        let token_attributes = Self::merge_attributes(
            self.token_attributes,
            resolver.provider.get(scope_name),
            resolver.theme.match_scope_path(Some(&scope_path)),
        );
        Arc::new(Self {
            parent: Some(Arc::clone(self)),
            scope_path,
            token_attributes,
        })
    }

    /// Pushes a rule name, which can hold several space separated scopes
    pub(crate) fn push_attributed(
        self: &Arc<Self>,
        scope_path: Option<&str>,
        resolver: AttributeResolver,
    ) -> Arc<Self> {
        let Some(scope_path) = scope_path else {
            return Arc::clone(self);
        };
        let mut out = Arc::clone(self);
        for scope_name in scope_path.split(' ') {
            out = out.push_one(scope_name, resolver);
        }
        out
    }

    /// Same as [`Self::push_attributed`] but also works on an empty list, whose attributes
    /// are then `default_attributes`.
    pub(crate) fn push_onto(
        base: Option<&Arc<Self>>,
        scope_path: Option<&str>,
        default_attributes: u32,
        resolver: AttributeResolver,
    ) -> Option<Arc<Self>> {
        if let Some(base) = base {
            return Some(base.push_attributed(scope_path, resolver));
        }
        let mut names = scope_path?.split(' ');
        let first = names.next()?;
        let mut out = Self::create_root_and_lookup(first, default_attributes, resolver);
        for scope_name in names {
            out = out.push_one(scope_name, resolver);
        }
        Some(out)
    }

    #[cfg(test)]
    pub(crate) fn from_names(names: &[&str], token_attributes: u32) -> Option<Arc<Self>> {
        let mut out: Option<Arc<Self>> = None;
        for name in names {
            out = Some(Arc::new(Self {
                scope_path: match &out {
                    Some(parent) => parent.scope_path.push(*name),
                    None => ScopeStack::new(None, *name),
                },
                parent: out,
                token_attributes,
            }));
        }
        out
    }
}

impl Drop for AttributedScopeStack {
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            parent = Arc::into_inner(node).and_then(|mut node| node.parent.take());
        }
    }
}

impl fmt::Debug for AttributedScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.scope_path,
            metadata::to_binary_str(self.token_attributes)
        )
    }
}
