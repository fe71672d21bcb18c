//! Scope paths and the scope name matching rules shared by themes and selectors.
//!
//! A scope name is a dot separated label like `constant.numeric.hex`. A selector segment
//! `constant.numeric` matches it since it is a prefix ending on a dot boundary.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A parent-linked stack of scope names, the last pushed name being the innermost one.
///
/// Pushing never modifies an existing stack so sub-paths are shared freely between
/// tokens and state frames.
#[derive(Clone)]
pub struct ScopeStack {
    parent: Option<Arc<ScopeStack>>,
    scope_name: String,
}

impl ScopeStack {
    pub fn new(parent: Option<Arc<ScopeStack>>, scope_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            parent,
            scope_name: scope_name.into(),
        })
    }

    /// Builds a stack from the outermost to the innermost segment.
    /// Returns `None` if there are no segments.
    pub fn from_segments<S: AsRef<str>>(segments: &[S]) -> Option<Arc<Self>> {
        Self::push_all(None, segments)
    }

    /// Pushes all the given names, outermost first, on top of `path`.
    pub fn push_all<S: AsRef<str>>(
        mut path: Option<Arc<Self>>,
        scope_names: &[S],
    ) -> Option<Arc<Self>> {
        for name in scope_names {
            path = Some(Self::new(path, name.as_ref()));
        }
        path
    }

    pub fn push(self: &Arc<Self>, scope_name: impl Into<String>) -> Arc<Self> {
        Self::new(Some(Arc::clone(self)), scope_name)
    }

    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn parent(&self) -> Option<&Arc<ScopeStack>> {
        self.parent.as_ref()
    }

    /// Walks the stack from the innermost scope outwards.
    pub fn iter(&self) -> impl Iterator<Item = &ScopeStack> {
        let mut current = Some(self);
        std::iter::from_fn(move || {
            let item = current?;
            current = item.parent.as_deref();
            Some(item)
        })
    }

    /// All the scope names, outermost first.
    pub fn segments(&self) -> Vec<String> {
        let mut out: Vec<String> = self.iter().map(|s| s.scope_name.clone()).collect();
        out.reverse();
        out
    }
}

impl PartialEq for ScopeStack {
    fn eq(&self, other: &Self) -> bool {
        let (mut a, mut b) = (self.iter(), other.iter());
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if std::ptr::eq(x, y) {
                        return true;
                    }
                    if x.scope_name != y.scope_name {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

impl Eq for ScopeStack {}

impl Hash for ScopeStack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for scope in self.iter() {
            scope.scope_name.hash(state);
        }
    }
}

// Deep paths would otherwise be dropped recursively, one native stack frame per scope.
impl Drop for ScopeStack {
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(node) = parent {
            parent = Arc::into_inner(node).and_then(|mut node| node.parent.take());
        }
    }
}

impl fmt::Display for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join(" "))
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeStack({self})")
    }
}

/// Whether `scope_name` is `pattern` or starts with `pattern` followed by a dot.
#[inline]
pub fn scope_matches(scope_name: &str, pattern: &str) -> bool {
    scope_name == pattern
        || (scope_name.len() > pattern.len()
            && scope_name.starts_with(pattern)
            && scope_name.as_bytes()[pattern.len()] == b'.')
}

/// The name matching primitive used with [`crate::matcher`] selectors: every identifier
/// needs to match a scope, in order, each one further in the stack than the previous one.
pub fn name_matcher<S: AsRef<str>>(identifiers: &[String], scopes: &[S]) -> bool {
    if scopes.len() < identifiers.len() {
        return false;
    }

    let mut last_index = 0;
    identifiers.iter().all(|identifier| {
        for (i, scope) in scopes.iter().enumerate().skip(last_index) {
            let scope = scope.as_ref();
            if !scope.is_empty() && scope_matches(scope, identifier) {
                last_index = i + 1;
                return true;
            }
        }
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_prefix_matching_respects_dots() {
        assert!(scope_matches("constant.numeric.hex", "constant.numeric"));
        assert!(scope_matches("constant.numeric", "constant.numeric"));
        assert!(!scope_matches("constant.numericx", "constant.numeric"));
        assert!(!scope_matches("constant", "constant.numeric"));
    }

    #[test]
    fn name_matcher_requires_ordered_subsequence() {
        let ids = vec!["text.html".to_string(), "source".to_string()];
        assert!(name_matcher(&ids, &["text.html.basic", "meta.embedded", "source.js"]));
        assert!(!name_matcher(&ids, &["source.js", "text.html.basic"]));
        assert!(!name_matcher(&ids, &["text.html.basic"]));
    }

    #[test]
    fn scope_stack_segments_are_outermost_first() {
        let stack = ScopeStack::from_segments(&["source.css", "meta.selector", "entity"]).unwrap();
        assert_eq!(stack.scope_name(), "entity");
        assert_eq!(
            stack.segments(),
            vec!["source.css", "meta.selector", "entity"]
        );
        assert_eq!(stack.to_string(), "source.css meta.selector entity");
        assert_eq!(stack.iter().count(), 3);
        assert!(ScopeStack::from_segments::<&str>(&[]).is_none());
    }

    #[test]
    fn deep_scope_stacks_compare_and_drop_without_recursing() {
        let names: Vec<String> = (0..200_000).map(|i| format!("meta.level{i}")).collect();
        let a = ScopeStack::from_segments(&names).unwrap();
        let b = ScopeStack::from_segments(&names).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, b.push("extra"));
        drop(a);
        drop(b);
    }
}
