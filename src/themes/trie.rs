//! The theme trie: rules are stored under their scope name, one dot segment per level.
//!
//! Each node holds a main rule (no parent scopes) and the rules qualified by parent scopes.
//! Rules are inherited by children at insertion time so a lookup only has to find the deepest
//! node for a scope name.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::themes::FontStyle;

/// A resolved rule in the trie. Colors are color map ids, 0 meaning "not set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeTrieRule {
    /// How many segments of the scope name this rule was defined for
    pub scope_depth: usize,
    /// Parent scopes, innermost first. Empty for main rules.
    pub parent_scopes: Vec<String>,
    pub font_style: Option<FontStyle>,
    pub foreground: u32,
    pub background: u32,
}

impl ThemeTrieRule {
    pub fn new(
        scope_depth: usize,
        parent_scopes: Vec<String>,
        font_style: Option<FontStyle>,
        foreground: u32,
        background: u32,
    ) -> Self {
        Self {
            scope_depth,
            parent_scopes,
            font_style,
            foreground,
            background,
        }
    }

    fn accept_overwrite(
        &mut self,
        scope_depth: usize,
        font_style: Option<FontStyle>,
        foreground: u32,
        background: u32,
    ) {
        // Insertion happens in sorted order so depth can only grow
        if self.scope_depth <= scope_depth {
            self.scope_depth = scope_depth;
        }
        if font_style.is_some() {
            self.font_style = font_style;
        }
        if foreground != 0 {
            self.foreground = foreground;
        }
        if background != 0 {
            self.background = background;
        }
    }
}

/// Orders rules from the most to the least specific: deeper scope first, then longer parent
/// scope names (compared innermost first, skipping `>`), then more parent scopes.
pub(crate) fn cmp_by_specificity(a: &ThemeTrieRule, b: &ThemeTrieRule) -> Ordering {
    if a.scope_depth != b.scope_depth {
        return b.scope_depth.cmp(&a.scope_depth);
    }

    let mut a_idx = 0;
    let mut b_idx = 0;
    loop {
        if a.parent_scopes.get(a_idx).is_some_and(|s| s == ">") {
            a_idx += 1;
        }
        if b.parent_scopes.get(b_idx).is_some_and(|s| s == ">") {
            b_idx += 1;
        }
        if a_idx >= a.parent_scopes.len() || b_idx >= b.parent_scopes.len() {
            break;
        }

        let length_diff = b.parent_scopes[b_idx]
            .len()
            .cmp(&a.parent_scopes[a_idx].len());
        if length_diff != Ordering::Equal {
            return length_diff;
        }
        a_idx += 1;
        b_idx += 1;
    }

    b.parent_scopes.len().cmp(&a.parent_scopes.len())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeTrieElement {
    main_rule: ThemeTrieRule,
    rules_with_parent_scopes: Vec<ThemeTrieRule>,
    children: HashMap<String, ThemeTrieElement>,
}

impl ThemeTrieElement {
    pub fn new(
        main_rule: ThemeTrieRule,
        rules_with_parent_scopes: Vec<ThemeTrieRule>,
        children: HashMap<String, ThemeTrieElement>,
    ) -> Self {
        Self {
            main_rule,
            rules_with_parent_scopes,
            children,
        }
    }

    /// Returns the candidate rules for a scope name, most specific first
    pub fn find(&self, scope: &str) -> Vec<ThemeTrieRule> {
        if !scope.is_empty() {
            let (head, tail) = scope.split_once('.').unwrap_or((scope, ""));
            if let Some(child) = self.children.get(head) {
                return child.find(tail);
            }
        }

        let mut rules = self.rules_with_parent_scopes.clone();
        rules.push(self.main_rule.clone());
        // stable sort: insertion order breaks ties
        rules.sort_by(cmp_by_specificity);
        rules
    }

    pub fn insert(
        &mut self,
        scope_depth: usize,
        scope: &str,
        parent_scopes: Option<&[String]>,
        font_style: Option<FontStyle>,
        foreground: u32,
        background: u32,
    ) {
        if scope.is_empty() {
            self.insert_here(scope_depth, parent_scopes, font_style, foreground, background);
            return;
        }

        let (head, tail) = scope.split_once('.').unwrap_or((scope, ""));
        if !self.children.contains_key(head) {
            let child = ThemeTrieElement::new(
                self.main_rule.clone(),
                self.rules_with_parent_scopes.clone(),
                HashMap::new(),
            );
            self.children.insert(head.to_string(), child);
        }
        if let Some(child) = self.children.get_mut(head) {
            child.insert(
                scope_depth + 1,
                tail,
                parent_scopes,
                font_style,
                foreground,
                background,
            );
        }
    }

    fn insert_here(
        &mut self,
        scope_depth: usize,
        parent_scopes: Option<&[String]>,
        mut font_style: Option<FontStyle>,
        mut foreground: u32,
        mut background: u32,
    ) {
        let Some(parent_scopes) = parent_scopes else {
            self.main_rule
                .accept_overwrite(scope_depth, font_style, foreground, background);
            return;
        };

        if let Some(rule) = self
            .rules_with_parent_scopes
            .iter_mut()
            .find(|r| r.parent_scopes == parent_scopes)
        {
            rule.accept_overwrite(scope_depth, font_style, foreground, background);
            return;
        }

        // Unset fields are taken from the main rule
        if font_style.is_none() {
            font_style = self.main_rule.font_style;
        }
        if foreground == 0 {
            foreground = self.main_rule.foreground;
        }
        if background == 0 {
            background = self.main_rule.background;
        }

        self.rules_with_parent_scopes.push(ThemeTrieRule::new(
            scope_depth,
            parent_scopes.to_vec(),
            font_style,
            foreground,
            background,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(depth: usize, parents: &[&str]) -> ThemeTrieRule {
        ThemeTrieRule::new(
            depth,
            parents.iter().map(|s| s.to_string()).collect(),
            None,
            0,
            0,
        )
    }

    #[test]
    fn deeper_rules_are_more_specific() {
        assert_eq!(
            cmp_by_specificity(&rule(3, &[]), &rule(1, &["source.css"])),
            Ordering::Less
        );
    }

    #[test]
    fn longer_parent_scopes_are_more_specific() {
        let a = rule(1, &["meta.selector.css"]);
        let b = rule(1, &["meta.tag"]);
        assert_eq!(cmp_by_specificity(&a, &b), Ordering::Less);
        assert_eq!(cmp_by_specificity(&b, &a), Ordering::Greater);
    }

    #[test]
    fn child_combinator_is_skipped_when_comparing() {
        let a = rule(1, &[">", "meta.tag"]);
        let b = rule(1, &["meta.tag"]);
        // same names, `a` has more parent scopes
        assert_eq!(cmp_by_specificity(&a, &b), Ordering::Less);
    }

    #[test]
    fn find_falls_back_to_closest_ancestor() {
        let mut root = ThemeTrieElement::new(rule(0, &[]), Vec::new(), HashMap::new());
        root.insert(0, "constant.numeric", None, Some(FontStyle::BOLD), 1, 0);

        let found = root.find("constant.numeric.hex.rust");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scope_depth, 2);
        assert_eq!(found[0].foreground, 1);

        // `constant` was only created as an intermediate node
        let found = root.find("constant.language");
        assert_eq!(found[0].scope_depth, 0);
        assert_eq!(found[0].foreground, 0);
    }
}
