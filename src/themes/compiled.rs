use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TokenizerResult;
use crate::scope::{ScopeStack, scope_matches};
use crate::themes::color_map::ColorMap;
use crate::themes::font_style::FontStyle;
use crate::themes::raw::{RawScope, RawTheme};
use crate::themes::trie::{ThemeTrieElement, ThemeTrieRule};

/// A theme rule after parsing, before being inserted in the trie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedThemeRule {
    /// The innermost scope of the selector, eg `bar` for `source.css selector bar`
    pub scope: String,
    /// The other selector segments, innermost first. `None` if there are none.
    pub parent_scopes: Option<Vec<String>>,
    /// Position of the entry in the theme, used to keep the theme order among equal rules
    pub index: usize,
    /// `None` is "not set", `Some(FontStyle::empty())` explicitly resets the font style
    pub font_style: Option<FontStyle>,
    pub foreground: Option<String>,
    pub background: Option<String>,
}

impl ParsedThemeRule {
    pub fn new(
        scope: &str,
        parent_scopes: Option<Vec<String>>,
        index: usize,
        font_style: Option<FontStyle>,
        foreground: Option<&str>,
        background: Option<&str>,
    ) -> Self {
        Self {
            scope: scope.to_string(),
            parent_scopes,
            index,
            font_style,
            foreground: foreground.map(|s| s.to_string()),
            background: background.map(|s| s.to_string()),
        }
    }
}

/// `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa` are accepted
fn is_valid_hex_color(hex: &str) -> bool {
    let Some(digits) = hex.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// Flattens a raw theme into one rule per selector.
///
/// Entries without settings are skipped and invalid colors are ignored.
pub fn parse_theme(source: Option<&RawTheme>) -> Vec<ParsedThemeRule> {
    let Some(source) = source else {
        return Vec::new();
    };

    let mut result = Vec::new();
    for (index, entry) in source.settings.iter().enumerate() {
        let Some(settings) = &entry.settings else {
            continue;
        };

        let scopes: Vec<&str> = match &entry.scope {
            Some(RawScope::Single(s)) => s
                .trim_start_matches(',')
                .trim_end_matches(',')
                .split(',')
                .collect(),
            Some(RawScope::Multiple(v)) => v.iter().map(|s| s.as_str()).collect(),
            None => vec![""],
        };

        let font_style = settings.font_style.as_deref().map(FontStyle::from_str);
        let foreground = settings
            .foreground
            .as_deref()
            .filter(|c| is_valid_hex_color(c));
        let background = settings
            .background
            .as_deref()
            .filter(|c| is_valid_hex_color(c));

        for scope in scopes {
            let segments: Vec<&str> = scope.trim().split(' ').collect();
            let Some((scope, parents)) = segments.split_last() else {
                continue;
            };
            let parent_scopes = if parents.is_empty() {
                None
            } else {
                Some(parents.iter().rev().map(|s| s.to_string()).collect())
            };

            result.push(ParsedThemeRule::new(
                scope,
                parent_scopes,
                index,
                font_style,
                foreground,
                background,
            ));
        }
    }

    result
}

pub fn str_cmp(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

/// Compares optional string arrays: missing first, then shorter arrays first,
/// then element by element.
pub fn str_arr_cmp(a: Option<&[String]>, b: Option<&[String]>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => {
            if a.len() != b.len() {
                return a.len().cmp(&b.len());
            }
            for (x, y) in a.iter().zip(b) {
                let res = str_cmp(x, y);
                if res != Ordering::Equal {
                    return res;
                }
            }
            Ordering::Equal
        }
    }
}

/// The style of a scope path, colors being ids in the theme color map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleAttributes {
    pub font_style: Option<FontStyle>,
    pub foreground_id: u32,
    pub background_id: u32,
}

impl StyleAttributes {
    pub fn new(font_style: Option<FontStyle>, foreground_id: u32, background_id: u32) -> Self {
        Self {
            font_style,
            foreground_id,
            background_id,
        }
    }
}

/// A theme ready to resolve scope paths to styles.
pub struct Theme {
    color_map: ColorMap,
    defaults: StyleAttributes,
    root: ThemeTrieElement,
    /// Trie lookups per innermost scope name
    cache: papaya::HashMap<String, Vec<ThemeTrieRule>>,
}

impl Theme {
    pub fn create_from_raw_theme(
        source: Option<&RawTheme>,
        color_map: Option<&[String]>,
    ) -> TokenizerResult<Self> {
        Self::create_from_parsed_theme(parse_theme(source), color_map)
    }

    pub fn create_from_parsed_theme(
        mut rules: Vec<ParsedThemeRule>,
        color_map: Option<&[String]>,
    ) -> TokenizerResult<Self> {
        rules.sort_by(|a, b| {
            str_cmp(&a.scope, &b.scope)
                .then_with(|| str_arr_cmp(a.parent_scopes.as_deref(), b.parent_scopes.as_deref()))
                .then_with(|| a.index.cmp(&b.index))
        });

        let mut default_font_style = FontStyle::empty();
        let mut default_foreground = "#000000".to_string();
        let mut default_background = "#ffffff".to_string();
        let defaults_count = rules.iter().take_while(|r| r.scope.is_empty()).count();
        for incoming in rules.drain(..defaults_count) {
            if let Some(font_style) = incoming.font_style {
                default_font_style = font_style;
            }
            if let Some(fg) = incoming.foreground {
                default_foreground = fg;
            }
            if let Some(bg) = incoming.background {
                default_background = bg;
            }
        }

        let mut color_map = match color_map {
            Some(colors) => ColorMap::frozen(colors),
            None => ColorMap::new(),
        };
        let defaults = StyleAttributes::new(
            Some(default_font_style),
            color_map.get_id(Some(&default_foreground))?,
            color_map.get_id(Some(&default_background))?,
        );

        let mut root = ThemeTrieElement::new(
            ThemeTrieRule::new(0, Vec::new(), None, 0, 0),
            Vec::new(),
            HashMap::new(),
        );
        for rule in &rules {
            let foreground = color_map.get_id(rule.foreground.as_deref())?;
            let background = color_map.get_id(rule.background.as_deref())?;
            root.insert(
                0,
                &rule.scope,
                rule.parent_scopes.as_deref(),
                rule.font_style,
                foreground,
                background,
            );
        }

        Ok(Self {
            color_map,
            defaults,
            root,
            cache: papaya::HashMap::new(),
        })
    }

    pub fn color_map(&self) -> &ColorMap {
        &self.color_map
    }

    pub fn defaults(&self) -> StyleAttributes {
        self.defaults
    }

    pub(crate) fn root(&self) -> &ThemeTrieElement {
        &self.root
    }

    /// Resolves the style of a scope path.
    /// `None` as path returns the theme defaults.
    pub fn match_scope_path(&self, scope_path: Option<&ScopeStack>) -> Option<StyleAttributes> {
        let Some(scope_path) = scope_path else {
            return Some(self.defaults);
        };

        let cache = self.cache.pin();
        let candidates = cache.get_or_insert_with(scope_path.scope_name().to_string(), || {
            self.root.find(scope_path.scope_name())
        });

        candidates
            .iter()
            .find(|rule| scope_path_matches_parent_scopes(scope_path.parent(), &rule.parent_scopes))
            .map(|rule| StyleAttributes::new(rule.font_style, rule.foreground, rule.background))
    }
}

impl fmt::Debug for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Theme")
            .field("color_map", &self.color_map)
            .field("defaults", &self.defaults)
            .field("root", &self.root)
            .finish()
    }
}

/// Whether the parent scopes (innermost first) occur in order when walking the path outwards.
/// A `>` requires the next parent scope to be the direct parent.
fn scope_path_matches_parent_scopes(
    mut scope_path: Option<&Arc<ScopeStack>>,
    parent_scopes: &[String],
) -> bool {
    let mut index = 0;
    while index < parent_scopes.len() {
        let mut pattern = parent_scopes[index].as_str();
        let mut must_match = false;

        if pattern == ">" {
            if index == parent_scopes.len() - 1 {
                return false;
            }
            index += 1;
            pattern = parent_scopes[index].as_str();
            must_match = true;
        }

        loop {
            let Some(current) = scope_path else {
                return false;
            };
            if scope_matches(current.scope_name(), pattern) {
                break;
            }
            if must_match {
                return false;
            }
            scope_path = current.parent();
        }

        scope_path = scope_path.and_then(|s| s.parent());
        index += 1;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::raw::{RawStyleSettings, RawThemeSetting};

    fn setting(scope: Option<&str>, fg: Option<&str>, bg: Option<&str>, fs: Option<&str>) -> RawThemeSetting {
        RawThemeSetting {
            name: None,
            scope: scope.map(|s| RawScope::Single(s.to_string())),
            settings: Some(RawStyleSettings {
                font_style: fs.map(|s| s.to_string()),
                foreground: fg.map(|s| s.to_string()),
                background: bg.map(|s| s.to_string()),
            }),
        }
    }

    fn theme(settings: Vec<RawThemeSetting>) -> Theme {
        Theme::create_from_raw_theme(
            Some(&RawTheme {
                name: None,
                settings,
            }),
            None,
        )
        .unwrap()
    }

    fn path(segments: &[&str]) -> Arc<ScopeStack> {
        ScopeStack::from_segments(segments).unwrap()
    }

    fn fg(theme: &Theme, segments: &[&str]) -> String {
        let style = theme.match_scope_path(Some(&path(segments))).unwrap();
        theme
            .color_map()
            .get_color(style.foreground_id)
            .unwrap_or_default()
            .to_string()
    }

    fn parents(p: &[&str]) -> Option<Vec<String>> {
        Some(p.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn deeper_matches_win_over_parent_matches() {
        let theme = theme(vec![
            setting(None, Some("#100000"), Some("#200000"), None),
            setting(
                Some("punctuation.definition.string.begin.html"),
                Some("#300000"),
                None,
                None,
            ),
            setting(
                Some("meta.tag punctuation.definition.string"),
                Some("#400000"),
                None,
                None,
            ),
        ]);
        assert_eq!(
            fg(&theme, &["punctuation.definition.string.begin.html"]),
            "#300000"
        );
        assert_eq!(
            fg(&theme, &["meta.tag", "punctuation.definition.string.begin.html"]),
            "#300000"
        );
    }

    #[test]
    fn parent_matches_have_priority_at_same_depth() {
        let theme = theme(vec![
            setting(None, Some("#100000"), Some("#200000"), None),
            setting(Some("c a"), Some("#300000"), None, None),
            setting(Some("d a.b"), Some("#400000"), None, None),
            setting(Some("a"), Some("#500000"), None, None),
        ]);
        assert_eq!(fg(&theme, &["d", "a.b"]), "#400000");
        assert_eq!(fg(&theme, &["c", "a.b"]), "#300000");
        assert_eq!(fg(&theme, &["a.b"]), "#500000");
    }

    #[test]
    fn longer_parent_scope_wins() {
        let theme = theme(vec![
            setting(None, Some("#100000"), Some("#200000"), None),
            setting(Some("meta.tag entity"), Some("#300000"), None, None),
            setting(
                Some("meta.selector.css entity.name.tag"),
                Some("#400000"),
                None,
                None,
            ),
            setting(Some("entity"), Some("#500000"), None, None),
        ]);
        assert_eq!(
            fg(
                &theme,
                &[
                    "text.html.cshtml",
                    "meta.tag.structure.any.html",
                    "entity.name.tag.structure.any.html",
                ]
            ),
            "#300000"
        );
    }

    #[test]
    fn child_combinator_requires_direct_parent() {
        let theme = theme(vec![
            setting(None, Some("#100000"), Some("#200000"), None),
            setting(Some("meta.tag > string"), Some("#300000"), None, None),
        ]);
        assert_eq!(fg(&theme, &["meta.tag", "string.quoted"]), "#300000");
        assert_eq!(fg(&theme, &["meta.tag", "meta.attribute", "string"]), "");
    }

    #[test]
    fn can_match() {
        let theme = theme(vec![
            setting(None, Some("#F8F8F2"), Some("#272822"), None),
            setting(Some("source, something"), None, Some("#100000"), None),
            RawThemeSetting {
                name: None,
                scope: Some(RawScope::Multiple(vec!["bar".to_string(), "baz".to_string()])),
                settings: Some(RawStyleSettings {
                    background: Some("#200000".to_string()),
                    ..Default::default()
                }),
            },
            setting(Some("source.css selector bar"), None, None, Some("bold")),
            setting(Some("constant"), Some("#300000"), None, Some("italic")),
            setting(Some("constant.numeric"), Some("#400000"), None, None),
            setting(Some("constant.numeric.hex"), None, None, Some("bold")),
            setting(
                Some("constant.numeric.oct"),
                None,
                None,
                Some("bold italic underline"),
            ),
            setting(Some("constant.numeric.dec"), Some("#500000"), None, Some("")),
            setting(Some("storage.object.bar"), Some("#600000"), None, Some("")),
        ]);

        let describe = |segments: &[&str]| -> String {
            let style = theme.match_scope_path(Some(&path(segments))).unwrap();
            let mut out = match style.font_style {
                Some(fs) => fs.to_string(),
                None => "not set".to_string(),
            };
            if let Some(c) = theme.color_map().get_color(style.foreground_id) {
                out.push_str(&format!(" fg={c}"));
            }
            if let Some(c) = theme.color_map().get_color(style.background_id) {
                out.push_str(&format!(" bg={c}"));
            }
            out
        };

        let cases: &[(&[&str], &str)] = &[
            (&["source"], "not set bg=#100000"),
            (&["source.ts"], "not set bg=#100000"),
            (&["source.tss"], "not set bg=#100000"),
            (&["something"], "not set bg=#100000"),
            (&["something.ts"], "not set bg=#100000"),
            (&["something.tss"], "not set bg=#100000"),
            (&["baz"], "not set bg=#200000"),
            (&["baz.ts"], "not set bg=#200000"),
            (&["baz.tss"], "not set bg=#200000"),
            (&["constant"], "italic fg=#300000"),
            (&["constant.string"], "italic fg=#300000"),
            (&["constant.hex"], "italic fg=#300000"),
            (&["constant.numeric"], "italic fg=#400000"),
            (&["constant.numeric.baz"], "italic fg=#400000"),
            (&["constant.numeric.hex"], "bold fg=#400000"),
            (&["constant.numeric.hex.baz"], "bold fg=#400000"),
            (&["constant.numeric.oct"], "italic bold underline fg=#400000"),
            (&["constant.numeric.oct.baz"], "italic bold underline fg=#400000"),
            (&["constant.numeric.dec"], "none fg=#500000"),
            (&["constant.numeric.dec.baz"], "none fg=#500000"),
            (&["storage.object.bar"], "none fg=#600000"),
            (&["storage.object.bar.baz"], "none fg=#600000"),
            (&["storage.object.bart"], "not set"),
            (&["storage.object"], "not set"),
            (&["storage"], "not set"),
            (&[""], "not set"),
            (&["bazz"], "not set"),
            (&["asdfg"], "not set"),
            (&["bar"], "not set bg=#200000"),
            (&["source.css", "selector", "bar"], "bold bg=#200000"),
        ];

        for (segments, expected) in cases {
            assert_eq!(describe(segments), *expected, "{segments:?}");
        }
    }

    #[test]
    fn same_selector_later_rule_wins() {
        // Microsoft/vscode#23460
        let theme = theme(vec![
            setting(None, Some("#aec2e0"), Some("#14191f"), None),
            setting(
                Some("meta.structure.dictionary.json string.quoted.double.json"),
                Some("#FF410D"),
                None,
                None,
            ),
            setting(
                Some("meta.structure.dictionary.json string.quoted.double.json"),
                Some("#ffffff"),
                None,
                None,
            ),
            setting(
                Some("meta.structure.dictionary.value.json string.quoted.double.json"),
                Some("#FF410D"),
                None,
                None,
            ),
        ]);
        assert_eq!(
            fg(
                &theme,
                &[
                    "source.json",
                    "meta.structure.dictionary.json",
                    "meta.structure.dictionary.value.json",
                    "string.quoted.double.json",
                ]
            ),
            "#FF410D"
        );
    }

    #[test]
    fn match_without_path_returns_defaults() {
        let theme = theme(vec![setting(None, Some("#aaaaaa"), None, Some("bold"))]);
        assert_eq!(theme.match_scope_path(None), Some(theme.defaults()));
        assert_eq!(theme.defaults().font_style, Some(FontStyle::BOLD));
        assert_eq!(theme.color_map().colors(), &["", "#AAAAAA", "#FFFFFF"]);
    }

    #[test]
    fn can_parse() {
        let raw = RawTheme {
            name: None,
            settings: vec![
                setting(None, Some("#F8F8F2"), Some("#272822"), None),
                setting(Some("source, something"), None, Some("#100000"), None),
                RawThemeSetting {
                    name: None,
                    scope: Some(RawScope::Multiple(vec!["bar".to_string(), "baz".to_string()])),
                    settings: Some(RawStyleSettings {
                        background: Some("#010000".to_string()),
                        ..Default::default()
                    }),
                },
                setting(Some("source.css selector bar"), None, None, Some("bold")),
                setting(Some("constant"), Some("#ff0000"), None, Some("italic")),
                setting(Some("constant.numeric"), Some("#00ff00"), None, None),
                setting(Some("constant.numeric.hex"), None, None, Some("bold")),
                setting(
                    Some("constant.numeric.oct"),
                    None,
                    None,
                    Some("bold italic underline"),
                ),
                setting(
                    Some("constant.numeric.bin"),
                    None,
                    None,
                    Some("bold strikethrough"),
                ),
                setting(Some("constant.numeric.dec"), Some("#0000ff"), None, Some("")),
                setting(Some("foo"), Some("#CFA"), None, Some("")),
            ],
        };

        let none = Some(FontStyle::empty());
        let expected = vec![
            ParsedThemeRule::new("", None, 0, None, Some("#F8F8F2"), Some("#272822")),
            ParsedThemeRule::new("source", None, 1, None, None, Some("#100000")),
            ParsedThemeRule::new("something", None, 1, None, None, Some("#100000")),
            ParsedThemeRule::new("bar", None, 2, None, None, Some("#010000")),
            ParsedThemeRule::new("baz", None, 2, None, None, Some("#010000")),
            ParsedThemeRule::new(
                "bar",
                parents(&["selector", "source.css"]),
                3,
                Some(FontStyle::BOLD),
                None,
                None,
            ),
            ParsedThemeRule::new("constant", None, 4, Some(FontStyle::ITALIC), Some("#ff0000"), None),
            ParsedThemeRule::new("constant.numeric", None, 5, None, Some("#00ff00"), None),
            ParsedThemeRule::new("constant.numeric.hex", None, 6, Some(FontStyle::BOLD), None, None),
            ParsedThemeRule::new(
                "constant.numeric.oct",
                None,
                7,
                Some(FontStyle::BOLD | FontStyle::ITALIC | FontStyle::UNDERLINE),
                None,
                None,
            ),
            ParsedThemeRule::new(
                "constant.numeric.bin",
                None,
                8,
                Some(FontStyle::BOLD | FontStyle::STRIKETHROUGH),
                None,
                None,
            ),
            ParsedThemeRule::new("constant.numeric.dec", None, 9, none, Some("#0000ff"), None),
            ParsedThemeRule::new("foo", None, 10, none, Some("#CFA"), None),
        ];

        assert_eq!(parse_theme(Some(&raw)), expected);
    }

    #[test]
    fn parse_ignores_invalid_colors() {
        // vscode-textmate#38
        let raw = RawTheme {
            name: None,
            settings: vec![
                setting(None, Some("#cccccc"), Some("#222222"), None),
                setting(Some("variable"), None, None, Some("")),
                setting(Some("variable.parameter"), Some(""), None, Some("italic")),
                setting(Some("support.other.variable"), None, None, Some("")),
                setting(Some("variable.other"), Some(""), None, Some("normal")),
                setting(
                    Some("variable.parameter.function.coffee"),
                    Some("#F9D423"),
                    None,
                    Some("italic"),
                ),
            ],
        };

        let none = Some(FontStyle::empty());
        let italic = Some(FontStyle::ITALIC);
        let expected = vec![
            ParsedThemeRule::new("", None, 0, None, Some("#cccccc"), Some("#222222")),
            ParsedThemeRule::new("variable", None, 1, none, None, None),
            ParsedThemeRule::new("variable.parameter", None, 2, italic, None, None),
            ParsedThemeRule::new("support.other.variable", None, 3, none, None, None),
            ParsedThemeRule::new("variable.other", None, 4, none, None, None),
            ParsedThemeRule::new(
                "variable.parameter.function.coffee",
                None,
                5,
                italic,
                Some("#F9D423"),
                None,
            ),
        ];
        assert_eq!(parse_theme(Some(&raw)), expected);
    }

    #[test]
    fn parse_handles_trailing_commas() {
        // vscode-textmate#35
        let scope = [
            "meta.at-rule.return.scss,",
            "meta.at-rule.return.scss punctuation.definition,",
            "meta.at-rule.else.scss,",
            "meta.at-rule.else.scss punctuation.definition,",
            "meta.at-rule.if.scss,",
            "meta.at-rule.if.scss punctuation.definition,",
        ]
        .join("\n");
        let raw = RawTheme {
            name: None,
            settings: vec![
                setting(None, Some("#EFEFEF"), Some("#25292C"), None),
                setting(Some(&scope), Some("#CC7832"), None, None),
            ],
        };

        let fg = Some("#CC7832");
        let expected = vec![
            ParsedThemeRule::new("", None, 0, None, Some("#EFEFEF"), Some("#25292C")),
            ParsedThemeRule::new("meta.at-rule.return.scss", None, 1, None, fg, None),
            ParsedThemeRule::new(
                "punctuation.definition",
                parents(&["meta.at-rule.return.scss"]),
                1,
                None,
                fg,
                None,
            ),
            ParsedThemeRule::new("meta.at-rule.else.scss", None, 1, None, fg, None),
            ParsedThemeRule::new(
                "punctuation.definition",
                parents(&["meta.at-rule.else.scss"]),
                1,
                None,
                fg,
                None,
            ),
            ParsedThemeRule::new("meta.at-rule.if.scss", None, 1, None, fg, None),
            ParsedThemeRule::new(
                "punctuation.definition",
                parents(&["meta.at-rule.if.scss"]),
                1,
                None,
                fg,
                None,
            ),
        ];
        assert_eq!(parse_theme(Some(&raw)), expected);
    }

    #[test]
    fn parse_skips_entries_without_settings() {
        let raw = RawTheme {
            name: None,
            settings: vec![RawThemeSetting {
                name: Some("empty".to_string()),
                scope: Some(RawScope::Single("comment".to_string())),
                settings: None,
            }],
        };
        assert!(parse_theme(Some(&raw)).is_empty());
        assert!(parse_theme(None).is_empty());
    }

    #[test]
    fn str_cmp_sorts_lexicographically() {
        let mut values = vec!["bar", "z", "zu", "a", "ab", ""];
        values.sort_by(|a, b| str_cmp(a, b));
        assert_eq!(values, vec!["", "a", "ab", "bar", "z", "zu"]);
    }

    #[test]
    fn str_arr_cmp_works() {
        fn v(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        let a = v(&["a"]);
        let ab = v(&["a", "b"]);
        let ac = v(&["a", "c"]);
        let empty = v(&[]);

        let cases: &[(Option<&[String]>, Option<&[String]>, Ordering)] = &[
            (None, None, Ordering::Equal),
            (None, Some(&empty), Ordering::Less),
            (None, Some(&a), Ordering::Less),
            (Some(&empty), None, Ordering::Greater),
            (Some(&a), None, Ordering::Greater),
            (Some(&empty), Some(&empty), Ordering::Equal),
            (Some(&empty), Some(&a), Ordering::Less),
            (Some(&a), Some(&empty), Ordering::Greater),
            (Some(&a), Some(&a), Ordering::Equal),
            (Some(&ab), Some(&a), Ordering::Greater),
            (Some(&a), Some(&ab), Ordering::Less),
            (Some(&ab), Some(&ab), Ordering::Equal),
            (Some(&ab), Some(&ac), Ordering::Less),
            (Some(&ac), Some(&ab), Ordering::Greater),
        ];
        for (i, (x, y, expected)) in cases.iter().enumerate() {
            assert_eq!(str_arr_cmp(*x, *y), *expected, "case {i}");
        }
    }

    fn root_rule() -> ThemeTrieRule {
        ThemeTrieRule::new(0, Vec::new(), None, 0, 0)
    }

    fn leaf(rule: ThemeTrieRule) -> ThemeTrieElement {
        ThemeTrieElement::new(rule, Vec::new(), HashMap::new())
    }

    fn node(
        rule: ThemeTrieRule,
        with_parents: Vec<ThemeTrieRule>,
        children: Vec<(&str, ThemeTrieElement)>,
    ) -> ThemeTrieElement {
        ThemeTrieElement::new(
            rule,
            with_parents,
            children
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    fn resolve(rules: Vec<ParsedThemeRule>) -> Theme {
        Theme::create_from_parsed_theme(rules, None).unwrap()
    }

    fn expected_colors(colors: &[&str]) -> ColorMap {
        let mut map = ColorMap::new();
        for c in colors {
            map.get_id(Some(c)).unwrap();
        }
        map
    }

    #[test]
    fn resolving_always_has_defaults() {
        let theme = resolve(Vec::new());
        assert_eq!(theme.color_map(), &expected_colors(&["#000000", "#ffffff"]));
        assert_eq!(
            theme.defaults(),
            StyleAttributes::new(Some(FontStyle::empty()), 1, 2)
        );
        assert_eq!(theme.root(), &leaf(root_rule()));
    }

    #[test]
    fn resolving_respects_incoming_defaults() {
        let cases = [
            (
                ParsedThemeRule::new("", None, 0, None, None, None),
                StyleAttributes::new(Some(FontStyle::empty()), 1, 2),
                ["#000000", "#ffffff"],
            ),
            (
                ParsedThemeRule::new("", None, 0, Some(FontStyle::empty()), None, None),
                StyleAttributes::new(Some(FontStyle::empty()), 1, 2),
                ["#000000", "#ffffff"],
            ),
            (
                ParsedThemeRule::new("", None, 0, Some(FontStyle::BOLD), None, None),
                StyleAttributes::new(Some(FontStyle::BOLD), 1, 2),
                ["#000000", "#ffffff"],
            ),
            (
                ParsedThemeRule::new("", None, 0, None, Some("#ff0000"), None),
                StyleAttributes::new(Some(FontStyle::empty()), 1, 2),
                ["#ff0000", "#ffffff"],
            ),
            (
                ParsedThemeRule::new("", None, 0, None, None, Some("#ff0000")),
                StyleAttributes::new(Some(FontStyle::empty()), 1, 2),
                ["#000000", "#ff0000"],
            ),
        ];

        for (rule, defaults, colors) in cases {
            let theme = resolve(vec![rule]);
            assert_eq!(theme.defaults(), defaults);
            assert_eq!(theme.color_map(), &expected_colors(&colors));
            assert_eq!(theme.root(), &leaf(root_rule()));
        }
    }

    #[test]
    fn resolving_merges_incoming_defaults() {
        let theme = resolve(vec![
            ParsedThemeRule::new("", None, 0, None, None, Some("#ff0000")),
            ParsedThemeRule::new("", None, 0, None, Some("#00ff00"), None),
            ParsedThemeRule::new("", None, 0, Some(FontStyle::BOLD), None, None),
        ]);
        assert_eq!(theme.color_map(), &expected_colors(&["#00ff00", "#ff0000"]));
        assert_eq!(
            theme.defaults(),
            StyleAttributes::new(Some(FontStyle::BOLD), 1, 2)
        );
    }

    #[test]
    fn resolving_defaults_are_inherited() {
        let theme = resolve(vec![
            ParsedThemeRule::new("", None, 0, None, Some("#F8F8F2"), Some("#272822")),
            ParsedThemeRule::new("var", None, 0, None, Some("#ff0000"), None),
        ]);
        assert_eq!(
            theme.color_map(),
            &expected_colors(&["#F8F8F2", "#272822", "#ff0000"])
        );
        assert_eq!(
            theme.defaults(),
            StyleAttributes::new(Some(FontStyle::empty()), 1, 2)
        );
        assert_eq!(
            theme.root(),
            &node(
                root_rule(),
                vec![],
                vec![("var", leaf(ThemeTrieRule::new(1, vec![], None, 3, 0)))]
            )
        );
    }

    #[test]
    fn resolving_same_rules_get_merged() {
        let theme = resolve(vec![
            ParsedThemeRule::new("", None, 0, None, Some("#F8F8F2"), Some("#272822")),
            ParsedThemeRule::new("var", None, 1, Some(FontStyle::BOLD), None, None),
            ParsedThemeRule::new("var", None, 0, None, Some("#ff0000"), None),
        ]);
        assert_eq!(
            theme.root(),
            &node(
                root_rule(),
                vec![],
                vec![(
                    "var",
                    leaf(ThemeTrieRule::new(1, vec![], Some(FontStyle::BOLD), 3, 0))
                )]
            )
        );
    }

    #[test]
    fn resolving_rules_are_inherited() {
        let bold = Some(FontStyle::BOLD);
        let italic = Some(FontStyle::ITALIC);
        let theme = resolve(vec![
            ParsedThemeRule::new("", None, 0, None, Some("#F8F8F2"), Some("#272822")),
            ParsedThemeRule::new("var", None, 0, bold, Some("#ff0000"), None),
            ParsedThemeRule::new("var.identifier", None, 0, None, Some("#00ff00"), None),
            ParsedThemeRule::new("constant", None, 4, italic, Some("#100000"), None),
            ParsedThemeRule::new("constant.numeric", None, 5, None, Some("#200000"), None),
            ParsedThemeRule::new("constant.numeric.hex", None, 6, bold, None, None),
            ParsedThemeRule::new(
                "constant.numeric.oct",
                None,
                7,
                Some(FontStyle::BOLD | FontStyle::ITALIC | FontStyle::UNDERLINE),
                None,
                None,
            ),
            ParsedThemeRule::new(
                "constant.numeric.dec",
                None,
                8,
                Some(FontStyle::empty()),
                Some("#300000"),
                None,
            ),
        ]);

        // ids are given in sorted rule order
        let (c, d, e, f, g) = (3, 4, 5, 6, 7);
        assert_eq!(
            theme.color_map(),
            &expected_colors(&[
                "#F8F8F2", "#272822", "#100000", "#200000", "#300000", "#ff0000", "#00ff00"
            ])
        );
        let expected = node(
            root_rule(),
            vec![],
            vec![
                (
                    "var",
                    node(
                        ThemeTrieRule::new(1, vec![], bold, f, 0),
                        vec![],
                        vec![("identifier", leaf(ThemeTrieRule::new(2, vec![], bold, g, 0)))],
                    ),
                ),
                (
                    "constant",
                    node(
                        ThemeTrieRule::new(1, vec![], italic, c, 0),
                        vec![],
                        vec![(
                            "numeric",
                            node(
                                ThemeTrieRule::new(2, vec![], italic, d, 0),
                                vec![],
                                vec![
                                    ("hex", leaf(ThemeTrieRule::new(3, vec![], bold, d, 0))),
                                    (
                                        "oct",
                                        leaf(ThemeTrieRule::new(
                                            3,
                                            vec![],
                                            Some(
                                                FontStyle::BOLD
                                                    | FontStyle::ITALIC
                                                    | FontStyle::UNDERLINE,
                                            ),
                                            d,
                                            0,
                                        )),
                                    ),
                                    (
                                        "dec",
                                        leaf(ThemeTrieRule::new(
                                            3,
                                            vec![],
                                            Some(FontStyle::empty()),
                                            e,
                                            0,
                                        )),
                                    ),
                                ],
                            ),
                        )],
                    ),
                ),
            ],
        );
        assert_eq!(theme.root(), &expected);
    }

    #[test]
    fn resolving_rules_with_parent_scopes() {
        let theme = resolve(vec![
            ParsedThemeRule::new("", None, 0, None, Some("#F8F8F2"), Some("#272822")),
            ParsedThemeRule::new("var", None, 0, Some(FontStyle::BOLD), Some("#100000"), None),
            ParsedThemeRule::new("var.identifier", None, 0, None, Some("#200000"), None),
            ParsedThemeRule::new(
                "var",
                parents(&["source.css"]),
                1,
                Some(FontStyle::ITALIC),
                Some("#300000"),
                None,
            ),
            ParsedThemeRule::new(
                "var",
                parents(&["source.css"]),
                2,
                Some(FontStyle::UNDERLINE),
                None,
                None,
            ),
        ]);

        let (c, d, e) = (3, 4, 5);
        assert_eq!(
            theme.color_map(),
            &expected_colors(&["#F8F8F2", "#272822", "#100000", "#300000", "#200000"])
        );
        let css_rule = ThemeTrieRule::new(
            1,
            vec!["source.css".to_string()],
            Some(FontStyle::UNDERLINE),
            d,
            0,
        );
        let expected = node(
            root_rule(),
            vec![],
            vec![(
                "var",
                node(
                    ThemeTrieRule::new(1, vec![], Some(FontStyle::BOLD), c, 0),
                    vec![css_rule.clone()],
                    vec![(
                        "identifier",
                        node(
                            ThemeTrieRule::new(2, vec![], Some(FontStyle::BOLD), e, 0),
                            vec![css_rule],
                            vec![],
                        ),
                    )],
                ),
            )],
        );
        assert_eq!(theme.root(), &expected);
    }

    #[test]
    fn frozen_color_map_is_used_as_is() {
        let colors: Vec<String> = ["", "#FFFFFF", "#000000", "#FF0000"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let raw = RawTheme {
            name: None,
            settings: vec![
                setting(None, Some("#ffffff"), Some("#000000"), None),
                setting(Some("keyword"), Some("#ff0000"), None, None),
            ],
        };
        let theme = Theme::create_from_raw_theme(Some(&raw), Some(&colors)).unwrap();
        assert_eq!(theme.defaults(), StyleAttributes::new(Some(FontStyle::empty()), 1, 2));
        assert_eq!(
            theme
                .match_scope_path(Some(&path(&["keyword.control"])))
                .unwrap()
                .foreground_id,
            3
        );

        let raw = RawTheme {
            name: None,
            settings: vec![setting(Some("keyword"), Some("#00ff00"), None, None)],
        };
        assert!(Theme::create_from_raw_theme(Some(&raw), Some(&colors)).is_err());
    }
}
