use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::TokenizerResult;

/// The style part of a theme entry, as found in VSCode and tmTheme-converted JSON themes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct RawStyleSettings {
    /// Space separated list of `italic`, `bold`, `underline` and `strikethrough`.
    /// An empty string is meaningful: it resets the inherited font style.
    #[serde(default)]
    pub font_style: Option<String>,
    #[serde(default)]
    pub foreground: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
}

/// The `scope` of a theme entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawScope {
    /// A comma separated list of selectors, eg `"source, something"`
    Single(String),
    /// A list of selectors, not split any further on commas
    Multiple(Vec<String>),
}

/// Custom deserializer for scope field that can be string or array
impl<'de> Deserialize<'de> for RawScope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ScopeVisitor;

        impl<'de> Visitor<'de> for ScopeVisitor {
            type Value = RawScope;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("string or array of strings")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(RawScope::Single(value.to_owned()))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut vec = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    vec.push(item);
                }
                Ok(RawScope::Multiple(vec))
            }
        }

        deserializer.deserialize_any(ScopeVisitor)
    }
}

/// One entry of a theme: the scopes it applies to and their style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawThemeSetting {
    /// Informative only
    #[serde(default)]
    pub name: Option<String>,
    /// A missing scope is the same as the empty scope: the entry sets the theme defaults
    #[serde(default)]
    pub scope: Option<RawScope>,
    /// Entries without settings are ignored
    #[serde(default)]
    pub settings: Option<RawStyleSettings>,
}

/// Raw theme as deserialized from JSON.
///
/// Only the token rules are read, everything else in the document (`colors`, `type`...)
/// is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawTheme {
    #[serde(default)]
    pub name: Option<String>,
    /// Token rules, named `tokenColors` in VSCode themes
    #[serde(default, alias = "tokenColors")]
    pub settings: Vec<RawThemeSetting>,
}

impl RawTheme {
    pub fn from_json(input: &str) -> TokenizerResult<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_read_vscode_theme_json() {
        let theme = RawTheme::from_json(
            r##"{
                "name": "test",
                "type": "dark",
                "colors": {"editor.foreground": "#ffffff"},
                "tokenColors": [
                    {"settings": {"foreground": "#F8F8F2", "background": "#272822"}},
                    {"name": "Comment", "scope": "comment, string", "settings": {"fontStyle": "italic"}},
                    {"scope": ["constant", "variable"], "settings": {"foreground": "#AE81FF"}},
                    {"scope": "nothing"}
                ]
            }"##,
        )
        .unwrap();

        assert_eq!(theme.name.as_deref(), Some("test"));
        assert_eq!(theme.settings.len(), 4);
        assert_eq!(theme.settings[0].scope, None);
        assert_eq!(
            theme.settings[1].scope,
            Some(RawScope::Single("comment, string".to_string()))
        );
        assert_eq!(
            theme.settings[2].scope,
            Some(RawScope::Multiple(vec![
                "constant".to_string(),
                "variable".to_string()
            ]))
        );
        assert_eq!(
            theme.settings[1].settings.as_ref().unwrap().font_style.as_deref(),
            Some("italic")
        );
        assert!(theme.settings[3].settings.is_none());
    }

    #[test]
    fn settings_key_is_also_accepted() {
        let theme =
            RawTheme::from_json(r##"{"settings": [{"scope": "a", "settings": {}}]}"##).unwrap();
        assert_eq!(theme.settings.len(), 1);
        assert_eq!(theme.settings[0].settings, Some(RawStyleSettings::default()));
    }
}
