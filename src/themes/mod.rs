mod color_map;
mod compiled;
mod font_style;
mod raw;
mod trie;

pub use color_map::ColorMap;
pub use compiled::{
    ParsedThemeRule, StyleAttributes, Theme, parse_theme, str_arr_cmp, str_cmp,
};
pub use font_style::FontStyle;
pub use raw::{RawScope, RawStyleSettings, RawTheme, RawThemeSetting};
pub use trie::{ThemeTrieElement, ThemeTrieRule};
