use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// A set of font style flags.
///
/// The bit values are the ones stored in the font style field of the packed token metadata.
/// An empty set is an explicit "no style" and overrides inherited styles, use
/// `Option<FontStyle>` where "not set" needs to be represented.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Debug,
)]
pub struct FontStyle {
    bits: u8,
}

impl FontStyle {
    /// Italic font style
    pub const ITALIC: Self = Self { bits: 1 };
    /// Bold font style
    pub const BOLD: Self = Self { bits: 2 };
    /// Underline font style
    pub const UNDERLINE: Self = Self { bits: 4 };
    /// Strikethrough font style
    pub const STRIKETHROUGH: Self = Self { bits: 8 };

    /// Returns an empty set of flags
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Builds a font style from raw bits, ignoring unknown ones
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self {
            bits: (bits & 0b1111) as u8,
        }
    }

    pub const fn bits(&self) -> u32 {
        self.bits as u32
    }

    /// Returns `true` if no flags are currently stored
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Returns `true` if all of the flags in `other` are contained within `self`
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Returns the font style from a theme font style string.
    /// Words are separated by spaces and anything unknown, like `normal`, is ignored.
    pub fn from_str(font_style_str: &str) -> Self {
        let mut font_style = Self::empty();
        for word in font_style_str.split(' ') {
            match word {
                "italic" => font_style.insert(FontStyle::ITALIC),
                "bold" => font_style.insert(FontStyle::BOLD),
                "underline" => font_style.insert(FontStyle::UNDERLINE),
                "strikethrough" => font_style.insert(FontStyle::STRIKETHROUGH),
                _ => (),
            }
        }
        font_style
    }

    /// Inserts the specified flags in-place
    pub fn insert(&mut self, other: Self) {
        self.bits |= other.bits;
    }
}

impl BitOr for FontStyle {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self {
            bits: self.bits | rhs.bits,
        }
    }
}

impl fmt::Display for FontStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        let names = [
            (FontStyle::ITALIC, "italic"),
            (FontStyle::BOLD, "bold"),
            (FontStyle::UNDERLINE, "underline"),
            (FontStyle::STRIKETHROUGH, "strikethrough"),
        ];
        let words: Vec<&str> = names
            .iter()
            .filter(|(style, _)| self.contains(*style))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&words.join(" "))
    }
}
