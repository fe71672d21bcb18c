//! Token attributes packed in a `u32`, the format of the binary tokenization output.
//!
//! ```text
//! 3322 2222 2222 1111 1111 1100 0000 0000
//! 1098 7654 3210 9876 5432 1098 7654 3210
//! bbbb bbbb bfff ffff ffFF FFTT LLLL LLLL
//! ```
//! - L: language id (8 bits)
//! - T: standard token type (2 bits)
//! - F: font style (4 bits)
//! - f: foreground color id (9 bits)
//! - b: background color id (9 bits)

use crate::themes::FontStyle;

const LANGUAGE_ID_MASK: u32 = 0b0000_0000_0000_0000_0000_0000_1111_1111;
const TOKEN_TYPE_MASK: u32 = 0b0000_0000_0000_0000_0000_0011_0000_0000;
const FONT_STYLE_MASK: u32 = 0b0000_0000_0000_0000_0011_1100_0000_0000;
const FOREGROUND_MASK: u32 = 0b0000_0000_0111_1111_1100_0000_0000_0000;
const BACKGROUND_MASK: u32 = 0b1111_1111_1000_0000_0000_0000_0000_0000;

const LANGUAGE_ID_OFFSET: u32 = 0;
const TOKEN_TYPE_OFFSET: u32 = 8;
const FONT_STYLE_OFFSET: u32 = 10;
const FOREGROUND_OFFSET: u32 = 14;
const BACKGROUND_OFFSET: u32 = 23;

/// The token types a grammar or a token type override can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StandardTokenType {
    #[default]
    Other = 0,
    Comment = 1,
    String = 2,
    RegEx = 3,
}

impl StandardTokenType {
    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            1 => StandardTokenType::Comment,
            2 => StandardTokenType::String,
            3 => StandardTokenType::RegEx,
            _ => StandardTokenType::Other,
        }
    }
}

pub fn get_language_id(metadata: u32) -> u32 {
    (metadata & LANGUAGE_ID_MASK) >> LANGUAGE_ID_OFFSET
}

pub fn get_token_type(metadata: u32) -> StandardTokenType {
    StandardTokenType::from_bits((metadata & TOKEN_TYPE_MASK) >> TOKEN_TYPE_OFFSET)
}

pub fn get_font_style(metadata: u32) -> FontStyle {
    FontStyle::from_bits_truncate((metadata & FONT_STYLE_MASK) >> FONT_STYLE_OFFSET)
}

pub fn get_foreground(metadata: u32) -> u32 {
    (metadata & FOREGROUND_MASK) >> FOREGROUND_OFFSET
}

pub fn get_background(metadata: u32) -> u32 {
    (metadata & BACKGROUND_MASK) >> BACKGROUND_OFFSET
}

/// Returns `metadata` with the given fields replaced.
/// A language id or color of 0 and `None` for the others keep the current value.
pub fn set(
    metadata: u32,
    language_id: u32,
    token_type: Option<StandardTokenType>,
    font_style: Option<FontStyle>,
    foreground: u32,
    background: u32,
) -> u32 {
    let language_id = if language_id == 0 {
        get_language_id(metadata)
    } else {
        language_id
    };
    let token_type = token_type.unwrap_or_else(|| get_token_type(metadata));
    let font_style = font_style.unwrap_or_else(|| get_font_style(metadata));
    let foreground = if foreground == 0 {
        get_foreground(metadata)
    } else {
        foreground
    };
    let background = if background == 0 {
        get_background(metadata)
    } else {
        background
    };

    ((language_id << LANGUAGE_ID_OFFSET) & LANGUAGE_ID_MASK)
        | (((token_type as u32) << TOKEN_TYPE_OFFSET) & TOKEN_TYPE_MASK)
        | ((font_style.bits() << FONT_STYLE_OFFSET) & FONT_STYLE_MASK)
        | ((foreground << FOREGROUND_OFFSET) & FOREGROUND_MASK)
        | ((background << BACKGROUND_OFFSET) & BACKGROUND_MASK)
}

/// Used in debug logs
pub fn to_binary_str(metadata: u32) -> String {
    format!("{metadata:032b}")
}
