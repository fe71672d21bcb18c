//! Tokenizes text with TextMate grammars, producing the same tokens as
//! [vscode-textmate](https://github.com/microsoft/vscode-textmate).
//!
//! ```no_run
//! use textmate_tokenizer::{Registry, RegistryOptions, StateStack};
//! use textmate_tokenizer::grammars::RawGrammar;
//!
//! let registry = Registry::new(RegistryOptions::default())?;
//! let raw = RawGrammar::from_json(r#"{"scopeName": "source.a", "patterns": [{"match": "a", "name": "letter"}]}"#)?;
//! let grammar = registry.add_grammar(raw, Vec::new())?;
//!
//! let mut state = StateStack::initial();
//! for line in ["a b", "b a"] {
//!     let res = grammar.tokenize_line(line, &state, None)?;
//!     println!("{:?}", res.tokens);
//!     state = res.rule_stack;
//! }
//! # Ok::<(), textmate_tokenizer::Error>(())
//! ```

mod error;
pub mod grammars;
pub mod matcher;
mod options;
mod registry;
pub mod scope;
pub mod themes;
pub mod tokenizer;

pub use error::Error;
pub use grammars::{Grammar, RawGrammar};
pub use options::{GrammarConfiguration, RegistryOptions, TokenizerOptions};
pub use registry::{GrammarLoader, Registry};
pub use themes::{FontStyle, RawTheme, Theme};
pub use tokenizer::{
    StandardTokenType, StateStack, Token, TokenizeLineResult, TokenizeLineResult2, metadata,
};
