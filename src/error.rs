use std::fmt;
use std::sync::Arc;

pub(crate) type TokenizerResult<T> = Result<T, Error>;

/// Errors that can occur while loading grammars, building themes or tokenizing.
///
/// Cloneable since a failed grammar load is reported to every caller waiting on it.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// JSON parsing failed when reading a grammar or a theme.
    Json(Arc<serde_json::Error>),

    /// A regex could not be compiled by the regex engine.
    /// Patterns are only compiled when a rule is first scanned, and some end patterns
    /// are built at runtime from backreferences, so this can happen during tokenization.
    #[allow(missing_docs)]
    Regex { pattern: String, message: String },

    /// The grammar requested was never provided by the loader or added manually.
    GrammarNotFound(String),

    /// The grammar loader returned an error.
    Loader(String),

    /// A scope selector could not be parsed.
    #[allow(missing_docs)]
    InvalidSelector { selector: String, reason: String },

    /// A color was used by a theme but is missing from the color map given by the user.
    MissingColor(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(err) => write!(f, "JSON parsing error: {}", err),
            Error::Regex { pattern, message } => {
                write!(f, "invalid regex '{}': {}", pattern, message)
            }
            Error::GrammarNotFound(scope) => write!(f, "no grammar provided for <{}>", scope),
            Error::Loader(message) => write!(f, "grammar loader error: {}", message),
            Error::InvalidSelector { selector, reason } => {
                write!(f, "invalid scope selector '{}': {}", selector, reason)
            }
            Error::MissingColor(color) => write!(f, "missing color in color map - {}", color),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err.as_ref()),
            Error::Regex { .. }
            | Error::GrammarNotFound(_)
            | Error::Loader(_)
            | Error::InvalidSelector { .. }
            | Error::MissingColor(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::new(err))
    }
}
