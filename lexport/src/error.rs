//! Error types for the lexer translator
//!
//! This module provides error handling using the `thiserror` crate.
//! Errors are categorized by their source: pattern lexing, pattern parsing,
//! normalization, state graph compilation, or artifact output.

use thiserror::Error;

use crate::groups::GroupRegistryError;

/// Errors raised while turning a lexer table into a rule program
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// The pattern text could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Unrolling or cross-product expansion went past its cap
    #[error("expansion overflow: {combinations} alternatives exceed the limit of {limit}")]
    ExpansionOverflow {
        /// Number of alternatives the expansion would have produced
        combinations: usize,
        /// The configured limit
        limit: usize,
    },

    /// A lookaround or back-reference shape with no translation
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),

    /// No state table defines the referenced state
    #[error("unresolved state '{0}'")]
    UnresolvedState(String),

    /// Representative string generation ran out of attempts
    #[error("sampling exhausted after {attempts} attempts")]
    SamplingExhausted {
        /// Number of attempts made
        attempts: usize,
    },

    /// An action or rule shape the compiler does not recognize
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Writing an artifact failed
    #[error("i/o error: {0}")]
    Io(String),
}

/// How far an error reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Only the offending rule is skipped (or degraded)
    Rule,
    /// The current lexer is abandoned, the run continues
    Lexer,
    /// The whole run halts
    Run,
}

impl ConvertError {
    /// Classify the error by how much work it invalidates
    pub fn severity(&self) -> Severity {
        match self {
            ConvertError::ExpansionOverflow { .. } | ConvertError::SamplingExhausted { .. } => {
                Severity::Rule
            }
            ConvertError::Parse(_)
            | ConvertError::UnsupportedConstruct(_)
            | ConvertError::UnresolvedState(_)
            | ConvertError::Io(_) => Severity::Lexer,
            ConvertError::StructuralMismatch(_) => Severity::Run,
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Io(err.to_string())
    }
}

/// Specific kinds of pattern lexer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexerErrorKind {
    /// Unclosed character class (e.g., `[abc` without `]`)
    #[error("unclosed character class")]
    UnclosedCharacterClass,

    /// Invalid escape sequence
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(String),

    /// Unclosed group or group extension
    #[error("unclosed group")]
    UnclosedGroup,

    /// Invalid group name
    #[error("invalid group name '{0}'")]
    InvalidGroupName(String),

    /// Unknown `(?x` extension character
    #[error("unknown group extension '?{0}'")]
    UnknownExtension(char),
}

/// Errors that occur during pattern parsing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Errors that occur during tokenization
    #[error("lexer error at position {position}: {kind}")]
    Lexer {
        /// Position in the input where the error occurred
        position: usize,
        /// The specific kind of lexer error
        kind: LexerErrorKind,
    },

    /// Unexpected token encountered
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        /// What was expected
        expected: String,
        /// What was actually found
        found: String,
    },

    /// Unexpected end of input
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Group naming or reference problem
    #[error("{0}")]
    Group(#[from] GroupRegistryError),

    /// Invalid quantifier
    #[error("invalid quantifier: {0}")]
    InvalidQuantifier(String),
}

/// An error with the lexer, state and pattern it came from
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{lexer} [{state}]: {error} (pattern '{pattern}')")]
pub struct Diagnostic {
    /// Display name of the lexer being compiled
    pub lexer: String,
    /// Name of the state holding the offending rule
    pub state: String,
    /// Original pattern text of the offending rule
    pub pattern: String,
    /// The underlying error
    pub error: ConvertError,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(
        lexer: impl Into<String>,
        state: impl Into<String>,
        pattern: impl Into<String>,
        error: ConvertError,
    ) -> Self {
        Diagnostic {
            lexer: lexer.into(),
            state: state.into(),
            pattern: pattern.into(),
            error,
        }
    }

    /// Severity of the underlying error
    pub fn severity(&self) -> Severity {
        self.error.severity()
    }
}

/// Errors raised by the style pass
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    /// A style part that has no source-highlight equivalent
    #[error("could not translate style '{0}'")]
    Untranslatable(String),

    /// A colour that is not a `#rgb` / `#rrggbb` hex literal
    #[error("invalid colour '{0}'")]
    InvalidColor(String),

    /// The style uses no colours at all
    #[error("style '{0}' has an empty palette")]
    EmptyPalette(String),

    /// The style file is not valid JSON
    #[error("invalid style file: {0}")]
    Json(String),

    /// Writing an artifact failed
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for StyleError {
    fn from(err: serde_json::Error) -> Self {
        StyleError::Json(err.to_string())
    }
}

impl From<std::io::Error> for StyleError {
    fn from(err: std::io::Error) -> Self {
        StyleError::Io(err.to_string())
    }
}

/// Errors raised while loading a lexicon file
#[derive(Error, Debug)]
pub enum LexiconError {
    /// The file is not valid lexicon JSON
    #[error("invalid lexicon: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry that fits none of the rule shapes
    #[error("lexer '{lexer}', state '{state}': {message}")]
    InvalidEntry {
        /// Lexer holding the entry
        lexer: String,
        /// State holding the entry
        state: String,
        /// What is wrong with it
        message: String,
    },

    /// Two lexers share a display name
    #[error("duplicate lexer '{0}'")]
    DuplicateLexer(String),

    /// Reading the file failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a generation run
#[derive(Error, Debug)]
pub enum GenerateError {
    /// A lexer hit an error that invalidates the whole run
    #[error("run halted: {0}")]
    Halted(Diagnostic),

    /// A selected lexer is not in the lexicon
    #[error("unknown lexer '{0}'")]
    UnknownLexer(String),

    /// Writing a shared artifact failed
    #[error("could not write {}: {source}", path.display())]
    Io {
        /// File being written
        path: std::path::PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Result type alias for translation operations
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexer_error_display() {
        let err = ParseError::Lexer {
            position: 5,
            kind: LexerErrorKind::UnknownExtension('!'),
        };
        assert_eq!(
            err.to_string(),
            "lexer error at position 5: unknown group extension '?!'"
        );
    }

    #[test]
    fn test_parse_error_unexpected_token() {
        let err = ParseError::UnexpectedToken {
            expected: "`)`".to_string(),
            found: "EOF".to_string(),
        };
        assert_eq!(err.to_string(), "expected `)`, found EOF");
    }

    #[test]
    fn test_convert_error_from_parse_error() {
        let err: ConvertError = ParseError::UnexpectedEof.into();
        assert_eq!(err.to_string(), "parse error: unexpected end of input");
        assert_eq!(err.severity(), Severity::Lexer);
    }

    #[test]
    fn test_severity_classes() {
        let overflow = ConvertError::ExpansionOverflow {
            combinations: 2000,
            limit: 1000,
        };
        assert_eq!(overflow.severity(), Severity::Rule);
        assert_eq!(
            ConvertError::SamplingExhausted { attempts: 3 }.severity(),
            Severity::Rule
        );
        assert_eq!(
            ConvertError::UnresolvedState("x".into()).severity(),
            Severity::Lexer
        );
        assert_eq!(
            ConvertError::StructuralMismatch("x".into()).severity(),
            Severity::Run
        );
        assert!(Severity::Run > Severity::Lexer);
    }

    #[test]
    fn test_diagnostic_carries_context() {
        let diag = Diagnostic::new(
            "Example",
            "string",
            "(?!foo)",
            ConvertError::UnsupportedConstruct("negative lookahead".into()),
        );
        let text = diag.to_string();
        assert!(text.contains("Example"));
        assert!(text.contains("[string]"));
        assert!(text.contains("(?!foo)"));
        assert_eq!(diag.severity(), Severity::Lexer);
    }
}
