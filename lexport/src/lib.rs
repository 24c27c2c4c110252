//! Lexport Core Library
//!
//! Translates Pygments-style regex lexer tables into GNU source-highlight
//! language definitions. Patterns are parsed and normalized down to the
//! constructs the target supports, rule actions are resolved to flat token
//! names, and each lexer's state graph is compiled into nested rule blocks.

pub mod ast;
pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod generate;
pub mod groups;
pub mod lexer;
pub mod lexicon;
pub mod normalize;
pub mod parser;
pub mod resolve;
pub mod sample;
pub mod style;
pub mod token;

pub use ast::Expr;
pub use compiler::{CompileOptions, Compiler, Item, Program};
pub use config::Config;
pub use emit::{AliasMap, file_name, render};
pub use error::{
    ConvertError, Diagnostic, GenerateError, LexerErrorKind, LexiconError, ParseError, Result,
    Severity, StyleError,
};
pub use generate::{GenerateReport, Generator};
pub use groups::{GroupInfo, GroupRegistry, GroupRegistryError};
pub use lexer::{Lexer, Token};
pub use lexicon::{Action, Entry, GroupToken, LexerDef, Lexicon, NextState, Pattern, Rule};
pub use normalize::{NormalizeOptions, Normalized, TranspileResult, transpile, transpile_debug};
pub use parser::{Parser, parse};
pub use token::{Taxonomy, TokenType};

/// Compile one lexer of a lexicon to source-highlight text
pub fn compile_lexer(lexicon: &Lexicon, name: &str) -> std::result::Result<String, Diagnostic> {
    let lexer = lexicon.get(name).ok_or_else(|| {
        Diagnostic::new(
            name,
            lexicon::ROOT_STATE,
            "",
            ConvertError::UnsupportedConstruct(format!("unknown lexer '{}'", name)),
        )
    })?;
    let compiler = Compiler::new(lexicon, CompileOptions::default());
    compiler.compile(lexer).map(|program| render(&program))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end() {
        // lexicon JSON -> state graph -> rendered rule file
        let lexicon = Lexicon::from_json(
            r##"{"lexers": [{
                "name": "Example",
                "aliases": ["ex"],
                "filenames": ["*.ex"],
                "states": {
                    "root": [
                        {"words": ["if", "else"], "suffix": "\\b", "token": "Keyword"},
                        {"pattern": "\"", "token": "String", "next": "string"},
                        {"pattern": "(?:x|y)z", "token": "Name"}
                    ],
                    "string": [
                        {"pattern": "[^\"]+", "token": "String"},
                        {"pattern": "\"", "token": "String", "next": "#pop"}
                    ]
                }
            }]}"##,
        )
        .unwrap();
        let text = compile_lexer(&lexicon, "ex").unwrap();
        assert_eq!(
            text,
            "# autogenerated from pygments for Example\n\
             Token_Keyword = 'else\\b|if\\b'\n\
             # string state\n\
             state Token_String = '\"' begin\n\
             \x20\x20Token_String = '[^\"]+'\n\
             \x20\x20Token_String = '\"' exit\n\
             end\n\
             Token_Name = 'xz|yz'\n"
        );
    }

    #[test]
    fn test_unknown_lexer() {
        let lexicon = Lexicon::default();
        let err = compile_lexer(&lexicon, "nothing").unwrap_err();
        assert_eq!(err.severity(), Severity::Lexer);
    }
}
