//! Lexer for tokenizing rule patterns
//!
//! This module provides a tokenizer that converts pattern strings written in
//! the Python `re` dialect into a stream of tokens for parsing. Group
//! extensions (`(?:`, `(?=`, `(?P<name>` ...) and bounded repeats are
//! recognised here so the parser only sees whole constructs.

use std::fmt;

use crate::ast::Quantifier;
use crate::error::{LexerErrorKind, ParseError};

/// A token in a rule pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Left parenthesis `(` (capturing group)
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Left bracket `[` (start of character class)
    LeftBracket,
    /// Right bracket `]` (end of character class)
    RightBracket,
    /// Pipe `|` (alternation)
    Pipe,
    /// Caret `^` (start anchor or negation in character class)
    Caret,
    /// Dollar `$` (end anchor)
    Dollar,
    /// Dot `.` (any character)
    Dot,
    /// Any repetition operator: `*`, `+`, `?`, `{n,m}`, with optional lazy `?`
    Quantifier(Quantifier),
    /// Non-capturing group marker `(?:`
    NonCapturing,
    /// Positive lookahead marker `(?=`
    Lookahead,
    /// Negative lookahead marker `(?!`
    NegativeLookahead,
    /// Positive lookbehind marker `(?<=`
    Lookbehind,
    /// Negative lookbehind marker `(?<!`
    NegativeLookbehind,
    /// Named group start `(?P<name>` or `(?<name>`
    NamedGroupStart(String),
    /// Conditional group start `(?(id)`
    ConditionalStart(String),
    /// Inline flags `(?imsx)`
    Flags(String),
    /// Scoped flags group start `(?i:`
    FlagsGroup(String),
    /// An escaped character, already decoded (e.g. `\n` is a newline)
    Escape(char),
    /// A backreference by number (e.g., \1, \2)
    BackrefNumber(u32),
    /// A backreference by name `(?P=name)`
    BackrefName(String),
    /// Word character shorthand (\w)
    WordChar,
    /// Non-word character shorthand (\W)
    NonWordChar,
    /// Digit shorthand (\d)
    Digit,
    /// Non-digit shorthand (\D)
    NonDigit,
    /// Whitespace shorthand (\s)
    Whitespace,
    /// Non-whitespace shorthand (\S)
    NonWhitespace,
    /// Word boundary assertion (\b)
    WordBoundary,
    /// Non-word boundary assertion (\B)
    NonWordBoundary,
    /// Start of input (\A)
    StartOfInput,
    /// End of input (\Z)
    EndOfInput,
    /// A literal character
    Literal(char),
    /// End of input
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LeftParen => write!(f, "`(`"),
            Token::RightParen => write!(f, "`)`"),
            Token::LeftBracket => write!(f, "`[`"),
            Token::RightBracket => write!(f, "`]`"),
            Token::Pipe => write!(f, "`|`"),
            Token::Caret => write!(f, "`^`"),
            Token::Dollar => write!(f, "`$`"),
            Token::Dot => write!(f, "`.`"),
            Token::Quantifier(q) => write!(f, "quantifier `{{{},{:?}}}`", q.min, q.max),
            Token::NonCapturing => write!(f, "`(?:`"),
            Token::Lookahead => write!(f, "`(?=`"),
            Token::NegativeLookahead => write!(f, "`(?!`"),
            Token::Lookbehind => write!(f, "`(?<=`"),
            Token::NegativeLookbehind => write!(f, "`(?<!`"),
            Token::NamedGroupStart(name) => write!(f, "named group `{}`", name),
            Token::ConditionalStart(id) => write!(f, "conditional `(?({})`", id),
            Token::Flags(flags) => write!(f, "flags `(?{})`", flags),
            Token::FlagsGroup(flags) => write!(f, "flags group `(?{}:`", flags),
            Token::Escape(c) => write!(f, "escape `{}`", c.escape_default()),
            Token::BackrefNumber(n) => write!(f, "backref `\\{}`", n),
            Token::BackrefName(name) => write!(f, "backref `(?P={})`", name),
            Token::WordChar => write!(f, "shorthand `\\w`"),
            Token::NonWordChar => write!(f, "shorthand `\\W`"),
            Token::Digit => write!(f, "shorthand `\\d`"),
            Token::NonDigit => write!(f, "shorthand `\\D`"),
            Token::Whitespace => write!(f, "shorthand `\\s`"),
            Token::NonWhitespace => write!(f, "shorthand `\\S`"),
            Token::WordBoundary => write!(f, "boundary `\\b`"),
            Token::NonWordBoundary => write!(f, "boundary `\\B`"),
            Token::StartOfInput => write!(f, "anchor `\\A`"),
            Token::EndOfInput => write!(f, "anchor `\\Z`"),
            Token::Literal(c) => write!(f, "literal `{}`", c),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Lexer for tokenizing rule patterns
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    /// Whether we're currently inside a character class
    in_char_class: bool,
    /// Whether the class was just opened (a `]` here is literal)
    class_start: bool,
    /// Verbose mode: unescaped whitespace and `#` comments are ignored
    verbose: bool,
}

impl Lexer {
    /// Create a new lexer for the given input string
    ///
    /// Verbose mode is switched on when the pattern opens with inline flags
    /// containing `x`.
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let verbose = leading_flags(&chars).is_some_and(|flags| flags.contains('x'));
        Lexer {
            chars,
            position: 0,
            in_char_class: false,
            class_start: false,
            verbose,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) {
        self.position += 1;
    }

    fn error(&self, kind: LexerErrorKind) -> ParseError {
        ParseError::Lexer {
            position: self.position,
            kind,
        }
    }

    /// Read characters up to (not including) `end`; consumes `end`
    fn read_until(&mut self, end: char) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.current() {
                Some(c) if c == end => {
                    self.advance();
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
                None => return Err(self.error(LexerErrorKind::UnclosedGroup)),
            }
        }
    }

    /// Read a group name and check it is an identifier
    fn read_group_name(&mut self, end: char) -> Result<String, ParseError> {
        let name = self.read_until(end)?;
        let valid = name
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if valid {
            Ok(name)
        } else {
            Err(self.error(LexerErrorKind::InvalidGroupName(name)))
        }
    }

    /// Read `count` hex digits into a character
    fn read_hex(&mut self, count: usize, marker: char) -> Result<char, ParseError> {
        let mut digits = String::new();
        for _ in 0..count {
            match self.current() {
                Some(c) if c.is_ascii_hexdigit() => {
                    digits.push(c);
                    self.advance();
                }
                _ => {
                    return Err(self.error(LexerErrorKind::InvalidEscape(format!(
                        "{}{}",
                        marker, digits
                    ))));
                }
            }
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                self.error(LexerErrorKind::InvalidEscape(format!("{}{}", marker, digits)))
            })
    }

    /// Read an escape sequence (assumes backslash was already consumed)
    fn read_escape(&mut self) -> Result<Token, ParseError> {
        let Some(c) = self.current() else {
            return Err(self.error(LexerErrorKind::InvalidEscape(String::new())));
        };
        self.advance();
        let token = match c {
            'w' => Token::WordChar,
            'W' => Token::NonWordChar,
            'd' => Token::Digit,
            'D' => Token::NonDigit,
            's' => Token::Whitespace,
            'S' => Token::NonWhitespace,
            // Inside a class `\b` is a backspace
            'b' if self.in_char_class => Token::Escape('\x08'),
            'b' => Token::WordBoundary,
            'B' => Token::NonWordBoundary,
            'A' => Token::StartOfInput,
            'Z' => Token::EndOfInput,
            'n' => Token::Escape('\n'),
            't' => Token::Escape('\t'),
            'r' => Token::Escape('\r'),
            'f' => Token::Escape('\x0c'),
            'v' => Token::Escape('\x0b'),
            'a' => Token::Escape('\x07'),
            'x' => Token::Escape(self.read_hex(2, 'x')?),
            'u' => Token::Escape(self.read_hex(4, 'u')?),
            'U' => Token::Escape(self.read_hex(8, 'U')?),
            '0' => {
                // Octal escape: up to two more octal digits
                let mut value = 0u32;
                for _ in 0..2 {
                    match self.current().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            self.advance();
                        }
                        None => break,
                    }
                }
                Token::Escape(char::from_u32(value).unwrap_or('\0'))
            }
            c if c.is_ascii_digit() && !self.in_char_class => {
                // It's a backreference number (at most two digits)
                let mut num = c.to_digit(10).unwrap_or(0);
                if let Some(d) = self.current().and_then(|d| d.to_digit(10)) {
                    num = num * 10 + d;
                    self.advance();
                }
                Token::BackrefNumber(num)
            }
            c if c.is_ascii_alphanumeric() => {
                return Err(self.error(LexerErrorKind::InvalidEscape(c.to_string())));
            }
            c => Token::Escape(c),
        };
        Ok(token)
    }

    /// Read what follows `(?`
    fn read_extension(&mut self) -> Result<Option<Token>, ParseError> {
        let Some(c) = self.current() else {
            return Err(self.error(LexerErrorKind::UnclosedGroup));
        };
        self.advance();
        let token = match c {
            ':' => Token::NonCapturing,
            '=' => Token::Lookahead,
            '!' => Token::NegativeLookahead,
            '<' => match self.current() {
                Some('=') => {
                    self.advance();
                    Token::Lookbehind
                }
                Some('!') => {
                    self.advance();
                    Token::NegativeLookbehind
                }
                _ => Token::NamedGroupStart(self.read_group_name('>')?),
            },
            'P' => match self.current() {
                Some('<') => {
                    self.advance();
                    Token::NamedGroupStart(self.read_group_name('>')?)
                }
                Some('=') => {
                    self.advance();
                    Token::BackrefName(self.read_group_name(')')?)
                }
                _ => return Err(self.error(LexerErrorKind::UnknownExtension('P'))),
            },
            '(' => Token::ConditionalStart(self.read_until(')')?),
            '#' => {
                // Comment group, produces nothing
                self.read_until(')')?;
                return Ok(None);
            }
            c if is_flag_char(c) => {
                let mut flags = c.to_string();
                while let Some(f) = self.current() {
                    if is_flag_char(f) {
                        flags.push(f);
                        self.advance();
                    } else {
                        break;
                    }
                }
                match self.current() {
                    Some(')') => {
                        self.advance();
                        Token::Flags(flags)
                    }
                    Some(':') => {
                        self.advance();
                        Token::FlagsGroup(flags)
                    }
                    _ => return Err(self.error(LexerErrorKind::UnclosedGroup)),
                }
            }
            c => return Err(self.error(LexerErrorKind::UnknownExtension(c))),
        };
        Ok(Some(token))
    }

    /// Try to read a `{n}`, `{n,}`, `{,m}` or `{n,m}` repeat at the current
    /// `{`; anything else leaves the position untouched
    fn read_brace_repeat(&mut self) -> Option<Quantifier> {
        let start = self.position;
        self.advance(); // consume '{'
        let min = self.read_digits();
        let quantifier = if self.current() == Some(',') {
            self.advance();
            let max = self.read_digits();
            match (min, max) {
                (None, None) => None,
                (min, Some(max)) => Some(Quantifier::between(min.unwrap_or(0), max)),
                (Some(min), None) => Some(Quantifier::at_least(min)),
            }
        } else {
            min.map(Quantifier::exactly)
        };
        match quantifier {
            Some(q) if self.current() == Some('}') => {
                self.advance();
                Some(q)
            }
            _ => {
                self.position = start;
                None
            }
        }
    }

    fn read_digits(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(d) = self.current().and_then(|c| c.to_digit(10)) {
            value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(d));
            self.advance();
        }
        value
    }

    /// Apply a trailing lazy marker `?` to a quantifier
    fn finish_quantifier(&mut self, quantifier: Quantifier) -> Token {
        if self.current() == Some('?') {
            self.advance();
            Token::Quantifier(quantifier.lazy())
        } else {
            Token::Quantifier(quantifier)
        }
    }

    /// Skip whitespace and comments in verbose mode
    fn skip_verbose_trivia(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c) = self.current() {
                    self.advance();
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Next token inside a character class
    fn next_class_token(&mut self) -> Result<Token, ParseError> {
        let class_start = std::mem::replace(&mut self.class_start, false);
        match self.current() {
            None => Err(self.error(LexerErrorKind::UnclosedCharacterClass)),
            Some('^') if class_start => {
                self.advance();
                // `[^]...]` still treats the `]` as literal
                self.class_start = true;
                Ok(Token::Caret)
            }
            Some(']') if !class_start => {
                self.advance();
                self.in_char_class = false;
                Ok(Token::RightBracket)
            }
            Some('\\') => {
                self.advance();
                self.read_escape()
            }
            Some(c) => {
                self.advance();
                Ok(Token::Literal(c))
            }
        }
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        if self.in_char_class {
            return self.next_class_token();
        }
        if self.verbose {
            self.skip_verbose_trivia();
        }
        let Some(c) = self.current() else {
            return Ok(Token::Eof);
        };
        self.advance();
        let token = match c {
            '\\' => self.read_escape()?,
            '(' => {
                if self.current() == Some('?') {
                    self.advance();
                    match self.read_extension()? {
                        Some(token) => token,
                        None => return self.next_token(),
                    }
                } else {
                    Token::LeftParen
                }
            }
            ')' => Token::RightParen,
            '[' => {
                self.in_char_class = true;
                self.class_start = true;
                Token::LeftBracket
            }
            '|' => Token::Pipe,
            '^' => Token::Caret,
            '$' => Token::Dollar,
            '.' => Token::Dot,
            '*' => self.finish_quantifier(Quantifier::zero_or_more()),
            '+' => self.finish_quantifier(Quantifier::one_or_more()),
            '?' => self.finish_quantifier(Quantifier::optional()),
            '{' => {
                self.position -= 1;
                match self.read_brace_repeat() {
                    Some(q) => self.finish_quantifier(q),
                    None => {
                        self.advance();
                        Token::Literal('{')
                    }
                }
            }
            c => Token::Literal(c),
        };
        Ok(token)
    }

    /// Tokenize the entire input and return a vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}

fn is_flag_char(c: char) -> bool {
    matches!(c, 'a' | 'i' | 'L' | 'm' | 's' | 'u' | 'x' | '-')
}

/// Flags of a leading `(?flags)` group, if the pattern has one
fn leading_flags(chars: &[char]) -> Option<String> {
    if chars.len() < 3 || chars[0] != '(' || chars[1] != '?' {
        return None;
    }
    let flags: String = chars[2..].iter().take_while(|c| is_flag_char(**c)).collect();
    let close = chars.get(2 + flags.chars().count());
    (!flags.is_empty() && close == Some(&')')).then_some(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input).tokenize().unwrap()
    }

    #[test]
    fn test_literal_sequence() {
        assert_eq!(
            lex("abc"),
            vec![
                Token::Literal('a'),
                Token::Literal('b'),
                Token::Literal('c'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(lex(""), vec![Token::Eof]);
    }

    #[test]
    fn test_group_extensions() {
        assert_eq!(
            lex("(?:(?=(?!(?<=(?<!)))))"),
            vec![
                Token::NonCapturing,
                Token::Lookahead,
                Token::NegativeLookahead,
                Token::Lookbehind,
                Token::NegativeLookbehind,
                Token::RightParen,
                Token::RightParen,
                Token::RightParen,
                Token::RightParen,
                Token::RightParen,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_named_group_and_backref() {
        assert_eq!(
            lex("(?P<quote>')(?P=quote)"),
            vec![
                Token::NamedGroupStart("quote".to_string()),
                Token::Literal('\''),
                Token::RightParen,
                Token::BackrefName("quote".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_quantifiers() {
        assert_eq!(
            lex("a*b+?c?"),
            vec![
                Token::Literal('a'),
                Token::Quantifier(Quantifier::zero_or_more()),
                Token::Literal('b'),
                Token::Quantifier(Quantifier::one_or_more().lazy()),
                Token::Literal('c'),
                Token::Quantifier(Quantifier::optional()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_brace_repeats() {
        assert_eq!(
            lex("a{3,5}b{,2}c{4}"),
            vec![
                Token::Literal('a'),
                Token::Quantifier(Quantifier::between(3, 5)),
                Token::Literal('b'),
                Token::Quantifier(Quantifier::between(0, 2)),
                Token::Literal('c'),
                Token::Quantifier(Quantifier::exactly(4)),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_brace_that_is_not_a_repeat() {
        assert_eq!(
            lex("{x}"),
            vec![
                Token::Literal('{'),
                Token::Literal('x'),
                Token::Literal('}'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_character_class_is_literal_inside() {
        assert_eq!(
            lex("[]().*]"),
            vec![
                Token::LeftBracket,
                Token::Literal(']'),
                Token::Literal('('),
                Token::Literal(')'),
                Token::Literal('.'),
                Token::Literal('*'),
                Token::RightBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_negated_class() {
        assert_eq!(
            lex(r"[^\n]"),
            vec![
                Token::LeftBracket,
                Token::Caret,
                Token::Escape('\n'),
                Token::RightBracket,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(
            lex(r"\n\t\\\x41\."),
            vec![
                Token::Escape('\n'),
                Token::Escape('\t'),
                Token::Escape('\\'),
                Token::Escape('A'),
                Token::Escape('.'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_backreference_number() {
        assert_eq!(
            lex(r"\1\12"),
            vec![Token::BackrefNumber(1), Token::BackrefNumber(12), Token::Eof]
        );
    }

    #[test]
    fn test_flags_and_comments() {
        assert_eq!(
            lex("(?i)a(?#note)b"),
            vec![
                Token::Flags("i".to_string()),
                Token::Literal('a'),
                Token::Literal('b'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_verbose_mode_skips_whitespace() {
        assert_eq!(
            lex("(?x) a b  # trailing\n c"),
            vec![
                Token::Flags("x".to_string()),
                Token::Literal('a'),
                Token::Literal('b'),
                Token::Literal('c'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let err = Lexer::new("(?~x)").tokenize().unwrap_err();
        assert!(matches!(
            err,
            ParseError::Lexer {
                kind: LexerErrorKind::UnknownExtension('~'),
                ..
            }
        ));
    }

    #[test]
    fn test_unclosed_class_is_an_error() {
        assert!(Lexer::new("[abc").tokenize().is_err());
    }
}
