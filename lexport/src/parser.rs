//! Parser for rule patterns
//!
//! This module provides a recursive descent parser that converts
//! tokens into an Abstract Syntax Tree (AST).
//!
//! Grammar (in order of precedence, lowest to highest):
//!   regex       := alternation
//!   alternation := sequence ( '|' sequence )*
//!   sequence    := quantified*
//!   quantified  := atom quantifier?
//!   atom        := literal | anchor | group | char_class | '.' | backref | shorthand
//!   group       := '(' alternation ')' | extension alternation ')'
//!   extension   := '(?:' | '(?=' | '(?!' | '(?<=' | '(?<!' | '(?P<name>'
//!                | '(?(id)' | '(?flags:'
//!   char_class  := '[' '^'? class_item+ ']'
//!   class_item  := char | char '-' char | shorthand

use crate::ast::{Boundary, CharacterClass, ClassItem, Expr};
use crate::error::ParseError;
use crate::groups::GroupRegistry;
use crate::lexer::{Lexer, Token};

/// Parser for rule patterns
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    registry: GroupRegistry,
}

impl Parser {
    /// Create a new parser for the given input string
    pub fn new(input: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            registry: GroupRegistry::new(),
        })
    }

    /// Advance to the next token
    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    /// Expect a specific token, error if not found
    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        if self.current_token == expected {
            self.advance()
        } else if self.current_token == Token::Eof {
            Err(ParseError::UnexpectedEof)
        } else {
            Err(ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: self.current_token.to_string(),
            })
        }
    }

    /// Parse the entire input and return the AST
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_alternation()?;

        // Ensure we've consumed all tokens
        if self.current_token != Token::Eof {
            return Err(ParseError::UnexpectedToken {
                expected: "EOF".to_string(),
                found: self.current_token.to_string(),
            });
        }

        Ok(expr)
    }

    /// Parse alternation (lowest precedence)
    /// alternation := sequence ( '|' sequence )*
    fn parse_alternation(&mut self) -> Result<Expr, ParseError> {
        let mut alternatives = vec![self.parse_sequence()?];

        while self.current_token == Token::Pipe {
            self.advance()?; // consume '|'
            alternatives.push(self.parse_sequence()?);
        }

        if alternatives.len() == 1 {
            Ok(alternatives.pop().unwrap_or(Expr::Empty))
        } else {
            Ok(Expr::Alternation(alternatives))
        }
    }

    /// Parse a sequence (concatenation)
    /// sequence := quantified*
    fn parse_sequence(&mut self) -> Result<Expr, ParseError> {
        let mut expressions = Vec::new();

        while !self.is_sequence_end() {
            expressions.push(self.parse_quantified()?);
        }

        Ok(match expressions.len() {
            0 => Expr::Empty,
            1 => expressions.pop().unwrap_or(Expr::Empty),
            _ => Expr::Sequence(expressions),
        })
    }

    /// Check if we've reached the end of a sequence
    fn is_sequence_end(&self) -> bool {
        matches!(
            self.current_token,
            Token::Eof | Token::RightParen | Token::Pipe
        )
    }

    /// Parse a quantified expression
    /// quantified := atom quantifier?
    fn parse_quantified(&mut self) -> Result<Expr, ParseError> {
        let atom = self.parse_atom()?;

        let Token::Quantifier(quantifier) = self.current_token else {
            return Ok(atom);
        };
        if matches!(atom, Expr::Empty | Expr::Flags(_) | Expr::Boundary(_)) {
            return Err(ParseError::InvalidQuantifier("nothing to repeat".to_string()));
        }
        if let Some(max) = quantifier.max
            && max < quantifier.min
        {
            return Err(ParseError::InvalidQuantifier(format!(
                "min repeat {} greater than max repeat {}",
                quantifier.min, max
            )));
        }
        self.advance()?;
        if matches!(self.current_token, Token::Quantifier(_)) {
            return Err(ParseError::InvalidQuantifier("multiple repeat".to_string()));
        }
        Ok(Expr::quantified(atom, quantifier))
    }

    /// Parse an atomic expression
    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let expr = match &self.current_token {
            Token::Literal(c) | Token::Escape(c) => Expr::Literal(*c),
            Token::Dot => Expr::Any,
            Token::Caret => Expr::Boundary(Boundary::Start),
            Token::Dollar => Expr::Boundary(Boundary::End),
            Token::StartOfInput => Expr::Boundary(Boundary::StartOfInput),
            Token::EndOfInput => Expr::Boundary(Boundary::EndOfInput),
            Token::WordBoundary => Expr::Boundary(Boundary::Word),
            Token::NonWordBoundary => Expr::Boundary(Boundary::NonWord),
            Token::WordChar => Expr::Shorthand('w'),
            Token::NonWordChar => Expr::Shorthand('W'),
            Token::Digit => Expr::Shorthand('d'),
            Token::NonDigit => Expr::Shorthand('D'),
            Token::Whitespace => Expr::Shorthand('s'),
            Token::NonWhitespace => Expr::Shorthand('S'),
            Token::BackrefNumber(n) => {
                Expr::Backreference(self.registry.validate_backref_number(*n)?)
            }
            Token::BackrefName(name) => Expr::Backreference(self.registry.resolve(name)?),
            Token::Flags(flags) => Expr::Flags(flags.clone()),
            Token::LeftBracket => return self.parse_char_class(),
            Token::LeftParen => {
                let index = self.registry.register_group(None)?;
                let body = self.parse_group_body()?;
                return Ok(Expr::group(index, body));
            }
            Token::NamedGroupStart(name) => {
                let name = name.clone();
                let index = self.registry.register_group(Some(name.clone()))?;
                let body = self.parse_group_body()?;
                return Ok(Expr::Group {
                    index,
                    name: Some(name),
                    expr: Box::new(body),
                });
            }
            Token::NonCapturing => {
                return Ok(Expr::NonCapturingGroup(Box::new(self.parse_group_body()?)));
            }
            Token::Lookahead => return Ok(Expr::Lookahead(Box::new(self.parse_group_body()?))),
            Token::NegativeLookahead => {
                return Ok(Expr::NegativeLookahead(Box::new(self.parse_group_body()?)));
            }
            Token::Lookbehind => return Ok(Expr::Lookbehind(Box::new(self.parse_group_body()?))),
            Token::NegativeLookbehind => {
                return Ok(Expr::NegativeLookbehind(Box::new(self.parse_group_body()?)));
            }
            Token::FlagsGroup(flags) => {
                let flags = Expr::Flags(flags.clone());
                let body = self.parse_group_body()?;
                return Ok(Expr::NonCapturingGroup(Box::new(Expr::sequence(vec![
                    flags, body,
                ]))));
            }
            Token::ConditionalStart(reference) => {
                let group = self.registry.resolve(reference)?;
                return self.parse_conditional(group);
            }
            Token::Quantifier(_) => {
                return Err(ParseError::InvalidQuantifier("nothing to repeat".to_string()));
            }
            Token::Eof => return Err(ParseError::UnexpectedEof),
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "expression".to_string(),
                    found: self.current_token.to_string(),
                });
            }
        };
        self.advance()?;
        Ok(expr)
    }

    /// Parse the body of a group whose opening token is current
    fn parse_group_body(&mut self) -> Result<Expr, ParseError> {
        self.advance()?; // consume the opening token
        let body = self.parse_alternation()?;
        self.expect(Token::RightParen)?;
        Ok(body)
    }

    /// Parse `yes|no)` after a conditional group start
    fn parse_conditional(&mut self, group: u32) -> Result<Expr, ParseError> {
        let body = self.parse_group_body()?;
        let (yes, no) = match body {
            Expr::Alternation(mut branches) if branches.len() == 2 => {
                let no = branches.pop().unwrap_or(Expr::Empty);
                let yes = branches.pop().unwrap_or(Expr::Empty);
                (yes, no)
            }
            Expr::Alternation(_) => {
                return Err(ParseError::UnexpectedToken {
                    expected: "at most two conditional branches".to_string(),
                    found: "`|`".to_string(),
                });
            }
            yes => (yes, Expr::Empty),
        };
        Ok(Expr::Conditional {
            group,
            yes: Box::new(yes),
            no: Box::new(no),
        })
    }

    /// Parse a character class
    /// char_class := '[' '^'? class_item+ ']'
    fn parse_char_class(&mut self) -> Result<Expr, ParseError> {
        self.expect(Token::LeftBracket)?;

        let negated = if self.current_token == Token::Caret {
            self.advance()?;
            true
        } else {
            false
        };

        let mut items = Vec::new();
        while self.current_token != Token::RightBracket {
            let item = self.parse_class_item()?;
            // A range needs a plain character on both sides of the '-'
            if let ClassItem::Char(start) = item
                && self.current_token == Token::Literal('-')
            {
                self.advance()?;
                match self.current_token {
                    Token::Literal(end) | Token::Escape(end) => {
                        if end < start {
                            return Err(ParseError::UnexpectedToken {
                                expected: format!("range end not below `{}`", start),
                                found: format!("`{}`", end),
                            });
                        }
                        self.advance()?;
                        items.push(ClassItem::Range(start, end));
                    }
                    _ => {
                        items.push(ClassItem::Char(start));
                        items.push(ClassItem::Char('-'));
                    }
                }
                continue;
            }
            items.push(item);
        }
        self.expect(Token::RightBracket)?;

        Ok(Expr::CharacterClass(CharacterClass { negated, items }))
    }

    /// Parse an item in a character class
    fn parse_class_item(&mut self) -> Result<ClassItem, ParseError> {
        let item = match &self.current_token {
            Token::Literal(c) | Token::Escape(c) => ClassItem::Char(*c),
            Token::WordChar => ClassItem::Shorthand('w'),
            Token::NonWordChar => ClassItem::Shorthand('W'),
            Token::Digit => ClassItem::Shorthand('d'),
            Token::NonDigit => ClassItem::Shorthand('D'),
            Token::Whitespace => ClassItem::Shorthand('s'),
            Token::NonWhitespace => ClassItem::Shorthand('S'),
            Token::Eof => return Err(ParseError::UnexpectedEof),
            _ => {
                return Err(ParseError::UnexpectedToken {
                    expected: "character or escape".to_string(),
                    found: self.current_token.to_string(),
                });
            }
        };
        self.advance()?;
        Ok(item)
    }
}

/// Parse a rule pattern string into an AST
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Quantifier;

    fn round_trip(input: &str) -> String {
        parse(input).unwrap().to_regex_string()
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(round_trip("abc"), "abc");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse("").unwrap(), Expr::Empty);
    }

    #[test]
    fn test_parse_groups_are_numbered_in_order() {
        let expr = parse("(a(b))(c)").unwrap();
        assert_eq!(
            expr,
            Expr::sequence(vec![
                Expr::group(
                    1,
                    Expr::sequence(vec![Expr::literal('a'), Expr::group(2, Expr::literal('b'))])
                ),
                Expr::group(3, Expr::literal('c')),
            ])
        );
    }

    #[test]
    fn test_parse_named_group_and_backref() {
        let expr = parse(r#"(?P<q>["'])[^"']*(?P=q)"#).unwrap();
        assert_eq!(expr.to_regex_string(), r#"(?P<q>["'])[^"']*\1"#);
    }

    #[test]
    fn test_parse_error_unclosed_group() {
        assert!(matches!(parse("(abc"), Err(ParseError::UnexpectedEof)));
    }

    #[test]
    fn test_parse_error_stray_paren() {
        assert!(matches!(
            parse("abc)"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_parse_quantifiers() {
        assert_eq!(round_trip("a*"), "a*");
        assert_eq!(round_trip("a+?"), "a+?");
        assert_eq!(round_trip("a{3}"), "a{3}");
        assert_eq!(round_trip("a{2,5}"), "a{2,5}");
        assert_eq!(round_trip("a{3,}"), "a{3,}");
        assert!(matches!(
            parse("a*").unwrap(),
            Expr::Quantified {
                quantifier: Quantifier { min: 0, max: None, greedy: true },
                ..
            }
        ));
    }

    #[test]
    fn test_parse_nothing_to_repeat() {
        assert!(matches!(parse("*a"), Err(ParseError::InvalidQuantifier(_))));
        assert!(matches!(parse("^*"), Err(ParseError::InvalidQuantifier(_))));
        assert!(matches!(parse("a**"), Err(ParseError::InvalidQuantifier(_))));
    }

    #[test]
    fn test_parse_alternation() {
        let expr = parse("a|b|c").unwrap();
        assert_eq!(expr.to_regex_string(), "a|b|c");
        assert!(matches!(expr, Expr::Alternation(_)));
    }

    #[test]
    fn test_parse_anchors_and_boundaries() {
        assert_eq!(round_trip(r"^\bstart\B$"), r"^\bstart\B$");
        assert_eq!(round_trip(r"\Aend\Z"), r"\Aend\Z");
    }

    #[test]
    fn test_parse_lookaround() {
        assert_eq!(round_trip("a(?=b)(?!c)(?<=d)(?<!e)"), "a(?=b)(?!c)(?<=d)(?<!e)");
    }

    #[test]
    fn test_parse_conditional() {
        let expr = parse("(<)?a(?(1)>|$)").unwrap();
        assert_eq!(expr.to_regex_string(), "(<)?a(?(1)>|$)");
    }

    #[test]
    fn test_parse_character_classes() {
        assert_eq!(round_trip("[abc]"), "[abc]");
        assert_eq!(round_trip("[^a-z]"), "[^a-z]");
        assert_eq!(round_trip(r"[\w.-]"), r"[\w.\-]");
        assert_eq!(round_trip(r"[-+]"), r"[\-+]");
        assert_eq!(round_trip(r"[]]"), r"[\]]");
    }

    #[test]
    fn test_parse_flags_group() {
        let expr = parse("(?i:abc)").unwrap();
        assert_eq!(
            expr,
            Expr::non_capturing_group(Expr::sequence(vec![
                Expr::Flags("i".to_string()),
                Expr::text("abc"),
            ]))
        );
    }

    #[test]
    fn test_parse_undefined_backref() {
        assert!(matches!(parse(r"(a)\2"), Err(ParseError::Group(_))));
        assert!(matches!(parse(r"(?P=nope)"), Err(ParseError::Group(_))));
    }

    #[test]
    fn test_parse_verbose_pattern() {
        let expr = parse("(?x) a  b # comment\n").unwrap();
        assert_eq!(expr.to_regex_string(), "(?x)ab");
    }
}
