//! Abstract Syntax Tree (AST) for lexer rule patterns
//!
//! This module defines the AST types that represent parsed patterns of the
//! source rule dialect (Python `re` flavour as used by Pygments lexers).
//! Supports the syntax that lexer tables actually exercise:
//! - Literals, character classes, shorthands, wildcards
//! - Quantifiers (*, +, ?, {n,m}) with lazy variants
//! - Groups (capturing, named, non-capturing, conditional)
//! - Alternation (|)
//! - Anchors and boundaries (^, $, \A, \Z, \b, \B)
//! - Lookaround assertions and backreferences
//!
//! Rendering comes in two flavours: [`Flavor::Source`] re-emits any tree as
//! pattern text, [`Flavor::Rust`] emits the subset understood by the `regex`
//! crate and refuses the rest.

use std::fmt;

/// An expression in the AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Empty expression (matches empty string)
    Empty,

    /// A literal character
    Literal(char),

    /// Any single character except the given one
    NotLiteral(char),

    /// Any character (dot)
    Any,

    /// A sequence of expressions (concatenation)
    Sequence(Vec<Expr>),

    /// Alternation (e.g., a|b|c); first matching alternative wins
    Alternation(Vec<Expr>),

    /// A character class [abc] or [^abc] or [a-z]
    CharacterClass(CharacterClass),

    /// Character class shorthand (\w, \d, \s, \W, \D, \S)
    Shorthand(char),

    /// Quantified expression (e.g., a*, a+, a?, a{3,5})
    Quantified {
        /// The expression being quantified
        expr: Box<Expr>,
        /// The quantifier
        quantifier: Quantifier,
    },

    /// A capturing group: (...) or (?P<name>...)
    Group {
        /// 1-based group index
        index: u32,
        /// Group name, if declared
        name: Option<String>,
        /// The pattern inside the group
        expr: Box<Expr>,
    },

    /// A non-capturing group: (?:...)
    NonCapturingGroup(Box<Expr>),

    /// Positive lookahead assertion (?=...)
    Lookahead(Box<Expr>),

    /// Negative lookahead assertion (?!...)
    NegativeLookahead(Box<Expr>),

    /// Positive lookbehind assertion (?<=...)
    Lookbehind(Box<Expr>),

    /// Negative lookbehind assertion (?<!...)
    NegativeLookbehind(Box<Expr>),

    /// Conditional group (?(id)yes|no)
    Conditional {
        /// Index of the group the condition tests
        group: u32,
        /// Pattern used when the group matched
        yes: Box<Expr>,
        /// Pattern used otherwise
        no: Box<Expr>,
    },

    /// Backreference by group index (\1, (?P=name))
    Backreference(u32),

    /// Zero-width anchor or boundary
    Boundary(Boundary),

    /// Inline flag group, e.g. (?i) or (?x)
    Flags(String),
}

/// Zero-width anchors and boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Start of line `^`
    Start,
    /// End of line `$`
    End,
    /// Start of input `\A`
    StartOfInput,
    /// End of input `\Z`
    EndOfInput,
    /// Word boundary `\b`
    Word,
    /// Non-word boundary `\B`
    NonWord,
}

/// A character class `[abc]`, `[^abc]`, or `[a-z]`
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterClass {
    /// Whether the class is negated [^...]
    pub negated: bool,
    /// The items in the class
    pub items: Vec<ClassItem>,
}

/// An item in a character class
#[derive(Debug, Clone, PartialEq)]
pub enum ClassItem {
    /// A single character
    Char(char),
    /// A character range (e.g., a-z)
    Range(char, char),
    /// A character class shorthand (\d, \w, \s, etc.)
    Shorthand(char),
}

/// A repetition bound `{min,max}` with greediness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantifier {
    /// Minimum number of repetitions
    pub min: u32,
    /// Maximum number of repetitions, `None` for unbounded
    pub max: Option<u32>,
    /// Greedy (`*`) or lazy (`*?`)
    pub greedy: bool,
}

/// Output flavour for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// Pattern text in the source/target dialect, any tree
    Source,
    /// Pattern text for the `regex` crate; lookaround and backreferences refused
    Rust,
}

impl Quantifier {
    /// Zero or more (*)
    pub const fn zero_or_more() -> Self {
        Quantifier { min: 0, max: None, greedy: true }
    }

    /// One or more (+)
    pub const fn one_or_more() -> Self {
        Quantifier { min: 1, max: None, greedy: true }
    }

    /// Zero or one (?)
    pub const fn optional() -> Self {
        Quantifier { min: 0, max: Some(1), greedy: true }
    }

    /// Exactly n times ({n})
    pub const fn exactly(n: u32) -> Self {
        Quantifier { min: n, max: Some(n), greedy: true }
    }

    /// At least n times ({n,})
    pub const fn at_least(n: u32) -> Self {
        Quantifier { min: n, max: None, greedy: true }
    }

    /// Between n and m times ({n,m})
    pub const fn between(n: u32, m: u32) -> Self {
        Quantifier { min: n, max: Some(m), greedy: true }
    }

    /// The lazy variant of this quantifier
    pub const fn lazy(self) -> Self {
        Quantifier { greedy: false, ..self }
    }

    /// Convert quantifier to regex string
    fn to_regex_string(self) -> String {
        let base = match (self.min, self.max) {
            (0, None) => "*".to_string(),
            (1, None) => "+".to_string(),
            (0, Some(1)) => "?".to_string(),
            (n, None) => format!("{{{},}}", n),
            (n, Some(m)) if n == m => format!("{{{}}}", n),
            (n, Some(m)) => format!("{{{},{}}}", n, m),
        };
        // `{n}` has nothing to be lazy about
        if self.greedy || self.max == Some(self.min) {
            base
        } else {
            base + "?"
        }
    }
}

impl Expr {
    /// Create a literal expression
    pub fn literal(c: char) -> Self {
        Expr::Literal(c)
    }

    /// Create a sequence of literals from a string
    pub fn text(s: &str) -> Self {
        Expr::sequence(s.chars().map(Expr::Literal).collect())
    }

    /// Create a sequence from a vector of expressions
    ///
    /// Nested sequences are flattened and empty items dropped.
    pub fn sequence(exprs: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::Empty => {}
                Expr::Sequence(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Empty,
            1 => flat.pop().unwrap_or(Expr::Empty),
            _ => Expr::Sequence(flat),
        }
    }

    /// Create an alternation from a vector of expressions
    pub fn alternation(mut exprs: Vec<Expr>) -> Self {
        match exprs.len() {
            0 => Expr::Empty,
            1 => exprs.pop().unwrap_or(Expr::Empty),
            _ => Expr::Alternation(exprs),
        }
    }

    /// Create a character class
    pub fn char_class(negated: bool, items: Vec<ClassItem>) -> Self {
        Expr::CharacterClass(CharacterClass { negated, items })
    }

    /// Create a quantified expression
    pub fn quantified(expr: Expr, quantifier: Quantifier) -> Self {
        Expr::Quantified {
            expr: Box::new(expr),
            quantifier,
        }
    }

    /// Create an unnamed capturing group
    pub fn group(index: u32, expr: Expr) -> Self {
        Expr::Group {
            index,
            name: None,
            expr: Box::new(expr),
        }
    }

    /// Create a non-capturing group
    pub fn non_capturing_group(expr: Expr) -> Self {
        Expr::NonCapturingGroup(Box::new(expr))
    }

    /// Whether this node consumes exactly one unit a quantifier can apply to
    /// without any grouping syntax
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Expr::Literal(_)
                | Expr::NotLiteral(_)
                | Expr::Any
                | Expr::CharacterClass(_)
                | Expr::Shorthand(_)
                | Expr::Group { .. }
                | Expr::Backreference(_)
        )
    }

    /// Whether this node is zero-width
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Expr::Boundary(_)
                | Expr::Lookahead(_)
                | Expr::NegativeLookahead(_)
                | Expr::Lookbehind(_)
                | Expr::NegativeLookbehind(_)
        )
    }

    /// The class items equivalent to this node when it matches exactly one
    /// character from a non-negated set
    pub fn single_char_items(&self) -> Option<Vec<ClassItem>> {
        match self {
            Expr::Literal(c) => Some(vec![ClassItem::Char(*c)]),
            Expr::Shorthand(c) => Some(vec![ClassItem::Shorthand(*c)]),
            Expr::CharacterClass(cc) if !cc.negated => Some(cc.items.clone()),
            _ => None,
        }
    }

    /// Whether the pattern can consume a line break
    pub fn can_match_newline(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            found |= match e {
                Expr::Literal(c) => *c == '\n' || *c == '\r',
                Expr::NotLiteral(c) => *c != '\n',
                Expr::Shorthand(c) => matches!(c, 's' | 'D' | 'W'),
                Expr::CharacterClass(cc) => cc.matches('\n'),
                _ => false,
            }
        });
        found
    }

    /// Visit every node in pre-order
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Sequence(items) | Expr::Alternation(items) => {
                for item in items {
                    item.walk(f);
                }
            }
            Expr::Quantified { expr, .. }
            | Expr::Group { expr, .. }
            | Expr::NonCapturingGroup(expr)
            | Expr::Lookahead(expr)
            | Expr::NegativeLookahead(expr)
            | Expr::Lookbehind(expr)
            | Expr::NegativeLookbehind(expr) => expr.walk(f),
            Expr::Conditional { yes, no, .. } => {
                yes.walk(f);
                no.walk(f);
            }
            _ => {}
        }
    }

    /// Convert the AST back to pattern text
    pub fn to_regex_string(&self) -> String {
        let mut out = String::new();
        // Source flavour renders every node
        let _ = self.render(Flavor::Source, &mut out);
        out
    }

    /// Render pattern text for the `regex` crate, if the tree fits its syntax
    pub fn to_rust_regex(&self) -> Option<String> {
        let mut out = String::new();
        self.render(Flavor::Rust, &mut out).then_some(out)
    }

    /// Render into `out`; returns false when the flavour cannot express a node
    fn render(&self, flavor: Flavor, out: &mut String) -> bool {
        let rust = flavor == Flavor::Rust;
        match self {
            Expr::Empty => true,
            Expr::Literal(c) => {
                push_literal(out, *c, false);
                true
            }
            Expr::NotLiteral(c) => {
                out.push_str("[^");
                push_literal(out, *c, true);
                out.push(']');
                true
            }
            Expr::Any => {
                out.push('.');
                true
            }
            Expr::Sequence(exprs) => exprs.iter().all(|e| {
                let wrap = matches!(e, Expr::Alternation(_));
                if wrap {
                    out.push_str("(?:");
                }
                let ok = e.render(flavor, out);
                if wrap {
                    out.push(')');
                }
                ok
            }),
            Expr::Alternation(exprs) => {
                let mut ok = true;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    ok &= e.render(flavor, out);
                }
                ok
            }
            Expr::CharacterClass(cc) => {
                cc.render(out);
                true
            }
            Expr::Shorthand(c) => {
                out.push('\\');
                out.push(*c);
                true
            }
            Expr::Quantified { expr, quantifier } => {
                let needs_parens = !expr.is_atom();
                if needs_parens {
                    out.push_str("(?:");
                }
                let ok = expr.render(flavor, out);
                if needs_parens {
                    out.push(')');
                }
                out.push_str(&quantifier.to_regex_string());
                ok
            }
            Expr::Group { name, expr, .. } => {
                match name {
                    Some(name) => {
                        out.push_str("(?P<");
                        out.push_str(name);
                        out.push('>');
                    }
                    None => out.push('('),
                }
                let ok = expr.render(flavor, out);
                out.push(')');
                ok
            }
            Expr::NonCapturingGroup(expr) => wrap(out, "(?:", expr, flavor),
            Expr::Lookahead(expr) => !rust && wrap(out, "(?=", expr, flavor),
            Expr::NegativeLookahead(expr) => !rust && wrap(out, "(?!", expr, flavor),
            Expr::Lookbehind(expr) => !rust && wrap(out, "(?<=", expr, flavor),
            Expr::NegativeLookbehind(expr) => !rust && wrap(out, "(?<!", expr, flavor),
            Expr::Conditional { group, yes, no } => {
                if rust {
                    return false;
                }
                out.push_str(&format!("(?({})", group));
                let mut ok = yes.render(flavor, out);
                out.push('|');
                ok &= no.render(flavor, out);
                out.push(')');
                ok
            }
            Expr::Backreference(n) => {
                out.push_str(&format!("\\{}", n));
                !rust
            }
            Expr::Boundary(b) => {
                out.push_str(match (b, rust) {
                    (Boundary::Start, _) => "^",
                    (Boundary::End, _) => "$",
                    (Boundary::StartOfInput, _) => "\\A",
                    (Boundary::EndOfInput, false) => "\\Z",
                    (Boundary::EndOfInput, true) => "\\z",
                    (Boundary::Word, _) => "\\b",
                    (Boundary::NonWord, _) => "\\B",
                });
                true
            }
            Expr::Flags(flags) => {
                if rust {
                    let kept: String = flags.chars().filter(|c| "imsx".contains(*c)).collect();
                    if !kept.is_empty() {
                        out.push_str(&format!("(?{})", kept));
                    }
                } else {
                    out.push_str(&format!("(?{})", flags));
                }
                true
            }
        }
    }
}

fn wrap(out: &mut String, open: &str, expr: &Expr, flavor: Flavor) -> bool {
    out.push_str(open);
    let ok = expr.render(flavor, out);
    out.push(')');
    ok
}

/// Push a literal character, escaped for its context
fn push_literal(out: &mut String, c: char, in_class: bool) {
    match c {
        '\n' => out.push_str("\\n"),
        '\t' => out.push_str("\\t"),
        '\r' => out.push_str("\\r"),
        '\x0c' => out.push_str("\\f"),
        '\x0b' => out.push_str("\\v"),
        c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
        '\\' | ']' | '[' | '^' | '-' if in_class => {
            out.push('\\');
            out.push(c);
        }
        '\\' | '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|'
            if !in_class =>
        {
            out.push('\\');
            out.push(c);
        }
        c => out.push(c),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_regex_string())
    }
}

impl CharacterClass {
    /// Whether the class accepts the character
    pub fn matches(&self, c: char) -> bool {
        let hit = self.items.iter().any(|item| match item {
            ClassItem::Char(x) => *x == c,
            ClassItem::Range(a, b) => (*a..=*b).contains(&c),
            ClassItem::Shorthand(s) => shorthand_matches(*s, c),
        });
        hit != self.negated
    }

    /// The same set with the negation flipped
    pub fn inverted(&self) -> Self {
        CharacterClass {
            negated: !self.negated,
            items: self.items.clone(),
        }
    }

    fn render(&self, out: &mut String) {
        out.push('[');
        if self.negated {
            out.push('^');
        }
        for item in &self.items {
            match item {
                ClassItem::Char(c) => push_literal(out, *c, true),
                ClassItem::Range(start, end) => {
                    push_literal(out, *start, true);
                    out.push('-');
                    push_literal(out, *end, true);
                }
                ClassItem::Shorthand(c) => {
                    out.push('\\');
                    out.push(*c);
                }
            }
        }
        out.push(']');
    }
}

/// Whether a shorthand class (`d`, `w`, `s` or their negations) accepts `c`
pub fn shorthand_matches(shorthand: char, c: char) -> bool {
    match shorthand {
        'd' => c.is_ascii_digit(),
        'D' => !c.is_ascii_digit(),
        'w' => c.is_alphanumeric() || c == '_',
        'W' => !(c.is_alphanumeric() || c == '_'),
        's' => c.is_whitespace(),
        'S' => !c.is_whitespace(),
        _ => false,
    }
}

/// The shorthand accepting exactly the complement of `shorthand`
pub fn invert_shorthand(shorthand: char) -> Option<char> {
    match shorthand {
        'd' => Some('D'),
        'D' => Some('d'),
        'w' => Some('W'),
        'W' => Some('w'),
        's' => Some('S'),
        'S' => Some('s'),
        _ => None,
    }
}
