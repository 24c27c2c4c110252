//! Normalizer for rule patterns
//!
//! The target dialect has no non-capturing groups, no lookaround and no
//! conditionals; grouping is only available through capturing groups.
//! This module rewrites a parsed pattern so that only literals, classes,
//! alternation, repeats and capturing groups remain.
//!
//! Every node normalizes to a [`Piece`]: either a fixed expression, or a
//! pending expansion (a list of alternatives) that the enclosing sequence
//! must cross-product with its other slots. A capturing group absorbs a
//! pending expansion as its alternation body; the pattern root turns one
//! into a top-level alternation.
//!
//! Translations that change the matched language are recorded in the
//! [`Report`] as unsafe.

use tracing::debug;

use crate::ast::{ClassItem, Expr, Quantifier, invert_shorthand};
use crate::error::{ConvertError, Result};
use crate::groups::renumber_groups;
use crate::parser::parse;

/// Default cap on `max - min` for unrolled bounded repeats
pub const DEFAULT_MAX_UNROLL: u32 = 100;

/// Default cap on the number of alternatives one expansion may produce
pub const DEFAULT_MAX_COMBINATIONS: usize = 1000;

/// How groups that cannot stay non-capturing are rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Cross-product pending alternations into the enclosing sequence
    #[default]
    Expand,
    /// Turn every such group into a capturing group; never overflows but
    /// adds groups
    Promote,
}

/// Normalizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Fold letters into two-case classes
    pub ignore_case: bool,
    /// Largest `max - min` of a bounded repeat that may be unrolled
    pub max_unroll: u32,
    /// Largest number of alternatives one expansion may produce
    pub max_combinations: usize,
    /// Expansion strategy
    pub strategy: Strategy,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            ignore_case: false,
            max_unroll: DEFAULT_MAX_UNROLL,
            max_combinations: DEFAULT_MAX_COMBINATIONS,
            strategy: Strategy::Expand,
        }
    }
}

impl NormalizeOptions {
    /// The same settings with the promote strategy
    pub fn promoting(self) -> Self {
        NormalizeOptions {
            strategy: Strategy::Promote,
            ..self
        }
    }
}

/// Notes about a normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    /// Translations that change the matched language
    pub unsafe_translations: Vec<String>,
    /// Number of non-capturing constructs turned into capturing groups
    pub promoted_groups: usize,
}

/// A normalized pattern with its report
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The rewritten pattern
    pub expr: Expr,
    /// What the rewrite had to approximate
    pub report: Report,
}

impl Normalized {
    /// Pattern text of the rewritten pattern
    pub fn to_regex_string(&self) -> String {
        self.expr.to_regex_string()
    }
}

/// Result of normalizing one node
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Fixed(Expr),
    Expand(Vec<Expr>),
}

impl Piece {
    fn width(&self) -> usize {
        match self {
            Piece::Fixed(_) => 1,
            Piece::Expand(alternatives) => alternatives.len(),
        }
    }

    fn into_alternatives(self) -> Vec<Expr> {
        match self {
            Piece::Fixed(expr) => vec![expr],
            Piece::Expand(alternatives) => alternatives,
        }
    }

    fn into_expr(self) -> Expr {
        match self {
            Piece::Fixed(expr) => expr,
            Piece::Expand(alternatives) => Expr::alternation(alternatives),
        }
    }
}

struct Normalizer {
    options: NormalizeOptions,
    ignore_case: bool,
    report: Report,
}

/// Normalize a parsed pattern
pub fn normalize(expr: &Expr, options: &NormalizeOptions) -> Result<Normalized> {
    let mut normalizer = Normalizer {
        options: *options,
        ignore_case: options.ignore_case,
        report: Report::default(),
    };
    let mut expr = normalizer.piece(expr)?.into_expr();
    renumber_groups(&mut expr);
    Ok(Normalized {
        expr,
        report: normalizer.report,
    })
}

/// Parse and normalize a pattern
pub fn normalize_pattern(pattern: &str, options: &NormalizeOptions) -> Result<Normalized> {
    let ast = parse(pattern)?;
    normalize(&ast, options)
}

/// Translate a pattern into the target dialect with default settings
///
/// # Example
/// ```
/// use lexport::transpile;
///
/// let result = transpile("(?:a|b)c").unwrap();
/// assert_eq!(result, "ac|bc");
/// ```
pub fn transpile(input: &str) -> Result<String> {
    Ok(normalize_pattern(input, &NormalizeOptions::default())?.to_regex_string())
}

/// Transpile with verbose output for debugging
pub fn transpile_debug(input: &str, options: &NormalizeOptions) -> Result<TranspileResult> {
    let ast = parse(input)?;
    let normalized = normalize(&ast, options)?;

    Ok(TranspileResult {
        input: input.to_string(),
        ast: format!("{:?}", ast),
        normalized_ast: format!("{:?}", normalized.expr),
        output: normalized.to_regex_string(),
        report: normalized.report,
    })
}

/// Result of a transpilation with debug information
#[derive(Debug, Clone)]
pub struct TranspileResult {
    /// The original input pattern
    pub input: String,
    /// The parsed AST (debug format)
    pub ast: String,
    /// The normalized AST (debug format)
    pub normalized_ast: String,
    /// The transpiled output
    pub output: String,
    /// Approximations made along the way
    pub report: Report,
}

impl TranspileResult {
    /// Print a formatted report of the transpilation
    pub fn report(&self) {
        println!("Transpilation Report");
        println!("====================");
        println!("Input:      {}", self.input);
        println!("AST:        {}", self.ast);
        println!("Normalized: {}", self.normalized_ast);
        println!("Output:     {}", self.output);
        if self.report.promoted_groups > 0 {
            println!("Promoted:   {} group(s)", self.report.promoted_groups);
        }
        for note in &self.report.unsafe_translations {
            println!("Unsafe:     {}", note);
        }
    }
}

impl Normalizer {
    fn overflow(&self, combinations: usize) -> ConvertError {
        ConvertError::ExpansionOverflow {
            combinations,
            limit: self.options.max_combinations,
        }
    }

    fn note_unsafe(&mut self, note: String) {
        debug!(%note, "unsafe translation");
        self.report.unsafe_translations.push(note);
    }

    /// A capturing group standing in for a non-capturing construct
    fn promote(&mut self, body: Expr) -> Expr {
        self.report.promoted_groups += 1;
        // Index is fixed up by the final renumbering
        Expr::group(0, body)
    }

    /// Run `f` with the current case flag restored afterwards
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.ignore_case;
        let result = f(self);
        self.ignore_case = saved;
        result
    }

    fn piece(&mut self, expr: &Expr) -> Result<Piece> {
        match expr {
            Expr::Literal(c) => Ok(Piece::Fixed(self.literal(*c))),
            Expr::NotLiteral(c) => Ok(Piece::Fixed(self.not_literal(*c))),
            Expr::CharacterClass(cc) => {
                let mut cc = cc.clone();
                if self.ignore_case {
                    cc.items = fold_items(&cc.items);
                }
                Ok(Piece::Fixed(Expr::CharacterClass(cc)))
            }
            Expr::Empty
            | Expr::Any
            | Expr::Shorthand(_)
            | Expr::Backreference(_)
            | Expr::Boundary(_) => Ok(Piece::Fixed(expr.clone())),
            Expr::Flags(flags) => {
                self.apply_flags(flags);
                Ok(Piece::Fixed(Expr::Empty))
            }
            Expr::Sequence(items) => self.sequence(items),
            Expr::Alternation(alternatives) => {
                let mut out = Vec::new();
                for alternative in alternatives {
                    // Pending alternatives splice inline, order preserved
                    out.extend(self.piece(alternative)?.into_alternatives());
                }
                Ok(Piece::Expand(out))
            }
            Expr::Group { index, expr, .. } => {
                let body = self.scoped(|n| n.piece(expr))?;
                Ok(Piece::Fixed(Expr::group(*index, body.into_expr())))
            }
            Expr::NonCapturingGroup(body) => {
                let body = self.scoped(|n| n.piece(body))?;
                match body {
                    Piece::Expand(alternatives) if self.options.strategy == Strategy::Promote => {
                        Ok(Piece::Fixed(self.promote(Expr::alternation(alternatives))))
                    }
                    body => Ok(body),
                }
            }
            Expr::Quantified { expr, quantifier } => {
                let operand = self.scoped(|n| n.piece(expr))?;
                self.repeat(operand, *quantifier)
            }
            Expr::Lookahead(body) => self.scoped(|n| n.piece(body)),
            Expr::Lookbehind(_) | Expr::NegativeLookbehind(_) => {
                self.note_unsafe(format!("dropped lookbehind {}", expr));
                Ok(Piece::Fixed(Expr::Empty))
            }
            Expr::NegativeLookahead(body) => self.negative_lookahead(expr, body),
            Expr::Conditional { yes, no, .. } => {
                self.note_unsafe(format!("conditional {} matches either branch", expr));
                let mut alternatives = self.scoped(|n| n.piece(yes))?.into_alternatives();
                alternatives.extend(self.scoped(|n| n.piece(no))?.into_alternatives());
                if self.options.strategy == Strategy::Promote {
                    Ok(Piece::Fixed(self.promote(Expr::alternation(alternatives))))
                } else {
                    Ok(Piece::Expand(alternatives))
                }
            }
        }
    }

    fn apply_flags(&mut self, flags: &str) {
        let mut on = true;
        for flag in flags.chars() {
            match flag {
                '-' => on = false,
                'i' => self.ignore_case = on,
                // `x` is consumed by the pattern lexer; `m s u a L` do not
                // change a line-oriented match
                _ => {}
            }
        }
    }

    fn literal(&self, c: char) -> Expr {
        if self.ignore_case {
            let items = fold_items(&[ClassItem::Char(c)]);
            if items.len() > 1 {
                return Expr::char_class(false, items);
            }
        }
        Expr::Literal(c)
    }

    fn not_literal(&self, c: char) -> Expr {
        if self.ignore_case {
            let items = fold_items(&[ClassItem::Char(c)]);
            if items.len() > 1 {
                return Expr::char_class(true, items);
            }
        }
        Expr::NotLiteral(c)
    }

    /// Cross-product the pending slots of a sequence
    fn sequence(&mut self, items: &[Expr]) -> Result<Piece> {
        let mut pieces = Vec::with_capacity(items.len());
        for item in items {
            pieces.push(self.piece(item)?);
        }

        let combinations = pieces
            .iter()
            .fold(1usize, |acc, p| acc.saturating_mul(p.width()));
        if !pieces.iter().any(|p| matches!(p, Piece::Expand(_))) {
            return Ok(Piece::Fixed(Expr::sequence(
                pieces.into_iter().map(Piece::into_expr).collect(),
            )));
        }
        if combinations > self.options.max_combinations {
            return Err(self.overflow(combinations));
        }

        let mut rows: Vec<Vec<Expr>> = vec![Vec::new()];
        for piece in pieces {
            match piece {
                Piece::Fixed(expr) => {
                    for row in &mut rows {
                        row.push(expr.clone());
                    }
                }
                Piece::Expand(alternatives) => {
                    let mut next = Vec::with_capacity(rows.len() * alternatives.len());
                    for row in &rows {
                        for alternative in &alternatives {
                            let mut row = row.clone();
                            row.push(alternative.clone());
                            next.push(row);
                        }
                    }
                    rows = next;
                }
            }
        }
        Ok(Piece::Expand(rows.into_iter().map(Expr::sequence).collect()))
    }

    /// Normalize a repeat over an already normalized operand
    fn repeat(&mut self, operand: Piece, quantifier: Quantifier) -> Result<Piece> {
        // An alternation of single characters is one class
        let operand = match operand {
            Piece::Expand(alternatives) => match fold_single_chars(&alternatives) {
                Some(class) => Piece::Fixed(class),
                None => Piece::Expand(alternatives),
            },
            fixed => fixed,
        };

        let body = match operand {
            Piece::Fixed(Expr::Empty) => return Ok(Piece::Fixed(Expr::Empty)),
            Piece::Fixed(Expr::Boundary(b)) => {
                let kept = if quantifier.min == 0 {
                    Expr::Empty
                } else {
                    Expr::Boundary(b)
                };
                return Ok(Piece::Fixed(kept));
            }
            Piece::Fixed(expr) if expr.is_atom() => {
                return Ok(Piece::Fixed(Expr::quantified(expr, quantifier)));
            }
            other => other,
        };

        match quantifier.max {
            Some(_) if self.options.strategy == Strategy::Expand => self.unroll(body, quantifier),
            _ => {
                let grouped = self.promote(body.into_expr());
                Ok(Piece::Fixed(Expr::quantified(grouped, quantifier)))
            }
        }
    }

    /// Spell out every repetition count of a bounded repeat
    fn unroll(&mut self, body: Piece, quantifier: Quantifier) -> Result<Piece> {
        let min = quantifier.min;
        let max = quantifier.max.unwrap_or(min);
        if max - min >= self.options.max_unroll {
            return Err(ConvertError::ExpansionOverflow {
                combinations: (max - min + 1) as usize,
                limit: self.options.max_unroll as usize,
            });
        }

        let choices = body.into_alternatives();
        let width = choices.len();
        let mut combinations = 0usize;
        for count in min..=max {
            combinations = combinations.saturating_add(width.saturating_pow(count));
        }
        if combinations > self.options.max_combinations {
            return Err(self.overflow(combinations));
        }

        let counts: Vec<u32> = if quantifier.greedy {
            (min..=max).rev().collect()
        } else {
            (min..=max).collect()
        };
        let mut alternatives = Vec::with_capacity(combinations);
        for count in counts {
            let mut rows: Vec<Vec<Expr>> = vec![Vec::new()];
            for _ in 0..count {
                rows = rows
                    .into_iter()
                    .flat_map(|row| {
                        choices.iter().map(move |choice| {
                            let mut row = row.clone();
                            row.push(choice.clone());
                            row
                        })
                    })
                    .collect();
            }
            alternatives.extend(rows.into_iter().map(Expr::sequence));
        }
        Ok(Piece::Expand(alternatives))
    }

    fn negative_lookahead(&mut self, whole: &Expr, body: &Expr) -> Result<Piece> {
        let translated = match unwrap_single(body) {
            Expr::CharacterClass(cc) => {
                let mut inverted = cc.inverted();
                if self.ignore_case {
                    inverted.items = fold_items(&inverted.items);
                }
                Expr::CharacterClass(inverted)
            }
            Expr::Shorthand(s) => match invert_shorthand(*s) {
                Some(inverted) => Expr::Shorthand(inverted),
                None => return Err(unsupported(whole)),
            },
            Expr::Literal(c) => self.not_literal(*c),
            Expr::NotLiteral(c) => self.literal(*c),
            Expr::Backreference(_) => {
                self.note_unsafe(format!("dropped {}", whole));
                Expr::Empty
            }
            Expr::Boundary(_) => {
                self.note_unsafe(format!("dropped {}", whole));
                Expr::Empty
            }
            Expr::Alternation(alternatives) => {
                let mut items = Vec::new();
                for alternative in alternatives {
                    let alternative = unwrap_single(alternative);
                    if let Expr::Boundary(_) = alternative {
                        self.note_unsafe(format!(
                            "stripped anchor {} from {}",
                            alternative, whole
                        ));
                        continue;
                    }
                    match alternative.single_char_items() {
                        Some(found) => items.extend(found),
                        None => return Err(unsupported(whole)),
                    }
                }
                if items.is_empty() {
                    Expr::Empty
                } else {
                    if self.ignore_case {
                        items = fold_items(&items);
                    }
                    Expr::char_class(true, items)
                }
            }
            _ => return Err(unsupported(whole)),
        };
        Ok(Piece::Fixed(translated))
    }
}

fn unsupported(expr: &Expr) -> ConvertError {
    ConvertError::UnsupportedConstruct(format!("negative lookahead {}", expr))
}

/// Look through non-capturing wrappers and one-item sequences
fn unwrap_single(expr: &Expr) -> &Expr {
    match expr {
        Expr::NonCapturingGroup(inner) => unwrap_single(inner),
        Expr::Sequence(items) if items.len() == 1 => unwrap_single(&items[0]),
        other => other,
    }
}

/// A class equivalent to an alternation whose every branch is one character
fn fold_single_chars(alternatives: &[Expr]) -> Option<Expr> {
    if alternatives.len() < 2 {
        return None;
    }
    let mut items = Vec::new();
    for alternative in alternatives {
        items.extend(alternative.single_char_items()?);
    }
    Some(Expr::char_class(false, items))
}

/// Add the other-case counterpart of every letter in a class
fn fold_items(items: &[ClassItem]) -> Vec<ClassItem> {
    let mut out = items.to_vec();
    let mut push = |item: ClassItem| {
        if !out.contains(&item) {
            out.push(item);
        }
    };
    for item in items {
        match *item {
            ClassItem::Char(c) => {
                for other in c.to_lowercase().chain(c.to_uppercase()) {
                    if other != c {
                        push(ClassItem::Char(other));
                    }
                }
            }
            ClassItem::Range(a, b) if a.is_ascii_lowercase() && b.is_ascii_lowercase() => {
                push(ClassItem::Range(a.to_ascii_uppercase(), b.to_ascii_uppercase()));
            }
            ClassItem::Range(a, b) if a.is_ascii_uppercase() && b.is_ascii_uppercase() => {
                push(ClassItem::Range(a.to_ascii_lowercase(), b.to_ascii_lowercase()));
            }
            _ => {}
        }
    }
    out
}
