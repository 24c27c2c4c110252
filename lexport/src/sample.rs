//! Representative strings for patterns
//!
//! Resolving a group token that defers to a nested lexer needs a string the
//! group's pattern matches. [`longest_sample`] draws random strings from the
//! pattern's AST with a seeded generator, checks each one against the
//! pattern with the `regex` crate where the pattern fits its syntax, and
//! keeps the longest accepted one. Every failed draw halves the repeat
//! bound, so later draws are shorter and more likely to succeed.

use std::collections::HashMap;

use regex::Regex;
use tracing::trace;

use crate::ast::{ClassItem, Expr, shorthand_matches};
use crate::error::{ConvertError, Result};

/// Sampling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOptions {
    /// Total draws allowed
    pub attempts: usize,
    /// Accepted draws after which sampling stops
    pub count: usize,
    /// Extra repetitions an unbounded repeat may draw
    pub max_repeat: u32,
    /// Generator seed
    pub seed: u64,
}

impl Default for SampleOptions {
    fn default() -> Self {
        SampleOptions {
            attempts: 100,
            count: 100,
            max_repeat: 8,
            seed: 0x853c_49e6_748f_ea9b,
        }
    }
}

/// XorShift generator; deterministic for a given seed
#[derive(Debug, Clone)]
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn with_seed(seed: u64) -> Self {
        // XorShift never leaves the all-zero state
        Self {
            state: if seed == 0 { 0x2545_f491_4f6c_dd1d } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Uniform-ish value in `0..n`; `n` must be non-zero
    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.below(items.len())])
        }
    }
}

/// Printable ASCII, the pool for negated sets
fn printable() -> impl Iterator<Item = char> {
    (0x20u8..0x7f).map(char::from)
}

struct Generator<'a> {
    rng: &'a mut SimpleRng,
    bound: u32,
    captures: HashMap<u32, String>,
}

impl Generator<'_> {
    fn gen_expr(&mut self, expr: &Expr, out: &mut String) -> Option<()> {
        match expr {
            Expr::Empty | Expr::Boundary(_) | Expr::Flags(_) => {}
            Expr::Lookahead(_)
            | Expr::NegativeLookahead(_)
            | Expr::Lookbehind(_)
            | Expr::NegativeLookbehind(_) => {}
            Expr::Literal(c) => out.push(*c),
            Expr::NotLiteral(c) => {
                let pool: Vec<char> = printable().filter(|x| x != c).collect();
                out.push(*self.rng.pick(&pool)?);
            }
            Expr::Any => {
                let pool: Vec<char> = printable().collect();
                out.push(*self.rng.pick(&pool)?);
            }
            Expr::Shorthand(s) => out.push(self.gen_shorthand(*s)?),
            Expr::CharacterClass(cc) => {
                if cc.negated {
                    let pool: Vec<char> = printable().filter(|c| cc.matches(*c)).collect();
                    out.push(*self.rng.pick(&pool)?);
                } else {
                    let item = self.rng.pick(&cc.items)?.clone();
                    out.push(self.gen_class_item(&item)?);
                }
            }
            Expr::Sequence(items) => {
                for item in items {
                    self.gen_expr(item, out)?;
                }
            }
            Expr::Alternation(alternatives) => {
                let choice = self.rng.pick(alternatives)?;
                self.gen_expr(choice, out)?;
            }
            Expr::Quantified { expr, quantifier } => {
                let ceiling = quantifier.min.saturating_add(self.bound);
                let max = quantifier.max.map_or(ceiling, |m| m.min(ceiling));
                let span = (max - quantifier.min) as usize + 1;
                let count = quantifier.min as usize + self.rng.below(span);
                for _ in 0..count {
                    self.gen_expr(expr, out)?;
                }
            }
            Expr::Group { index, expr, .. } => {
                let mut text = String::new();
                self.gen_expr(expr, &mut text)?;
                out.push_str(&text);
                self.captures.insert(*index, text);
            }
            Expr::NonCapturingGroup(expr) => self.gen_expr(expr, out)?,
            Expr::Conditional { group, yes, no } => {
                let branch = if self.captures.contains_key(group) { yes } else { no };
                self.gen_expr(branch, out)?;
            }
            Expr::Backreference(n) => out.push_str(self.captures.get(n)?),
        }
        Some(())
    }

    fn gen_shorthand(&mut self, shorthand: char) -> Option<char> {
        let pool: Vec<char> = match shorthand {
            'd' => ('0'..='9').collect(),
            'w' => ('a'..='z').chain('A'..='Z').chain('0'..='9').chain(['_']).collect(),
            's' => vec![' ', '\t'],
            other => printable().filter(|c| shorthand_matches(other, *c)).collect(),
        };
        self.rng.pick(&pool).copied()
    }

    fn gen_class_item(&mut self, item: &ClassItem) -> Option<char> {
        match *item {
            ClassItem::Char(c) => Some(c),
            ClassItem::Range(a, b) => {
                let (a, b) = (a as u32, b as u32);
                let offset = self.rng.below((b - a) as usize + 1) as u32;
                char::from_u32(a + offset)
            }
            ClassItem::Shorthand(s) => self.gen_shorthand(s),
        }
    }
}

/// An anchored `regex` crate matcher for the pattern, if it fits that syntax
pub fn full_matcher(expr: &Expr) -> Option<Regex> {
    let body = expr.to_rust_regex()?;
    Regex::new(&format!(r"\A(?:{})\z", body)).ok()
}

/// The longest accepted random string for a pattern, line breaks removed
pub fn longest_sample(expr: &Expr, options: &SampleOptions) -> Result<String> {
    let verifier = full_matcher(expr);
    let mut rng = SimpleRng::with_seed(options.seed);
    let mut bound = options.max_repeat;
    let mut best: Option<String> = None;
    let mut accepted = 0;

    for _ in 0..options.attempts {
        let mut generator = Generator {
            rng: &mut rng,
            bound,
            captures: HashMap::new(),
        };
        let mut candidate = String::new();
        let generated = generator.gen_expr(expr, &mut candidate).is_some();
        let verified =
            generated && verifier.as_ref().is_none_or(|re| re.is_match(&candidate));
        if !verified {
            bound /= 2;
            trace!(%candidate, bound, "sample rejected");
            continue;
        }
        let candidate: String = candidate.chars().filter(|c| !matches!(c, '\n' | '\r')).collect();
        if best.as_ref().is_none_or(|b| candidate.chars().count() > b.chars().count()) {
            best = Some(candidate);
        }
        accepted += 1;
        if accepted >= options.count {
            break;
        }
    }

    best.ok_or(ConvertError::SamplingExhausted {
        attempts: options.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn sample(pattern: &str) -> Result<String> {
        longest_sample(&parse(pattern).unwrap(), &SampleOptions::default())
    }

    #[test]
    fn test_simple_rng() {
        let mut rng = SimpleRng::with_seed(12345);
        let v1 = rng.next_u64();
        let v2 = rng.next_u64();
        assert_ne!(v1, v2);
        assert_ne!(SimpleRng::with_seed(0).next_u64(), 0);
    }

    #[test]
    fn test_sample_matches_pattern() {
        for pattern in [r"[a-z]+\d{2,3}", r"(foo|bar)baz", r"[^\s]+", r"\w+\s*=\s*\d+"] {
            let text = sample(pattern).unwrap();
            let re = Regex::new(&format!(r"\A(?:{})\z", pattern)).unwrap();
            assert!(re.is_match(&text), "{} did not match {}", text, pattern);
        }
    }

    #[test]
    fn test_sample_is_deterministic() {
        assert_eq!(sample(r"[a-z]{1,20}").unwrap(), sample(r"[a-z]{1,20}").unwrap());
    }

    #[test]
    fn test_sample_prefers_longest() {
        let text = sample(r"a{0,5}").unwrap();
        assert_eq!(text, "aaaaa");
    }

    #[test]
    fn test_sample_strips_newlines() {
        let text = sample(r"ab\n").unwrap();
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_backreference_replays_capture() {
        let text = sample(r#"(["'])x\1"#).unwrap();
        let mut chars = text.chars();
        assert_eq!(chars.next(), chars.last());
    }

    #[test]
    fn test_unsatisfiable_pattern_is_exhausted() {
        let options = SampleOptions {
            attempts: 5,
            ..Default::default()
        };
        let expr = parse(r"[^\x00-\x7f]").unwrap();
        assert_eq!(
            longest_sample(&expr, &options),
            Err(ConvertError::SamplingExhausted { attempts: 5 })
        );
    }
}
