//! Action resolution
//!
//! Turns a rule's action into the tokens the target rule carries, or into a
//! delegation the compiler must follow. Group tokens that defer to a nested
//! lexer are resolved by sampling a string for the group and asking the
//! nested lexer which token its first matching rule would give.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::{debug, warn};

use crate::ast::Expr;
use crate::error::{ConvertError, Result};
use crate::groups::{group_breakdown, top_level_groups};
use crate::lexicon::{Action, Entry, GroupToken, LexerDef, Lexicon, Pattern, ROOT_STATE};
use crate::normalize::{NormalizeOptions, normalize_pattern};
use crate::sample::{SampleOptions, longest_sample};
use crate::token::TokenType;

/// What a rule's action amounts to in the target
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Output tokens: one for a plain tag, one per top-level group otherwise
    Tokens(Vec<TokenType>),
    /// Matched text is scanned by another lexer or state
    Delegate(DelegateTarget),
}

/// Where a delegating rule sends its text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateTarget {
    /// An independently defined lexer, from its root state
    Lexer(String),
    /// A state of the current lexer; `None` is the state on top of the stack
    StackTop(Option<String>),
}

/// The first-matching-rule view of a lexer's root state
#[derive(Debug)]
struct Probe {
    rules: Vec<(Regex, TokenType)>,
}

impl Probe {
    fn token_for(&self, text: &str) -> TokenType {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, token)| token.clone())
            .unwrap_or_else(TokenType::text)
    }
}

/// Resolves actions for one compile pass
///
/// Nested lexer probes are cached for the lifetime of the resolver only.
pub struct Resolver<'a> {
    lexicon: &'a Lexicon,
    normalize: NormalizeOptions,
    sample: SampleOptions,
    probes: HashMap<String, Probe>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over a lexicon
    pub fn new(lexicon: &'a Lexicon, normalize: NormalizeOptions, sample: SampleOptions) -> Self {
        Resolver {
            lexicon,
            normalize,
            sample,
            probes: HashMap::new(),
        }
    }

    /// Resolve an action against the rule's normalized pattern
    pub fn resolve(&mut self, action: &Action, normalized: &Expr) -> Result<Resolution> {
        match action {
            Action::Tag(token) => Ok(Resolution::Tokens(vec![token.clone()])),
            Action::GroupBinding(tokens) => self.bind_groups(tokens, normalized),
            Action::DelegateToLexer { lexer } => {
                Ok(Resolution::Delegate(DelegateTarget::Lexer(lexer.clone())))
            }
            Action::DelegateToStackTop { state } => {
                Ok(Resolution::Delegate(DelegateTarget::StackTop(state.clone())))
            }
        }
    }

    fn bind_groups(&mut self, tokens: &[GroupToken], normalized: &Expr) -> Result<Resolution> {
        let groups = top_level_groups(normalized);
        if groups.len() != tokens.len() {
            return Err(ConvertError::UnsupportedConstruct(format!(
                "{} group tokens for {} top-level groups [{}]",
                tokens.len(),
                groups.len(),
                group_breakdown(normalized).join("; ")
            )));
        }
        let mut resolved = Vec::with_capacity(tokens.len());
        for (token, group) in tokens.iter().zip(groups) {
            resolved.push(match token {
                GroupToken::Token(t) => t.clone(),
                GroupToken::Using(lexer) => self.token_from_using(lexer, group)?,
            });
        }
        Ok(Resolution::Tokens(resolved))
    }

    /// The token a nested lexer gives text matched by `group`
    fn token_from_using(&mut self, lexer: &str, group: &Expr) -> Result<TokenType> {
        let text = match longest_sample(group, &self.sample) {
            Ok(text) => text,
            Err(err @ ConvertError::SamplingExhausted { .. }) => {
                warn!(%group, %err, "falling back to {}", TokenType::text());
                return Ok(TokenType::text());
            }
            Err(err) => return Err(err),
        };
        if !self.probes.contains_key(lexer) {
            let def = self.lexicon.get(lexer).ok_or_else(|| {
                ConvertError::UnsupportedConstruct(format!("unknown lexer '{}'", lexer))
            })?;
            let probe = self.build_probe(def);
            self.probes.insert(lexer.to_string(), probe);
        }
        let token = self
            .probes
            .get(lexer)
            .map_or_else(TokenType::text, |probe| probe.token_for(&text));
        debug!(lexer, sample = %text, %token, "resolved nested group token");
        Ok(token)
    }

    fn build_probe(&self, lexer: &LexerDef) -> Probe {
        let mut rules = Vec::new();
        let mut seen = HashSet::new();
        self.collect_probe_rules(lexer, ROOT_STATE, &mut seen, &mut rules);
        Probe { rules }
    }

    fn collect_probe_rules(
        &self,
        lexer: &LexerDef,
        state: &str,
        seen: &mut HashSet<String>,
        rules: &mut Vec<(Regex, TokenType)>,
    ) {
        if !seen.insert(state.to_string()) {
            return;
        }
        let Some((owner, entries)) = self.lexicon.find_state(lexer, state) else {
            return;
        };
        let options = NormalizeOptions {
            ignore_case: owner.ignore_case,
            ..self.normalize
        };
        for entry in entries {
            let rule = match entry {
                Entry::Include(other) => {
                    self.collect_probe_rules(lexer, other, seen, rules);
                    continue;
                }
                Entry::Rule(rule) => rule,
            };
            if rule.pattern == Pattern::Default {
                continue;
            }
            let token = match &rule.action {
                Action::Tag(t) => t.clone(),
                Action::GroupBinding(tokens) => tokens
                    .iter()
                    .find_map(|t| match t {
                        GroupToken::Token(t) => Some(t.clone()),
                        GroupToken::Using(_) => None,
                    })
                    .unwrap_or_else(TokenType::text),
                Action::DelegateToLexer { .. } | Action::DelegateToStackTop { .. } => {
                    TokenType::text()
                }
            };
            let prefix = normalize_pattern(&rule.pattern.source(), &options)
                .ok()
                .and_then(|n| n.expr.to_rust_regex())
                .and_then(|body| Regex::new(&format!(r"\A(?:{})", body)).ok());
            match prefix {
                Some(re) => rules.push((re, token)),
                None => debug!(pattern = %rule.pattern.source(), "rule not usable for probing"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Rule;
    use crate::parser::parse;

    fn tok(s: &str) -> TokenType {
        TokenType::new(s).unwrap()
    }

    fn lexicon() -> Lexicon {
        Lexicon::new(vec![LexerDef::new("Inner").with_state(
            "root",
            vec![
                Rule::tag(r"\d+", "Number").entry(),
                Rule::tag(r"[a-z]+", "Name").entry(),
            ],
        )])
        .unwrap()
    }

    fn normalized(pattern: &str) -> Expr {
        normalize_pattern(pattern, &NormalizeOptions::default())
            .unwrap()
            .expr
    }

    #[test]
    fn test_tag_resolves_to_single_token() {
        let lexicon = lexicon();
        let mut resolver =
            Resolver::new(&lexicon, NormalizeOptions::default(), SampleOptions::default());
        let resolution = resolver
            .resolve(&Action::Tag(tok("Keyword")), &parse("if").unwrap())
            .unwrap();
        assert_eq!(resolution, Resolution::Tokens(vec![tok("Keyword")]));
    }

    #[test]
    fn test_group_binding_aligns_with_groups() {
        let lexicon = lexicon();
        let mut resolver =
            Resolver::new(&lexicon, NormalizeOptions::default(), SampleOptions::default());
        let action = Action::GroupBinding(vec![
            GroupToken::Token(tok("Name")),
            GroupToken::Token(tok("Operator")),
        ]);
        let resolution = resolver.resolve(&action, &normalized(r"(\w+)(=)")).unwrap();
        assert_eq!(resolution, Resolution::Tokens(vec![tok("Name"), tok("Operator")]));
    }

    #[test]
    fn test_group_count_mismatch_is_unsupported() {
        let lexicon = lexicon();
        let mut resolver =
            Resolver::new(&lexicon, NormalizeOptions::default(), SampleOptions::default());
        let action = Action::GroupBinding(vec![GroupToken::Token(tok("Name"))]);
        let err = resolver
            .resolve(&action, &normalized(r"(?:a|b)(c)"))
            .unwrap_err();
        match err {
            ConvertError::UnsupportedConstruct(message) => {
                assert!(message.contains("group 1: (c)"));
                assert!(message.contains("group 2: (c)"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_using_runs_nested_first_match() {
        let lexicon = lexicon();
        let mut resolver =
            Resolver::new(&lexicon, NormalizeOptions::default(), SampleOptions::default());
        let action = Action::GroupBinding(vec![
            GroupToken::Using("Inner".into()),
            GroupToken::Token(tok("Punctuation")),
            GroupToken::Using("Inner".into()),
        ]);
        let resolution = resolver
            .resolve(&action, &normalized(r"([0-9]+)(:)([a-z]+)"))
            .unwrap();
        assert_eq!(
            resolution,
            Resolution::Tokens(vec![tok("Number"), tok("Punctuation"), tok("Name")])
        );
    }

    #[test]
    fn test_using_unknown_lexer() {
        let lexicon = lexicon();
        let mut resolver =
            Resolver::new(&lexicon, NormalizeOptions::default(), SampleOptions::default());
        let action = Action::GroupBinding(vec![GroupToken::Using("Nope".into())]);
        assert!(matches!(
            resolver.resolve(&action, &normalized("(a)")),
            Err(ConvertError::UnsupportedConstruct(_))
        ));
    }

    #[test]
    fn test_exhausted_sampling_degrades_to_text() {
        let lexicon = lexicon();
        let sample = SampleOptions {
            attempts: 3,
            ..Default::default()
        };
        let mut resolver = Resolver::new(&lexicon, NormalizeOptions::default(), sample);
        let action = Action::GroupBinding(vec![GroupToken::Using("Inner".into())]);
        let resolution = resolver
            .resolve(&action, &normalized(r"([^\x00-\x7f])"))
            .unwrap();
        assert_eq!(resolution, Resolution::Tokens(vec![TokenType::text()]));
    }

    #[test]
    fn test_delegations_are_distinct() {
        let lexicon = lexicon();
        let mut resolver =
            Resolver::new(&lexicon, NormalizeOptions::default(), SampleOptions::default());
        let expr = parse("x").unwrap();
        assert_eq!(
            resolver
                .resolve(&Action::DelegateToLexer { lexer: "Inner".into() }, &expr)
                .unwrap(),
            Resolution::Delegate(DelegateTarget::Lexer("Inner".into()))
        );
        assert_eq!(
            resolver
                .resolve(&Action::DelegateToStackTop { state: None }, &expr)
                .unwrap(),
            Resolution::Delegate(DelegateTarget::StackTop(None))
        );
    }
}
