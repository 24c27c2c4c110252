//! Lexer definitions
//!
//! A [`Lexicon`] is the read-only catalogue of lexers a run translates. Each
//! [`LexerDef`] holds named states of ordered entries; an entry is either a
//! [`Rule`] (pattern, action, next state) or an `include` of another state.
//!
//! Lexicons are loaded from JSON. The wire shapes are kept in private `Raw*`
//! structs and converted with `TryFrom`, so a malformed entry is reported
//! with the lexer and state it sits in.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::ast::Expr;
use crate::error::LexiconError;
use crate::token::TokenType;

/// Name of the entry state of every lexer
pub const ROOT_STATE: &str = "root";

/// The catalogue of lexers for one run
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    lexers: Vec<LexerDef>,
}

impl Lexicon {
    /// Build a lexicon, rejecting duplicate display names
    pub fn new(lexers: Vec<LexerDef>) -> Result<Self, LexiconError> {
        let mut seen = HashSet::new();
        for lexer in &lexers {
            if !seen.insert(lexer.name.as_str()) {
                return Err(LexiconError::DuplicateLexer(lexer.name.clone()));
            }
        }
        Ok(Lexicon { lexers })
    }

    /// Parse a lexicon from its JSON text
    pub fn from_json(text: &str) -> Result<Self, LexiconError> {
        let raw: RawLexicon = serde_json::from_str(text)?;
        let lexers = raw
            .lexers
            .into_iter()
            .map(LexerDef::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Lexicon::new(lexers)
    }

    /// Read and parse a lexicon file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LexiconError> {
        let text = std::fs::read_to_string(path)?;
        Lexicon::from_json(&text)
    }

    /// All lexers in file order
    pub fn lexers(&self) -> &[LexerDef] {
        &self.lexers
    }

    /// Find a lexer by display name or alias, ignoring case
    pub fn get(&self, name: &str) -> Option<&LexerDef> {
        self.lexers.iter().find(|l| l.name == name).or_else(|| {
            self.lexers.iter().find(|l| {
                l.name.eq_ignore_ascii_case(name)
                    || l.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
            })
        })
    }

    /// Locate a state table for `lexer`
    ///
    /// Sources in priority order: the lexer's own table, the language lexer
    /// of a delegating composition, then the inherited lexers depth-first.
    /// Returns the lexer that owns the table along with the entries.
    pub fn find_state<'a>(
        &'a self,
        lexer: &'a LexerDef,
        state: &str,
    ) -> Option<(&'a LexerDef, &'a [Entry])> {
        let mut seen = HashSet::new();
        self.find_state_in(lexer, state, &mut seen)
    }

    fn find_state_in<'a>(
        &'a self,
        lexer: &'a LexerDef,
        state: &str,
        seen: &mut HashSet<&'a str>,
    ) -> Option<(&'a LexerDef, &'a [Entry])> {
        if !seen.insert(lexer.name.as_str()) {
            return None;
        }
        if let Some(entries) = lexer.state(state) {
            return Some((lexer, entries));
        }
        let language = lexer.delegation.as_ref().map(|d| d.language.as_str());
        language
            .into_iter()
            .chain(lexer.inherits.iter().map(String::as_str))
            .filter_map(|name| self.get(name))
            .find_map(|source| self.find_state_in(source, state, seen))
    }
}

/// One lexer: metadata plus its state table
#[derive(Debug, Clone, Default)]
pub struct LexerDef {
    /// Display name, e.g. `Python`
    pub name: String,
    /// Short names, e.g. `py`
    pub aliases: Vec<String>,
    /// File name globs, e.g. `*.py`
    pub filenames: Vec<String>,
    /// Secondary file name globs
    pub alias_filenames: Vec<String>,
    /// Patterns of this lexer are matched case-insensitively
    pub ignore_case: bool,
    /// Lexers whose state tables fill in missing states, highest priority first
    pub inherits: Vec<String>,
    /// Set when this lexer is a delegating composition
    pub delegation: Option<Delegation>,
    /// State name to ordered entries
    pub states: BTreeMap<String, Vec<Entry>>,
}

impl LexerDef {
    /// Create an empty lexer
    pub fn new(name: impl Into<String>) -> Self {
        LexerDef {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a state
    pub fn with_state(mut self, name: impl Into<String>, entries: Vec<Entry>) -> Self {
        self.states.insert(name.into(), entries);
        self
    }

    /// Set the aliases
    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Set the file name globs
    pub fn with_filenames(mut self, filenames: &[&str]) -> Self {
        self.filenames = filenames.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the inherited lexers
    pub fn with_inherits(mut self, inherits: &[&str]) -> Self {
        self.inherits = inherits.iter().map(|i| i.to_string()).collect();
        self
    }

    /// Make this lexer a delegating composition
    pub fn with_delegation(mut self, delegation: Delegation) -> Self {
        self.delegation = Some(delegation);
        self
    }

    /// The lexer's own entries for a state
    pub fn state(&self, name: &str) -> Option<&[Entry]> {
        self.states.get(name).map(Vec::as_slice)
    }
}

/// A delegating composition
///
/// The `language` lexer scans first; text it tags with `needle` is
/// re-scanned by the `root` lexer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Delegation {
    /// Lexer re-scanning needle text
    pub root: String,
    /// Lexer providing the state table
    pub language: String,
    /// Token marking the re-scan boundary
    #[serde(default = "default_needle")]
    pub needle: TokenType,
}

fn default_needle() -> TokenType {
    TokenType::root().child("Other")
}

/// One element of a state's list
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// A matching rule
    Rule(Rule),
    /// Splice another state's entries here
    Include(String),
}

/// A matching rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// What the rule matches
    pub pattern: Pattern,
    /// What matched text becomes
    pub action: Action,
    /// State transition after a match
    pub next: NextState,
}

impl Rule {
    /// A regex rule with a plain token and no transition
    pub fn tag(pattern: &str, token: &str) -> Self {
        Rule {
            pattern: Pattern::Regex(pattern.to_string()),
            action: Action::Tag(TokenType::new(token).unwrap_or_else(|_| TokenType::text())),
            next: NextState::None,
        }
    }

    /// A regex rule with an explicit action
    pub fn with_action(pattern: &str, action: Action) -> Self {
        Rule {
            pattern: Pattern::Regex(pattern.to_string()),
            action,
            next: NextState::None,
        }
    }

    /// A `default` entry: match nothing and transition
    pub fn default_to(next: NextState) -> Self {
        Rule {
            pattern: Pattern::Default,
            action: Action::Tag(TokenType::text()),
            next,
        }
    }

    /// Set the transition
    pub fn then(mut self, next: NextState) -> Self {
        self.next = next;
        self
    }

    /// Wrap into a state entry
    pub fn entry(self) -> Entry {
        Entry::Rule(self)
    }
}

/// What a rule matches
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// A pattern in the source dialect
    Regex(String),
    /// A fixed word set with optional surrounding patterns
    Words {
        /// The words, matched literally
        words: Vec<String>,
        /// Pattern before the words
        prefix: String,
        /// Pattern after the words
        suffix: String,
    },
    /// The empty match of a `default` entry
    Default,
}

impl Pattern {
    /// Pattern text in the source dialect
    ///
    /// Words are escaped and ordered longest first so the first matching
    /// alternative is also the longest.
    pub fn source(&self) -> String {
        match self {
            Pattern::Regex(text) => text.clone(),
            Pattern::Words {
                words,
                prefix,
                suffix,
            } => {
                let mut sorted: Vec<&String> = words.iter().collect();
                sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
                let alternatives: Vec<String> = sorted
                    .into_iter()
                    .map(|w| Expr::text(w).to_regex_string())
                    .collect();
                format!("{}(?:{}){}", prefix, alternatives.join("|"), suffix)
            }
            Pattern::Default => String::new(),
        }
    }
}

/// What matched text becomes
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The whole match gets one token
    Tag(TokenType),
    /// One entry per top-level capturing group
    GroupBinding(Vec<GroupToken>),
    /// Hand the match to another lexer
    DelegateToLexer {
        /// Name of the lexer
        lexer: String,
    },
    /// Hand the match to a state of this lexer; `None` means the state on top
    /// of the current stack
    DelegateToStackTop {
        /// Explicit state to scan with
        state: Option<String>,
    },
}

/// The token bound to one capturing group
#[derive(Debug, Clone, PartialEq)]
pub enum GroupToken {
    /// A fixed token
    Token(TokenType),
    /// Whatever the named lexer makes of the group's text
    Using(String),
}

/// State transition after a rule matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextState {
    /// Stay in the current state
    None,
    /// Push the current state again (`#push`)
    Push,
    /// Enter a state
    Enter(String),
    /// Push several states; the last one becomes active
    EnterMultiple(Vec<String>),
    /// Pop `n` states
    Pop(u32),
    /// Pop the current state and enter another
    PopThenEnter(String),
}

impl NextState {
    /// Parse a list transition, folding `["#pop", s]` into `PopThenEnter`
    pub fn from_list(states: Vec<String>) -> Result<Self, String> {
        match states.as_slice() {
            [] => Ok(NextState::None),
            [single] => single.parse(),
            [first, second] if first == "#pop" && !second.starts_with('#') => {
                Ok(NextState::PopThenEnter(second.clone()))
            }
            _ => {
                if let Some(bad) = states
                    .iter()
                    .find(|s| s.starts_with('#') && *s != "#pop" && *s != "#push")
                {
                    return Err(format!("'{}' cannot appear in a state list", bad));
                }
                Ok(NextState::EnterMultiple(states))
            }
        }
    }
}

impl FromStr for NextState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "#none" => Ok(NextState::None),
            "#push" => Ok(NextState::Push),
            "#pop" => Ok(NextState::Pop(1)),
            _ => {
                if let Some(count) = s.strip_prefix("#pop:") {
                    return count
                        .parse::<u32>()
                        .map(NextState::Pop)
                        .map_err(|_| format!("invalid pop count in '{}'", s));
                }
                if s.starts_with('#') {
                    return Err(format!("unknown transition '{}'", s));
                }
                Ok(NextState::Enter(s.to_string()))
            }
        }
    }
}

impl fmt::Display for NextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextState::None => write!(f, "#none"),
            NextState::Push => write!(f, "#push"),
            NextState::Enter(s) => write!(f, "{}", s),
            NextState::EnterMultiple(states) => write!(f, "[{}]", states.join(", ")),
            NextState::Pop(1) => write!(f, "#pop"),
            NextState::Pop(n) => write!(f, "#pop:{}", n),
            NextState::PopThenEnter(s) => write!(f, "[#pop, {}]", s),
        }
    }
}

#[derive(Deserialize)]
struct RawLexicon {
    lexers: Vec<RawLexer>,
}

#[derive(Deserialize)]
struct RawLexer {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    filenames: Vec<String>,
    #[serde(default)]
    alias_filenames: Vec<String>,
    #[serde(default)]
    ignore_case: bool,
    #[serde(default)]
    inherits: Vec<String>,
    #[serde(default)]
    delegation: Option<Delegation>,
    #[serde(default)]
    states: BTreeMap<String, Vec<RawEntry>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNext {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGroupToken {
    Token(TokenType),
    Using { using: String },
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    include: Option<String>,
    default: Option<RawNext>,
    pattern: Option<String>,
    words: Option<Vec<String>>,
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    suffix: String,
    token: Option<TokenType>,
    groups: Option<Vec<RawGroupToken>>,
    using: Option<String>,
    #[serde(default, deserialize_with = "present")]
    using_this: Option<Option<String>>,
    next: Option<RawNext>,
}

/// Distinguish `"using_this": null` from an absent key
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn parse_next(raw: Option<RawNext>) -> Result<NextState, String> {
    match raw {
        None => Ok(NextState::None),
        Some(RawNext::One(s)) => s.parse(),
        Some(RawNext::Many(list)) => NextState::from_list(list),
    }
}

impl TryFrom<RawEntry> for Entry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        if let Some(state) = raw.include {
            return Ok(Entry::Include(state));
        }
        if let Some(next) = raw.default {
            return Ok(Rule::default_to(parse_next(Some(next))?).entry());
        }
        let pattern = match (raw.pattern, raw.words) {
            (Some(text), None) => Pattern::Regex(text),
            (None, Some(words)) => Pattern::Words {
                words,
                prefix: raw.prefix,
                suffix: raw.suffix,
            },
            (Some(_), Some(_)) => return Err("both 'pattern' and 'words' given".to_string()),
            (None, None) => {
                return Err("entry needs 'include', 'default', 'pattern' or 'words'".to_string());
            }
        };
        let action = match (raw.token, raw.groups, raw.using, raw.using_this) {
            (Some(token), None, None, None) => Action::Tag(token),
            (None, Some(groups), None, None) => Action::GroupBinding(
                groups
                    .into_iter()
                    .map(|g| match g {
                        RawGroupToken::Token(t) => GroupToken::Token(t),
                        RawGroupToken::Using { using } => GroupToken::Using(using),
                    })
                    .collect(),
            ),
            (None, None, Some(lexer), None) => Action::DelegateToLexer { lexer },
            (None, None, None, Some(state)) => Action::DelegateToStackTop { state },
            _ => {
                return Err(
                    "exactly one of 'token', 'groups', 'using', 'using_this' is required"
                        .to_string(),
                );
            }
        };
        Ok(Entry::Rule(Rule {
            pattern,
            action,
            next: parse_next(raw.next)?,
        }))
    }
}

impl TryFrom<RawLexer> for LexerDef {
    type Error = LexiconError;

    fn try_from(raw: RawLexer) -> Result<Self, Self::Error> {
        let mut states = BTreeMap::new();
        for (state, entries) in raw.states {
            let entries = entries
                .into_iter()
                .map(Entry::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|message| LexiconError::InvalidEntry {
                    lexer: raw.name.clone(),
                    state: state.clone(),
                    message,
                })?;
            states.insert(state, entries);
        }
        Ok(LexerDef {
            name: raw.name,
            aliases: raw.aliases,
            filenames: raw.filenames,
            alias_filenames: raw.alias_filenames,
            ignore_case: raw.ignore_case,
            inherits: raw.inherits,
            delegation: raw.delegation,
            states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{
        "lexers": [
            {
                "name": "Example",
                "aliases": ["ex"],
                "filenames": ["*.ex"],
                "states": {
                    "root": [
                        {"pattern": "\\s+", "token": "Text"},
                        {"words": ["if", "else"], "suffix": "\\b", "token": "Keyword"},
                        {"pattern": "\"", "token": "String", "next": "string"},
                        {"pattern": "(\\w+)(=)", "groups": ["Name", {"using": "Other"}]},
                        {"include": "common"}
                    ],
                    "string": [
                        {"pattern": "\"", "token": "String", "next": "#pop"},
                        {"default": ["#pop", "root"]}
                    ],
                    "common": [
                        {"pattern": "<<", "using_this": null},
                        {"pattern": "@", "using": "Other", "next": "#pop:2"}
                    ]
                }
            },
            {"name": "Other", "states": {"root": [{"pattern": ".", "token": "Name"}]}}
        ]
    }"##;

    #[test]
    fn test_load_sample() {
        let lexicon = Lexicon::from_json(SAMPLE).unwrap();
        assert_eq!(lexicon.lexers().len(), 2);
        let ex = lexicon.get("ex").unwrap();
        assert_eq!(ex.name, "Example");
        let root = ex.state("root").unwrap();
        assert_eq!(root.len(), 5);
        assert_eq!(root[4], Entry::Include("common".to_string()));
        assert!(matches!(
            &root[3],
            Entry::Rule(Rule { action: Action::GroupBinding(groups), .. })
                if groups[1] == GroupToken::Using("Other".to_string())
        ));
    }

    #[test]
    fn test_transitions() {
        let lexicon = Lexicon::from_json(SAMPLE).unwrap();
        let ex = lexicon.get("Example").unwrap();
        let string = ex.state("string").unwrap();
        assert!(matches!(&string[0], Entry::Rule(r) if r.next == NextState::Pop(1)));
        assert!(matches!(
            &string[1],
            Entry::Rule(Rule { pattern: Pattern::Default, next: NextState::PopThenEnter(s), .. })
                if s == "root"
        ));
        let common = ex.state("common").unwrap();
        assert!(matches!(
            &common[0],
            Entry::Rule(Rule { action: Action::DelegateToStackTop { state: None }, .. })
        ));
        assert!(matches!(
            &common[1],
            Entry::Rule(Rule { action: Action::DelegateToLexer { .. }, next: NextState::Pop(2), .. })
        ));
    }

    #[test]
    fn test_next_state_parsing() {
        assert_eq!("#push".parse::<NextState>().unwrap(), NextState::Push);
        assert_eq!("#pop:3".parse::<NextState>().unwrap(), NextState::Pop(3));
        assert_eq!("body".parse::<NextState>().unwrap(), NextState::Enter("body".into()));
        assert!("#pop:x".parse::<NextState>().is_err());
        assert!("#bogus".parse::<NextState>().is_err());
        assert_eq!(
            NextState::from_list(vec!["a".into(), "b".into()]).unwrap(),
            NextState::EnterMultiple(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_words_source() {
        let pattern = Pattern::Words {
            words: vec!["in".into(), "int".into(), "a.b".into()],
            prefix: String::new(),
            suffix: "\\b".into(),
        };
        assert_eq!(pattern.source(), "(?:int|a\\.b|in)\\b");
    }

    #[test]
    fn test_invalid_entry_reports_location() {
        let text = r#"{"lexers": [{"name": "Bad", "states": {"root": [{"pattern": "a"}]}}]}"#;
        let err = Lexicon::from_json(text).unwrap_err();
        assert!(matches!(
            err,
            LexiconError::InvalidEntry { ref lexer, ref state, .. } if lexer == "Bad" && state == "root"
        ));
    }

    #[test]
    fn test_find_state_priority() {
        let lexicon = Lexicon::new(vec![
            LexerDef::new("Composite")
                .with_inherits(&["Base"])
                .with_delegation(Delegation {
                    root: "Html".into(),
                    language: "Lang".into(),
                    needle: TokenType::root().child("Other"),
                }),
            LexerDef::new("Lang").with_state("root", vec![Rule::tag("l", "Name").entry()]),
            LexerDef::new("Base")
                .with_inherits(&["Grand"])
                .with_state("root", vec![Rule::tag("b", "Name").entry()])
                .with_state("extra", vec![]),
            LexerDef::new("Grand").with_state("deep", vec![]),
        ])
        .unwrap();
        let composite = lexicon.get("Composite").unwrap();
        let (owner, _) = lexicon.find_state(composite, "root").unwrap();
        assert_eq!(owner.name, "Lang");
        let (owner, _) = lexicon.find_state(composite, "extra").unwrap();
        assert_eq!(owner.name, "Base");
        let (owner, _) = lexicon.find_state(composite, "deep").unwrap();
        assert_eq!(owner.name, "Grand");
        assert!(lexicon.find_state(composite, "missing").is_none());
    }

    #[test]
    fn test_find_state_inheritance_cycle() {
        let lexicon = Lexicon::new(vec![
            LexerDef::new("A").with_inherits(&["B"]),
            LexerDef::new("B").with_inherits(&["A"]),
        ])
        .unwrap();
        assert!(lexicon.find_state(lexicon.get("A").unwrap(), "root").is_none());
    }

    #[test]
    fn test_duplicate_lexer() {
        let result = Lexicon::new(vec![LexerDef::new("A"), LexerDef::new("A")]);
        assert!(matches!(result, Err(LexiconError::DuplicateLexer(_))));
    }

    #[test]
    fn test_delegation_default_needle() {
        let text = r#"{"lexers": [{"name": "Html+X", "delegation": {"root": "Html", "language": "X"}}]}"#;
        let lexicon = Lexicon::from_json(text).unwrap();
        let delegation = lexicon.lexers()[0].delegation.as_ref().unwrap();
        assert_eq!(delegation.needle.as_str(), "Token.Other");
    }
}
