//! State graph compiler
//!
//! Walks a lexer's state graph from `root` and builds a [`Program`]: the
//! block-structured rule list of the target dialect. Entering a state opens
//! a nested block, popping becomes an `exit` marker, and a state that pushes
//! itself becomes one delimited region.
//!
//! All traversal state lives in a [`Context`] threaded through the
//! recursion: the stack of active lexers, the stack of states on the current
//! descent (the recursion guard), the nesting depth and the resolver whose
//! nested-lexer cache lasts for one compile pass.

use tracing::{debug, info, warn};

use crate::ast::{Boundary, Expr, Quantifier};
use crate::error::{ConvertError, Diagnostic, Severity};
use crate::lexicon::{
    Action, Entry, GroupToken, LexerDef, Lexicon, NextState, Pattern, ROOT_STATE, Rule,
};
use crate::normalize::{NormalizeOptions, normalize_pattern};
use crate::resolve::{DelegateTarget, Resolution, Resolver};
use crate::sample::SampleOptions;
use crate::token::TokenType;

/// A compiled lexer, ready to be rendered
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Display name of the compiled lexer
    pub lexer: String,
    /// Top-level items
    pub items: Vec<Item>,
    /// Rules that were skipped or degraded
    pub diagnostics: Vec<Diagnostic>,
}

/// One element of a compiled program
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `# text`
    Comment(String),
    /// A single rule line
    Rule(TargetRule),
    /// `state <head> begin` ... `end`
    Block {
        /// Rule that opens the block
        head: TargetRule,
        /// Rules active inside the block
        items: Vec<Item>,
    },
    /// Bare `exit`, with a level count when not 1
    Exit(u32),
    /// Bare `exitall`
    ExitAll,
}

impl Item {
    /// Whether the item leaves the current block
    pub fn is_exit(&self) -> bool {
        match self {
            Item::Exit(_) | Item::ExitAll => true,
            Item::Rule(rule) => rule.exit != Exit::Stay,
            _ => false,
        }
    }
}

/// A rule of the target dialect
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRule {
    /// Shape of the rule
    pub form: RuleForm,
    /// Block exit after a match
    pub exit: Exit,
}

impl TargetRule {
    /// `TOKEN = 'pattern'`
    pub fn plain(token: TokenType, pattern: impl Into<String>) -> Self {
        TargetRule {
            form: RuleForm::Plain {
                token,
                pattern: pattern.into(),
            },
            exit: Exit::Stay,
        }
    }
}

/// The rule shapes of the target dialect
#[derive(Debug, Clone, PartialEq)]
pub enum RuleForm {
    /// `TOKEN = 'pattern'`
    Plain {
        /// Token of the whole match
        token: TokenType,
        /// Pattern text
        pattern: String,
    },
    /// `TOKEN start 'prefix'`: from the prefix to the end of the line
    Start {
        /// Token of the whole match
        token: TokenType,
        /// Pattern text of the prefix
        prefix: String,
    },
    /// ``(TOKEN,TOKEN) = `pattern` ``
    Groups {
        /// One token per top-level group
        tokens: Vec<TokenType>,
        /// Pattern text
        pattern: String,
    },
    /// `TOKEN delim 'open' 'close' [multiline] nested`
    Delim {
        /// Token of the region
        token: TokenType,
        /// Opening pattern
        open: String,
        /// Closing pattern
        close: String,
        /// Whether either delimiter can match a line break
        multiline: bool,
    },
}

/// What a rule does to the block nesting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// Nothing
    Stay,
    /// `exit` (`exit n`)
    Pop(u32),
    /// `exitall`
    All,
}

/// Compiler settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Pattern normalization; `ignore_case` is taken from each lexer
    pub normalize: NormalizeOptions,
    /// Sampling for nested group tokens
    pub sample: SampleOptions,
}

/// Traversal state of one compile pass
struct Context<'a> {
    lexers: Vec<&'a LexerDef>,
    visited: Vec<(String, String)>,
    depth: usize,
    resolver: Resolver<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Context<'a> {
    fn current(&self) -> &'a LexerDef {
        self.lexers[self.lexers.len() - 1]
    }

    fn has_lexer(&self, name: &str) -> bool {
        self.lexers.iter().any(|l| l.name == name)
    }
}

/// Where in the source an error arose
#[derive(Clone, Copy)]
struct Site<'s> {
    state: &'s str,
    pattern: &'s str,
}

impl Site<'_> {
    fn error(&self, cx: &Context<'_>, error: ConvertError) -> Diagnostic {
        Diagnostic::new(cx.current().name.as_str(), self.state, self.pattern, error)
    }
}

/// Compiles lexers of one lexicon
pub struct Compiler<'a> {
    lexicon: &'a Lexicon,
    options: CompileOptions,
}

impl<'a> Compiler<'a> {
    /// Create a compiler over a lexicon
    pub fn new(lexicon: &'a Lexicon, options: CompileOptions) -> Self {
        Compiler { lexicon, options }
    }

    /// Compile a lexer from its root state
    pub fn compile(&self, lexer: &'a LexerDef) -> Result<Program, Diagnostic> {
        self.compile_from(lexer, ROOT_STATE)
    }

    /// Compile a lexer from the given start state
    pub fn compile_from(&self, lexer: &'a LexerDef, start: &str) -> Result<Program, Diagnostic> {
        info!(lexer = %lexer.name, start, "compiling lexer");
        let mut cx = Context {
            lexers: vec![lexer],
            visited: Vec::new(),
            depth: 0,
            resolver: Resolver::new(self.lexicon, self.options.normalize, self.options.sample),
            diagnostics: Vec::new(),
        };
        let site = Site {
            state: start,
            pattern: "",
        };
        let items = self.state_items(&mut cx, start, site)?;
        Ok(Program {
            lexer: lexer.name.clone(),
            items,
            diagnostics: cx.diagnostics,
        })
    }

    /// Find a state: the current lexer's sources first, then the lexers
    /// further down the active stack
    fn find_state(&self, cx: &Context<'a>, state: &str) -> Option<(&'a LexerDef, &'a [Entry])> {
        let lexicon = self.lexicon;
        cx.lexers
            .iter()
            .rev()
            .find_map(|&lexer| lexicon.find_state(lexer, state))
    }

    /// The items of a state; empty when the state is already on the
    /// current descent
    fn state_items(
        &self,
        cx: &mut Context<'a>,
        state: &str,
        from: Site<'_>,
    ) -> Result<Vec<Item>, Diagnostic> {
        let key = (cx.current().name.clone(), state.to_string());
        if cx.visited.contains(&key) {
            debug!(lexer = %key.0, state, "state already on the stack");
            return Ok(Vec::new());
        }
        let (owner, entries) = self
            .find_state(cx, state)
            .ok_or_else(|| from.error(cx, ConvertError::UnresolvedState(state.to_string())))?;
        debug!(lexer = %key.0, state, owner = %owner.name, depth = cx.depth, "compiling state");

        cx.visited.push(key);
        let pushes_self = entries
            .iter()
            .any(|e| matches!(e, Entry::Rule(r) if r.next == NextState::Push));
        let result = if pushes_self {
            self.delim_state(cx, owner, state, entries)
        } else {
            let mut items = Vec::new();
            self.entries(cx, owner, state, entries, &mut items)
                .map(|()| items)
        };
        cx.visited.pop();
        result
    }

    fn entries(
        &self,
        cx: &mut Context<'a>,
        owner: &'a LexerDef,
        state: &str,
        entries: &[Entry],
        out: &mut Vec<Item>,
    ) -> Result<(), Diagnostic> {
        for entry in entries {
            match entry {
                Entry::Include(target) if target == ROOT_STATE => return_to_root(cx, out),
                Entry::Include(target) => {
                    let site = Site { state, pattern: "" };
                    out.extend(self.state_items(cx, target, site)?);
                }
                Entry::Rule(rule) => self.rule(cx, owner, state, rule, out)?,
            }
        }
        Ok(())
    }

    fn rule(
        &self,
        cx: &mut Context<'a>,
        owner: &'a LexerDef,
        state: &str,
        rule: &Rule,
        out: &mut Vec<Item>,
    ) -> Result<(), Diagnostic> {
        let source = rule.pattern.source();
        let site = Site {
            state,
            pattern: &source,
        };

        if rule.pattern == Pattern::Default {
            return self.default_entry(cx, state, &rule.next, site, out);
        }
        if let Some(delegation) = &cx.current().delegation
            && rule.action == Action::Tag(delegation.needle.clone())
        {
            let root = delegation.root.clone();
            return self.needle(cx, owner, rule, &root, site, out);
        }

        let Some(expr) = self.normalize_rule(cx, owner, rule, site)? else {
            return Ok(());
        };
        let resolution = cx
            .resolver
            .resolve(&rule.action, &expr)
            .map_err(|e| site.error(cx, e))?;
        let tokens = match resolution {
            Resolution::Tokens(tokens) => tokens,
            Resolution::Delegate(target) => {
                if rule.next != NextState::None {
                    debug!(
                        state,
                        pattern = %source,
                        next = %rule.next,
                        "transition of delegating rule ignored"
                    );
                }
                return self.delegate(cx, state, target, site, out);
            }
        };
        let grouped = matches!(rule.action, Action::GroupBinding(_));

        match &rule.next {
            NextState::None | NextState::Push => {
                match target_rule(tokens, expr, grouped, Exit::Stay, true) {
                    Some(head) => out.push(Item::Rule(head)),
                    None => {
                        debug!(state, pattern = %source, "rule reduced to an empty line prefix")
                    }
                }
            }
            NextState::Pop(n) => {
                if let Some(head) = target_rule(tokens, expr, grouped, Exit::Pop(*n), false) {
                    out.push(Item::Rule(head));
                }
            }
            NextState::Enter(target) if target == ROOT_STATE => {
                let exit = if cx.depth == 0 { Exit::Stay } else { Exit::All };
                if let Some(head) = target_rule(tokens, expr, grouped, exit, false) {
                    out.push(Item::Rule(head));
                }
            }
            NextState::Enter(target) => {
                if let Some(head) = target_rule(tokens, expr, grouped, Exit::Stay, false) {
                    out.extend(self.nested_levels(cx, head, &[target.clone()], site)?);
                }
            }
            NextState::PopThenEnter(target) => {
                if let Some(head) = target_rule(tokens, expr, grouped, Exit::Stay, false) {
                    out.extend(self.nested_levels(cx, head, &[target.clone()], site)?);
                }
            }
            NextState::EnterMultiple(list) => {
                let states: Vec<String> = list
                    .iter()
                    .filter(|s| *s != "#pop")
                    .map(|s| if s == "#push" { state.to_string() } else { s.clone() })
                    .collect();
                let exit = if states.is_empty() {
                    Exit::Pop(list.len() as u32)
                } else {
                    Exit::Stay
                };
                if let Some(head) = target_rule(tokens, expr, grouped, exit, false) {
                    if states.is_empty() {
                        out.push(Item::Rule(head));
                    } else {
                        out.extend(self.nested_levels(cx, head, &states, site)?);
                    }
                }
            }
        }
        Ok(())
    }

    /// Nested blocks for pushed states; the last state is the outermost
    /// block and later levels are opened by a catch-all continuation rule
    fn nested_levels(
        &self,
        cx: &mut Context<'a>,
        head: TargetRule,
        states: &[String],
        site: Site<'_>,
    ) -> Result<Vec<Item>, Diagnostic> {
        let Some((active, rest)) = states.split_last() else {
            return Ok(vec![Item::Rule(head)]);
        };
        cx.depth += 1;
        let mut items = self.state_items(cx, active, site)?;
        if !rest.is_empty() {
            let continuation = TargetRule::plain(TokenType::text(), ".");
            items.extend(self.nested_levels(cx, continuation, rest, site)?);
        }
        cx.depth -= 1;
        Ok(vec![
            Item::Comment(format!("{} state", active)),
            Item::Block { head, items },
        ])
    }

    fn default_entry(
        &self,
        cx: &mut Context<'a>,
        state: &str,
        next: &NextState,
        site: Site<'_>,
        out: &mut Vec<Item>,
    ) -> Result<(), Diagnostic> {
        let target = match next {
            NextState::None | NextState::Push => return Ok(()),
            NextState::Pop(n) => {
                out.push(Item::Exit(*n));
                return Ok(());
            }
            NextState::Enter(target) | NextState::PopThenEnter(target) => target.as_str(),
            NextState::EnterMultiple(list) => {
                match list.iter().rev().find(|s| *s != "#pop") {
                    Some(s) if s == "#push" => state,
                    Some(s) => s.as_str(),
                    None => {
                        out.push(Item::Exit(list.len() as u32));
                        return Ok(());
                    }
                }
            }
        };
        if target == ROOT_STATE {
            return_to_root(cx, out);
        } else {
            out.extend(self.state_items(cx, target, site)?);
        }
        Ok(())
    }

    /// A rule tagged with the composition's needle: the root lexer takes over
    fn needle(
        &self,
        cx: &mut Context<'a>,
        owner: &'a LexerDef,
        rule: &Rule,
        root: &str,
        site: Site<'_>,
        out: &mut Vec<Item>,
    ) -> Result<(), Diagnostic> {
        if rule.next != NextState::None {
            return Err(site.error(
                cx,
                ConvertError::StructuralMismatch(format!(
                    "needle rule with transition {}",
                    rule.next
                )),
            ));
        }
        let Some(expr) = self.normalize_rule(cx, owner, rule, site)? else {
            return Ok(());
        };
        let Action::Tag(needle) = &rule.action else {
            return Ok(());
        };
        let root_lexer = self.lexicon.get(root).ok_or_else(|| {
            site.error(
                cx,
                ConvertError::UnsupportedConstruct(format!("unknown lexer '{}'", root)),
            )
        })?;
        let head = TargetRule::plain(needle.clone(), expr.to_regex_string());
        let items = if cx.has_lexer(&root_lexer.name) {
            warn!(lexer = %root_lexer.name, "lexer already active, delegation left empty");
            Vec::new()
        } else {
            cx.lexers.push(root_lexer);
            cx.depth += 1;
            let items = self.state_items(cx, ROOT_STATE, site);
            cx.depth -= 1;
            cx.lexers.pop();
            items?
        };
        out.push(Item::Comment(format!("delegating to {} lexer", root_lexer.name)));
        out.push(Item::Block { head, items });
        Ok(())
    }

    fn delegate(
        &self,
        cx: &mut Context<'a>,
        state: &str,
        target: DelegateTarget,
        site: Site<'_>,
        out: &mut Vec<Item>,
    ) -> Result<(), Diagnostic> {
        match target {
            DelegateTarget::Lexer(name) => {
                let lexer = self.lexicon.get(&name).ok_or_else(|| {
                    site.error(
                        cx,
                        ConvertError::UnsupportedConstruct(format!("unknown lexer '{}'", name)),
                    )
                })?;
                if cx.has_lexer(&lexer.name) {
                    warn!(
                        lexer = %lexer.name,
                        state,
                        "lexer already active, delegation left empty"
                    );
                    return Ok(());
                }
                out.push(Item::Comment(format!("using {} lexer", lexer.name)));
                cx.lexers.push(lexer);
                let items = self.state_items(cx, ROOT_STATE, site);
                cx.lexers.pop();
                out.extend(items?);
            }
            DelegateTarget::StackTop(None) => {
                debug!(state, "delegation to the active state needs no rules");
            }
            DelegateTarget::StackTop(Some(target)) => {
                out.push(Item::Comment(format!("using {} state", target)));
                out.extend(self.state_items(cx, &target, site)?);
            }
        }
        Ok(())
    }

    /// A state with push-self rules: one delimited region whose inner block
    /// holds the state's other rules
    ///
    /// Below the top level the state was entered by a transition, so its
    /// closing rules are also emitted as exits from the entered block.
    fn delim_state(
        &self,
        cx: &mut Context<'a>,
        owner: &'a LexerDef,
        state: &str,
        entries: &'a [Entry],
    ) -> Result<Vec<Item>, Diagnostic> {
        let mut pushers = Vec::new();
        let mut poppers = Vec::new();
        let mut others = Vec::new();
        for entry in entries {
            match entry {
                Entry::Rule(rule) if rule.next == NextState::Push => pushers.push(rule),
                Entry::Rule(rule) if rule.next == NextState::Pop(1) => poppers.push(rule),
                other => others.push(other.clone()),
            }
        }

        let first = pushers[0];
        let first_source = first.pattern.source();
        let site = Site {
            state,
            pattern: &first_source,
        };
        let token = region_token(&first.action).ok_or_else(|| {
            site.error(
                cx,
                ConvertError::UnsupportedConstruct(format!(
                    "push-self rule of state '{}' delegates its match",
                    state
                )),
            )
        })?;
        if poppers.is_empty() {
            return Err(site.error(
                cx,
                ConvertError::UnsupportedConstruct(format!(
                    "push-self state '{}' has no closing rule",
                    state
                )),
            ));
        }

        let opening = self.delimiters(cx, owner, state, &pushers)?;
        let closing = self.delimiters(cx, owner, state, &poppers)?;
        let (Some(open), Some(close)) = (alternatives(&opening), alternatives(&closing)) else {
            return Err(site.error(
                cx,
                ConvertError::UnsupportedConstruct(format!(
                    "delimiters of state '{}' could not be translated",
                    state
                )),
            ));
        };
        let head = TargetRule {
            form: RuleForm::Delim {
                token,
                multiline: open.can_match_newline() || close.can_match_newline(),
                open: open.to_regex_string(),
                close: close.to_regex_string(),
            },
            exit: Exit::Stay,
        };

        let mut items = if others.is_empty() {
            vec![Item::Rule(head)]
        } else {
            cx.depth += 1;
            let mut inner = Vec::new();
            let result = self.entries(cx, owner, state, &others, &mut inner);
            cx.depth -= 1;
            result?;
            vec![
                Item::Comment(format!("nested {} state", state)),
                Item::Block { head, items: inner },
            ]
        };

        if cx.depth > 0 {
            for (rule, expr) in closing {
                let source = rule.pattern.source();
                let site = Site {
                    state,
                    pattern: &source,
                };
                let tokens = match cx.resolver.resolve(&rule.action, &expr) {
                    Ok(Resolution::Tokens(tokens)) => tokens,
                    Ok(Resolution::Delegate(_)) => vec![TokenType::text()],
                    Err(e) => return Err(site.error(cx, e)),
                };
                let grouped = matches!(rule.action, Action::GroupBinding(_));
                if let Some(exit) = target_rule(tokens, expr, grouped, Exit::Pop(1), false) {
                    items.push(Item::Rule(exit));
                }
            }
        }
        Ok(items)
    }

    /// Normalized delimiter patterns; skipped rules are left out
    fn delimiters<'r>(
        &self,
        cx: &mut Context<'a>,
        owner: &'a LexerDef,
        state: &str,
        rules: &[&'r Rule],
    ) -> Result<Vec<(&'r Rule, Expr)>, Diagnostic> {
        let mut parts = Vec::new();
        for &rule in rules {
            let source = rule.pattern.source();
            let site = Site {
                state,
                pattern: &source,
            };
            if let Some(expr) = self.normalize_rule(cx, owner, rule, site)? {
                parts.push((rule, expr));
            }
        }
        Ok(parts)
    }

    /// Normalize a rule's pattern; `None` when the rule is skipped
    fn normalize_rule(
        &self,
        cx: &mut Context<'a>,
        owner: &'a LexerDef,
        rule: &Rule,
        site: Site<'_>,
    ) -> Result<Option<Expr>, Diagnostic> {
        let options = NormalizeOptions {
            ignore_case: owner.ignore_case,
            ..self.options.normalize
        };
        let result = match normalize_pattern(site.pattern, &options) {
            Err(err @ ConvertError::ExpansionOverflow { .. })
                if matches!(rule.action, Action::Tag(_)) =>
            {
                warn!(lexer = %cx.current().name, state = site.state, pattern = site.pattern, %err,
                    "promoting groups instead of expanding");
                normalize_pattern(site.pattern, &options.promoting())
            }
            other => other,
        };
        match result {
            Ok(normalized) => {
                for note in &normalized.report.unsafe_translations {
                    warn!(lexer = %cx.current().name, state = site.state, pattern = site.pattern,
                        "unsafe translation: {}", note);
                }
                Ok(Some(normalized.expr))
            }
            Err(err) if err.severity() == Severity::Rule => {
                let diagnostic = site.error(cx, err);
                warn!("{}; rule skipped", diagnostic);
                cx.diagnostics.push(diagnostic);
                Ok(None)
            }
            Err(err) => Err(site.error(cx, err)),
        }
    }
}

/// Token of a delimited region: the rule's tag, or the first fixed group
/// token of a group-bound opener
fn region_token(action: &Action) -> Option<TokenType> {
    match action {
        Action::Tag(token) => Some(token.clone()),
        Action::GroupBinding(groups) => Some(
            groups
                .iter()
                .find_map(|g| match g {
                    GroupToken::Token(token) => Some(token.clone()),
                    GroupToken::Using(_) => None,
                })
                .unwrap_or_else(TokenType::text),
        ),
        Action::DelegateToLexer { .. } | Action::DelegateToStackTop { .. } => None,
    }
}

/// The alternation of several delimiter patterns, each in its own group
fn alternatives(parts: &[(&Rule, Expr)]) -> Option<Expr> {
    let mut patterns: Vec<Expr> = parts
        .iter()
        .map(|(_, expr)| strip_leading_caret(expr.clone()))
        .collect();
    match patterns.len() {
        0 => None,
        1 => patterns.pop(),
        _ => Some(Expr::alternation(
            patterns.into_iter().map(|p| Expr::group(0, p)).collect(),
        )),
    }
}

/// Return to the root block, unless already at it or just exited
fn return_to_root(cx: &Context<'_>, out: &mut Vec<Item>) {
    if cx.depth == 0 || out.last().is_some_and(Item::is_exit) {
        return;
    }
    out.push(Item::ExitAll);
}

/// Build the target rule for resolved tokens
///
/// With `allow_start`, a pattern running to the end of the line becomes a
/// `start` rule (and is dropped when nothing precedes the line end).
/// Otherwise a trailing newline becomes `$`.
fn target_rule(
    tokens: Vec<TokenType>,
    expr: Expr,
    grouped: bool,
    exit: Exit,
    allow_start: bool,
) -> Option<TargetRule> {
    if grouped {
        let pattern = strip_leading_caret(expr).to_regex_string();
        return Some(TargetRule {
            form: RuleForm::Groups { tokens, pattern },
            exit,
        });
    }
    let token = tokens.into_iter().next().unwrap_or_else(TokenType::text);
    let form = if allow_start && let Some(prefix) = line_prefix(&expr) {
        if prefix.is_empty() {
            return None;
        }
        RuleForm::Start { token, prefix }
    } else {
        RuleForm::Plain {
            token,
            pattern: newline_to_eol(expr).to_regex_string(),
        }
    };
    Some(TargetRule { form, exit })
}

fn is_dot_star(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Quantified {
            expr,
            quantifier: Quantifier { min: 0, max: None, .. },
        } if **expr == Expr::Any
    )
}

/// The prefix of a pattern ending in `\n`, `.*` or `.*$`
fn line_prefix(expr: &Expr) -> Option<String> {
    let items: &[Expr] = match expr {
        Expr::Sequence(items) => items,
        Expr::Alternation(_) => return None,
        single => std::slice::from_ref(single),
    };
    let mut end = items.len();
    match items.last()? {
        Expr::Literal('\n') => {
            end -= 1;
            if end > 0 && is_dot_star(&items[end - 1]) {
                end -= 1;
            }
        }
        last if is_dot_star(last) => end -= 1,
        Expr::Boundary(Boundary::End) if end >= 2 && is_dot_star(&items[end - 2]) => end -= 2,
        _ => return None,
    }
    Some(Expr::sequence(items[..end].to_vec()).to_regex_string())
}

/// Replace a trailing newline with an end-of-line anchor
fn newline_to_eol(expr: Expr) -> Expr {
    match expr {
        Expr::Literal('\n') => Expr::Boundary(Boundary::End),
        Expr::Sequence(mut items) if items.last() == Some(&Expr::Literal('\n')) => {
            items.pop();
            items.push(Expr::Boundary(Boundary::End));
            Expr::Sequence(items)
        }
        other => other,
    }
}

fn strip_leading_caret(expr: Expr) -> Expr {
    match expr {
        Expr::Boundary(Boundary::Start) => Expr::Empty,
        Expr::Sequence(mut items) if items.first() == Some(&Expr::Boundary(Boundary::Start)) => {
            items.remove(0);
            Expr::sequence(items)
        }
        other => other,
    }
}
