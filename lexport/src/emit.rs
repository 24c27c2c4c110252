//! Output emitter
//!
//! Renders compiled programs as source-highlight language definitions and
//! collects the alias table that maps every lexer name, alias and file
//! extension to its output file.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::compiler::{Exit, Item, Program, RuleForm, TargetRule};
use crate::lexicon::LexerDef;

/// Default origin named in file headers
pub const DEFAULT_SOURCE: &str = "pygments";

/// Name of the alias table file
pub const LANG_MAP: &str = "lang.map";

const INDENT: &str = "  ";

/// Render a program with the default header
pub fn render(program: &Program) -> String {
    render_with_source(program, DEFAULT_SOURCE)
}

/// Render a program, naming `source` in the header
pub fn render_with_source(program: &Program, source: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# autogenerated from {} for {}", source, program.lexer);
    render_items(&program.items, 0, &mut out);
    out
}

fn render_items(items: &[Item], level: usize, out: &mut String) {
    for item in items {
        let line = match item {
            Item::Comment(text) if text.is_empty() => continue,
            Item::Comment(text) => format!("# {}", text),
            Item::Rule(rule) => rule_line(rule),
            Item::Block { head, items } => {
                push_line(out, level, &format!("state {} begin", rule_line(head)));
                render_items(items, level + 1, out);
                push_line(out, level, "end");
                continue;
            }
            Item::Exit(1) => "exit".to_string(),
            Item::Exit(n) => format!("exit {}", n),
            Item::ExitAll => "exitall".to_string(),
        };
        push_line(out, level, &line);
    }
}

fn push_line(out: &mut String, level: usize, line: &str) {
    out.push_str(&INDENT.repeat(level));
    out.push_str(line);
    out.push('\n');
}

/// One rule as a line of the target dialect
pub fn rule_line(rule: &TargetRule) -> String {
    let mut line = match &rule.form {
        RuleForm::Plain { token, pattern } => {
            format!("{} = '{}'", token.rule_name(), quote(pattern))
        }
        RuleForm::Start { token, prefix } => {
            format!("{} start '{}'", token.rule_name(), quote(prefix))
        }
        RuleForm::Groups { tokens, pattern } => {
            let names: Vec<String> = tokens.iter().map(|t| t.rule_name()).collect();
            format!("({}) = `{}`", names.join(","), pattern.replace('`', r"\x60"))
        }
        RuleForm::Delim {
            token,
            open,
            close,
            multiline,
        } => format!(
            "{} delim '{}' '{}' {}nested",
            token.rule_name(),
            quote(open),
            quote(close),
            if *multiline { "multiline " } else { "" }
        ),
    };
    match rule.exit {
        Exit::Stay => {}
        Exit::Pop(1) => line.push_str(" exit"),
        Exit::Pop(n) => {
            let _ = write!(line, " exit {}", n);
        }
        Exit::All => line.push_str(" exitall"),
    }
    line
}

/// Quote pattern text for a single-quoted string
pub fn quote(pattern: &str) -> String {
    pattern.replace('\'', r"\x27")
}

/// Output file name for a lexer display name
///
/// # Example
///
/// ```
/// use lexport::emit::file_name;
///
/// assert_eq!(file_name("HTML+Django/Jinja"), "htmldjangojinja.lang");
/// assert_eq!(file_name("Visual Basic"), "visual-basic.lang");
/// ```
pub fn file_name(name: &str) -> String {
    let stem: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '+' | '/' | '\\'))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect();
    format!("{}.lang", stem)
}

/// The global alias table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    entries: BTreeMap<String, String>,
}

impl AliasMap {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every name a lexer is known by
    pub fn add_lexer(&mut self, lexer: &LexerDef) {
        let file = file_name(&lexer.name);
        let mut keys = vec![lexer.name.clone()];
        keys.extend(lexer.aliases.iter().cloned());
        keys.extend(
            lexer
                .filenames
                .iter()
                .chain(&lexer.alias_filenames)
                .filter_map(|glob| glob.rsplit_once('.'))
                .map(|(_, ext)| ext.to_string())
                .filter(|ext| !ext.is_empty()),
        );
        for key in keys {
            let lower = key.to_lowercase();
            self.entries.insert(key, file.clone());
            self.entries.insert(lower, file.clone());
        }
    }

    /// File registered for a key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `alias = file` lines sorted by alias
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(alias, file)| format!("{} = {}\n", alias, file))
            .collect()
    }
}
