//! Batch pipeline
//!
//! Compiles the selected lexers one after another, writes each rendered
//! program atomically, and finishes with the alias table. A failing lexer is
//! logged and recorded; only run-level errors stop the batch.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::compiler::Compiler;
use crate::config::Config;
use crate::emit::{AliasMap, LANG_MAP, file_name, render_with_source};
use crate::error::{Diagnostic, GenerateError, Severity};
use crate::lexicon::{LexerDef, Lexicon};
use crate::style::{OUTLANG_MAP, StyleSheet, generate_style, render_outlang_map};

/// An item that produced no artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Lexer or style name
    pub name: String,
    /// Why it failed
    pub reason: String,
}

/// Outcome of a generation run
#[derive(Debug, Default)]
pub struct GenerateReport {
    /// Files written, in order
    pub written: Vec<PathBuf>,
    /// Lexers or styles that were abandoned
    pub failures: Vec<Failure>,
    /// Rules skipped inside lexers that were written
    pub skipped_rules: Vec<Diagnostic>,
}

impl GenerateReport {
    /// Whether every selected item produced its artifacts
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Writes artifacts for a configuration
pub struct Generator {
    config: Config,
}

impl Generator {
    /// Create a generator
    pub fn new(config: Config) -> Self {
        Generator { config }
    }

    /// The configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compile and render one lexer in memory
    pub fn render_lexer(
        &self,
        lexicon: &Lexicon,
        lexer: &LexerDef,
    ) -> Result<(String, Vec<Diagnostic>), Diagnostic> {
        let compiler = Compiler::new(lexicon, self.config.compile_options());
        let program = compiler.compile(lexer)?;
        let text = render_with_source(&program, &self.config.source_name);
        Ok((text, program.diagnostics))
    }

    /// Generate `.lang` files for the selected lexers (all when empty)
    /// and the alias table for every lexer that was written
    pub fn generate_langs(
        &self,
        lexicon: &Lexicon,
        selection: &[String],
    ) -> Result<GenerateReport, GenerateError> {
        let lexers = select(lexicon, selection)?;
        let mut report = GenerateReport::default();
        let mut aliases = AliasMap::new();

        for lexer in lexers {
            info!(lexer = %lexer.name, "generating language");
            let (text, skipped) = match self.render_lexer(lexicon, lexer) {
                Ok(rendered) => rendered,
                Err(diagnostic) if diagnostic.severity() == Severity::Run => {
                    error!("{}", diagnostic);
                    return Err(GenerateError::Halted(diagnostic));
                }
                Err(diagnostic) => {
                    error!("{}; lexer skipped", diagnostic);
                    report.failures.push(Failure {
                        name: lexer.name.clone(),
                        reason: diagnostic.to_string(),
                    });
                    continue;
                }
            };
            let path = self.config.out_dir.join(file_name(&lexer.name));
            if let Err(err) = write_atomic(&path, &text) {
                error!(path = %path.display(), %err, "could not write language file");
                report.failures.push(Failure {
                    name: lexer.name.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
            if !skipped.is_empty() {
                warn!(lexer = %lexer.name, skipped = skipped.len(), "rules skipped");
            }
            report.skipped_rules.extend(skipped);
            aliases.add_lexer(lexer);
            report.written.push(path);
        }

        let path = self.config.out_dir.join(LANG_MAP);
        write_atomic(&path, &aliases.render()).map_err(|source| GenerateError::Io {
            path: path.clone(),
            source,
        })?;
        report.written.push(path);
        Ok(report)
    }

    /// Generate style files, output languages and `outlang.map`
    pub fn generate_styles(&self, sheet: &StyleSheet) -> Result<GenerateReport, GenerateError> {
        let mut report = GenerateReport::default();
        let mut generated = Vec::new();

        for style in &sheet.styles {
            let artifacts = match generate_style(style) {
                Ok(artifacts) => artifacts,
                Err(err) => {
                    error!(style = %style.name, %err, "style skipped");
                    report.failures.push(Failure {
                        name: style.name.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            let files = [
                (artifacts.style_file(), &artifacts.style),
                (artifacts.outlang_file(), &artifacts.outlang),
            ];
            let mut ok = true;
            for (name, text) in files {
                let path = self.config.out_dir.join(name);
                match write_atomic(&path, text) {
                    Ok(()) => report.written.push(path),
                    Err(err) => {
                        error!(path = %path.display(), %err, "could not write style file");
                        report.failures.push(Failure {
                            name: style.name.clone(),
                            reason: err.to_string(),
                        });
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                generated.push(artifacts);
            }
        }

        let path = self.config.out_dir.join(OUTLANG_MAP);
        write_atomic(&path, &render_outlang_map(&generated)).map_err(|source| {
            GenerateError::Io {
                path: path.clone(),
                source,
            }
        })?;
        report.written.push(path);
        Ok(report)
    }
}

fn select<'a>(
    lexicon: &'a Lexicon,
    selection: &[String],
) -> Result<Vec<&'a LexerDef>, GenerateError> {
    if selection.is_empty() {
        return Ok(lexicon.lexers().iter().collect());
    }
    selection
        .iter()
        .map(|name| {
            lexicon
                .get(name)
                .ok_or_else(|| GenerateError::UnknownLexer(name.clone()))
        })
        .collect()
}

/// Write a file through a temporary sibling and a rename
pub fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{NextState, Rule};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("lexport-generate-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_write_atomic_leaves_no_temporary() {
        let dir = scratch("atomic");
        let path = dir.join("out.lang");
        write_atomic(&path, "first\n").unwrap();
        write_atomic(&path, "second\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
        assert!(!dir.join("out.lang.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failing_lexer_does_not_stop_the_run() {
        let lexicon = Lexicon::new(vec![
            LexerDef::new("Good")
                .with_aliases(&["good"])
                .with_state("root", vec![Rule::tag("a", "Name").entry()]),
            LexerDef::new("Bad").with_state(
                "root",
                vec![Rule::tag("a", "Name").then(NextState::Enter("missing".into())).entry()],
            ),
        ])
        .unwrap();
        let dir = scratch("policy");
        let generator = Generator::new(Config {
            out_dir: dir.clone(),
            ..Config::default()
        });
        let report = generator.generate_langs(&lexicon, &[]).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "Bad");
        assert!(!report.is_complete());
        assert!(dir.join("good.lang").exists());
        assert!(!dir.join("bad.lang").exists());
        let map = fs::read_to_string(dir.join("lang.map")).unwrap();
        assert_eq!(map, "Good = good.lang\ngood = good.lang\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unknown_selection() {
        let lexicon = Lexicon::new(vec![]).unwrap();
        let generator = Generator::new(Config::default());
        assert!(matches!(
            generator.generate_langs(&lexicon, &["Nope".to_string()]),
            Err(GenerateError::UnknownLexer(_))
        ));
    }
}
