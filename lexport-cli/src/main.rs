use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lexport::normalize::{NormalizeOptions, normalize_pattern};
use lexport::style::StyleSheet;
use lexport::{Config, GenerateReport, Generator, Lexicon, transpile_debug};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lexport")]
#[command(about = "Lexport - translate regex lexer tables into source-highlight definitions")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a single pattern
    Convert {
        /// The pattern to convert
        pattern: String,
        /// Show AST debug output
        #[arg(short, long)]
        debug: bool,
        /// Fold letters into two-case classes
        #[arg(short, long)]
        ignore_case: bool,
    },
    /// Generate language files from a lexicon
    Compile {
        /// Lexicon JSON file
        lexicon: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Only these lexers (name or alias); all when omitted
        #[arg(short, long = "lexer")]
        lexers: Vec<String>,
        /// Largest number of alternatives one expansion may produce
        #[arg(long)]
        max_combinations: Option<usize>,
        /// Largest span of a bounded repeat that may be unrolled
        #[arg(long)]
        max_unroll: Option<u32>,
        /// Seed for group sampling
        #[arg(long)]
        seed: Option<u64>,
        /// Print the rendered files instead of writing them
        #[arg(short, long)]
        print: bool,
    },
    /// Generate style files and output languages
    Styles {
        /// Style JSON file
        styles: PathBuf,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Convert {
            pattern,
            debug,
            ignore_case,
        } => cmd_convert(&pattern, debug, ignore_case),
        Commands::Compile {
            lexicon,
            out,
            lexers,
            max_combinations,
            max_unroll,
            seed,
            print,
        } => {
            let defaults = Config::default();
            let config = Config {
                out_dir: out,
                max_combinations: max_combinations.unwrap_or(defaults.max_combinations),
                max_unroll: max_unroll.unwrap_or(defaults.max_unroll),
                seed: seed.unwrap_or(defaults.seed),
                ..defaults
            };
            cmd_compile(&lexicon, config, &lexers, print)
        }
        Commands::Styles { styles, out } => cmd_styles(&styles, out),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_convert(pattern: &str, debug: bool, ignore_case: bool) -> Result<()> {
    println!("{}", "Converting pattern...".bold());
    println!("  Input:  {}", pattern.cyan());
    println!();

    let options = NormalizeOptions {
        ignore_case,
        ..NormalizeOptions::default()
    };
    if debug {
        transpile_debug(pattern, &options)?.report();
    } else {
        let result = normalize_pattern(pattern, &options)?;
        println!("{}", "Output:".bold());
        println!("  {}", result.to_regex_string().green());
        for note in &result.report.unsafe_translations {
            println!("  {} {}", "unsafe:".yellow(), note);
        }
    }
    Ok(())
}

fn cmd_compile(path: &Path, config: Config, lexers: &[String], print: bool) -> Result<()> {
    let lexicon = Lexicon::load(path)
        .with_context(|| format!("could not load lexicon {}", path.display()))?;
    let generator = Generator::new(config);

    if print {
        let selected: Vec<_> = if lexers.is_empty() {
            lexicon.lexers().iter().collect()
        } else {
            lexers
                .iter()
                .map(|name| {
                    lexicon
                        .get(name)
                        .with_context(|| format!("unknown lexer '{}'", name))
                })
                .collect::<Result<_>>()?
        };
        for lexer in selected {
            match generator.render_lexer(&lexicon, lexer) {
                Ok((text, _)) => println!("{}", text),
                Err(diagnostic) => eprintln!("{} {}", "Failed:".red().bold(), diagnostic),
            }
        }
        return Ok(());
    }

    let report = generator.generate_langs(&lexicon, lexers)?;
    summarize(&report);
    Ok(())
}

fn cmd_styles(path: &Path, out: PathBuf) -> Result<()> {
    let sheet = StyleSheet::load(path)
        .with_context(|| format!("could not load styles {}", path.display()))?;
    let generator = Generator::new(Config {
        out_dir: out,
        ..Config::default()
    });
    let report = generator.generate_styles(&sheet)?;
    summarize(&report);
    Ok(())
}

fn summarize(report: &GenerateReport) {
    println!(
        "{} {}",
        "Wrote".bold(),
        format!("{} file(s)", report.written.len()).green()
    );
    for path in &report.written {
        println!("  {}", path.display());
    }
    if !report.skipped_rules.is_empty() {
        println!(
            "{} {}",
            "Skipped".bold(),
            format!("{} rule(s)", report.skipped_rules.len()).yellow()
        );
        for diagnostic in &report.skipped_rules {
            println!("  {}", diagnostic);
        }
    }
    if !report.is_complete() {
        println!(
            "{} {}",
            "Failed".bold(),
            format!("{} item(s)", report.failures.len()).red()
        );
        for failure in &report.failures {
            println!("  {}: {}", failure.name.red(), failure.reason);
        }
    }
}
