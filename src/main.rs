use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use mkparse::ast::types::Directive;
use mkparse::parser::directive_args;
use mkparse::{
    parse_condition, parse_dependency, parse_package_pattern, tokenize, try_build_stmt_tree,
    walk_stmt, Diagnostic, LineDiagnostics, Location, MkParser, NestingError, StmtVisitor,
};

#[derive(Parser)]
#[command(name = "mkparse")]
#[command(about = "Show how BSD make expressions, conditions and package patterns are parsed")]
#[command(version)]
struct Cli {
    /// Output results as JSON
    #[arg(long = "json", global = true)]
    json: bool,

    /// Log filter such as "debug" or "mkparse=trace" (default: $MKPARSE_LOG, then "warn")
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split text into literal text and expressions
    Tokens { text: String },
    /// Parse the condition of an .if or .elif directive
    Cond { text: String },
    /// Parse a package pattern or a pattern:../../category/package dependency
    Depend { text: String },
    /// Show the .if/.for block structure of a makefile
    Tree { file: PathBuf },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize the result: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Nesting(#[from] NestingError),
    #[error("not a valid {what}: {text}")]
    Invalid { what: &'static str, text: String },
}

const LOG_ENV: &str = "MKPARSE_LOG";

/// Logs go to stderr, so that stdout only carries the parse results.
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .finish();

    // The first subscriber wins.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    if let Err(err) = run(&cli) {
        eprintln!("mkparse: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Tokens { text } => run_tokens(text, cli.json),
        Command::Cond { text } => run_cond(text, cli.json),
        Command::Depend { text } => run_depend(text, cli.json),
        Command::Tree { file } => run_tree(file, cli.json),
    }
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        println!("{}", diagnostic);
        for line in &diagnostic.explanation {
            println!("\t{}", line);
        }
        if let Some(fix) = &diagnostic.autofix {
            println!("\tAUTOFIX: Replacing \"{}\" with \"{}\".", fix.old, fix.new);
        }
    }
}

fn run_tokens(text: &str, json: bool) -> Result<(), CliError> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let (tokens, rest) = tokenize(text, Some(&mut diagnostics));

    if json {
        print_json(&serde_json::json!({
            "tokens": tokens,
            "rest": rest,
            "diagnostics": diagnostics,
        }))?;
    } else {
        for token in &tokens {
            match &token.expr {
                Some(expr) => println!("expr  {}", expr),
                None => println!("text  {:?}", token.text),
            }
        }
        print_diagnostics(&diagnostics);
    }

    if !rest.is_empty() {
        return Err(CliError::Invalid {
            what: "token sequence",
            text: rest.to_string(),
        });
    }
    Ok(())
}

fn run_cond(text: &str, json: bool) -> Result<(), CliError> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let cond = parse_condition(text, Some(&mut diagnostics));

    if json {
        let varnames = cond.as_ref().map(|c| c.referenced_varnames()).unwrap_or_default();
        print_json(&serde_json::json!({
            "cond": cond,
            "varnames": varnames,
            "diagnostics": diagnostics,
        }))?;
    } else {
        if let Some(cond) = &cond {
            println!("{:#?}", cond);
            println!("variables: {}", cond.referenced_varnames().join(" "));
        }
        print_diagnostics(&diagnostics);
    }

    if cond.is_none() {
        // Show how far the parser got.
        let mut parser = MkParser::new(text, None);
        parser.condition();
        return Err(CliError::Invalid {
            what: "condition",
            text: format!("{} (unparsed: {:?})", text, parser.rest()),
        });
    }
    Ok(())
}

fn run_depend(text: &str, json: bool) -> Result<(), CliError> {
    let dependency = parse_dependency(text);
    let pattern = match &dependency {
        Some(dep) => Some(dep.pattern.clone()),
        None => parse_package_pattern(text),
    };

    if json {
        match &dependency {
            Some(dep) => print_json(dep)?,
            None => print_json(&pattern)?,
        }
    } else if let Some(pattern) = &pattern {
        println!("{:#?}", pattern);
        if let Some(dep) = &dependency {
            println!("path: {}", dep.path);
        }
    }

    if pattern.is_none() {
        return Err(CliError::Invalid {
            what: "package pattern",
            text: text.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// TREE
// =============================================================================

#[derive(Serialize)]
struct ConditionReport {
    location: Location,
    text: String,
    varnames: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

struct TreeReport<'a> {
    file: &'a str,
    conditions: Vec<ConditionReport>,
    lines: Vec<String>,
}

impl<'a> TreeReport<'a> {
    fn condition_report(&self, index: usize, text: &str) -> ConditionReport {
        let mut diag = LineDiagnostics::new(Location::new(self.file, index + 1));
        let args = directive_args(text).unwrap_or("");
        let mut varnames = Vec::new();
        if takes_condition(text) {
            match parse_condition(args, Some(&mut diag)) {
                Some(cond) => varnames = cond.referenced_varnames(),
                None => diag.diagnostics.push(Diagnostic::warning(format!("Invalid condition \"{}\".", args))),
            }
        }
        ConditionReport {
            location: diag.location,
            text: text.to_string(),
            varnames,
            diagnostics: diag.diagnostics,
        }
    }

    fn push_line(&mut self, kind: &str, index: usize, text: &str) {
        self.lines.push(format!("{:>5} {:<5} {}", index + 1, kind, text));
    }
}

impl<'a, 'l> StmtVisitor<(usize, &'l str)> for TreeReport<'a> {
    fn line(&mut self, line: &(usize, &'l str)) {
        self.push_line("", line.0, line.1);
    }

    fn condition(&mut self, line: &(usize, &'l str)) {
        let report = self.condition_report(line.0, line.1);
        self.push_line("cond", line.0, line.1);
        self.conditions.push(report);
    }

    fn loop_head(&mut self, line: &(usize, &'l str)) {
        self.push_line("loop", line.0, line.1);
    }
}

/// Only `.if` and `.elif` take a condition; `.ifdef` and friends take plain
/// variable names.
fn takes_condition(text: &str) -> bool {
    let name = text
        .trim_start_matches('.')
        .trim_start_matches(|c| c == ' ' || c == '\t');
    let word: String = name.chars().take_while(|c| c.is_ascii_lowercase()).collect();
    word == "if" || word == "elif"
}

fn run_tree(file: &PathBuf, json: bool) -> Result<(), CliError> {
    let path = file.display().to_string();
    let content = std::fs::read_to_string(file).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;

    let lines: Vec<(usize, &str)> = content.lines().enumerate().collect();
    let tree = try_build_stmt_tree(lines, |(_, text)| Directive::of_line(text))?;

    let mut report = TreeReport {
        file: &path,
        conditions: Vec::new(),
        lines: Vec::new(),
    };
    walk_stmt(&tree, &mut report);

    if json {
        return print_json(&serde_json::json!({
            "tree": tree,
            "conditions": report.conditions,
        }));
    }

    for line in &report.lines {
        println!("{}", line);
    }
    for condition in &report.conditions {
        println!("{}: {} uses {}", condition.location, condition.text.trim(), condition.varnames.join(" "));
        for diagnostic in &condition.diagnostics {
            println!("{}: {}", condition.location, diagnostic);
        }
    }
    Ok(())
}
