use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use texpatch::config::{load_for_document, load_from_path, EngineConfig, CONFIG_FILE};
use texpatch::diff::{EditSet, Grammar};
use texpatch::edit::atomic_write;
use texpatch::escalation::{AttemptRecord, CommandClient, EscalationError, EscalationRunner};
use texpatch::intent::resolve;
use texpatch::patch::{apply_edit_set, PatchOptions, PatchReport, PatchResult};
use texpatch::prompt::EditTask;
use texpatch::tex::{parse_with, Document, NodeRef, ParseOptions, TreeQuery};

#[derive(Parser)]
#[command(name = "texpatch")]
#[command(about = "Structural LaTeX editing with validated model patches", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the nearest texpatch.toml above the input)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GrammarArg {
    /// Fenced unified diff (tier 1)
    Diff,
    /// Search/replace blocks (tier 2)
    Blocks,
}

impl From<GrammarArg> for Grammar {
    fn from(arg: GrammarArg) -> Self {
        match arg {
            GrammarArg::Diff => Grammar::UnifiedDiff,
            GrammarArg::Blocks => Grammar::SearchReplace,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the structural tree of a LaTeX file
    Parse {
        file: PathBuf,

        /// Emit the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find nodes by kind, content, pattern or name
    #[command(group(ArgGroup::new("selector").required(true)))]
    Query {
        file: PathBuf,

        #[arg(long, group = "selector")]
        kind: Option<String>,

        #[arg(long, group = "selector")]
        content: Option<String>,

        /// Regular expression matched against node content
        #[arg(long, group = "selector")]
        pattern: Option<String>,

        #[arg(long, group = "selector")]
        name: Option<String>,
    },

    /// Resolve an instruction and suggestion to an edit target
    Resolve {
        file: PathBuf,

        #[arg(short, long)]
        instruction: String,

        /// Suggested text, or `-` to read it from stdin
        #[arg(short, long, default_value = "")]
        suggestion: String,

        /// Apply the resolved edit to the file
        #[arg(short, long)]
        write: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Extract the edit set from a model response and print it as JSON
    Extract {
        /// Response file, or `-` for stdin
        response: PathBuf,

        #[arg(short, long, value_enum, default_value = "diff")]
        grammar: GrammarArg,
    },

    /// Apply the edits in a model response to a file
    Apply {
        file: PathBuf,

        /// Response file, or `-` for stdin
        #[arg(short, long)]
        response: PathBuf,

        #[arg(short, long, value_enum, default_value = "diff")]
        grammar: GrammarArg,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Ask the configured upstream for an edit and apply it
    Generate {
        file: PathBuf,

        #[arg(short, long)]
        instruction: String,

        /// Also request a plain-language explanation
        #[arg(short, long)]
        explain: bool,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },
}

impl Commands {
    /// The file a command reads; configuration is discovered next to it.
    fn input(&self) -> &Path {
        match self {
            Commands::Parse { file, .. }
            | Commands::Query { file, .. }
            | Commands::Resolve { file, .. }
            | Commands::Apply { file, .. }
            | Commands::Generate { file, .. } => file,
            Commands::Extract { response, .. } => response,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_deref(), cli.command.input())?;

    match cli.command {
        Commands::Parse { file, json } => cmd_parse(&config, &file, json),

        Commands::Query {
            file,
            kind,
            content,
            pattern,
            name,
        } => {
            let query = match (kind, content, pattern, name) {
                (Some(kind), ..) => TreeQuery::kind(&kind)?,
                (_, Some(content), ..) => TreeQuery::Content(content),
                (_, _, Some(pattern), _) => TreeQuery::pattern(&pattern)?,
                (.., Some(name)) => TreeQuery::Name(name),
                _ => anyhow::bail!("one of --kind, --content, --pattern or --name is required"),
            };
            cmd_query(&config, &file, &query)
        }

        Commands::Resolve {
            file,
            instruction,
            suggestion,
            write,
            diff,
        } => cmd_resolve(&config, &file, &instruction, &suggestion, write, diff),

        Commands::Extract { response, grammar } => cmd_extract(&response, grammar.into()),

        Commands::Apply {
            file,
            response,
            grammar,
            dry_run,
            diff,
        } => cmd_apply(&config, &file, &response, grammar.into(), dry_run, diff),

        Commands::Generate {
            file,
            instruction,
            explain,
            dry_run,
            diff,
        } => cmd_generate(&config, &file, &instruction, explain, dry_run, diff),
    }
}

/// Log to stderr. `RUST_LOG` wins over `-v` when set.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>, input: &Path) -> Result<EngineConfig> {
    if let Some(path) = explicit {
        return Ok(load_from_path(path)?);
    }
    let (config, _) = load_for_document(input)?;
    Ok(config)
}

/// Read a file, or stdin for `-`.
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text).context("failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_file(config: &EngineConfig, file: &Path) -> Result<Document> {
    let source = read_input(file)?;
    Ok(parse_with(&source, &ParseOptions::from(&config.parser)))
}

/// Helper: Show unified diff between original and modified content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn node_line(node: &NodeRef<'_>) -> String {
    let name = node
        .name()
        .map(|n| format!(" {}", n.bold()))
        .unwrap_or_default();
    format!(
        "{}{} {} {}",
        node.kind().to_string().cyan(),
        name,
        format!("[{}..{})", node.start(), node.end()).dimmed(),
        format!("lines {}-{}", node.line_start(), node.line_end()).dimmed(),
    )
}

fn print_tree(node: NodeRef<'_>, depth: usize) {
    println!("{}{}", "  ".repeat(depth), node_line(&node));
    for child in node.children() {
        print_tree(child, depth + 1);
    }
}

fn cmd_parse(config: &EngineConfig, file: &Path, json: bool) -> Result<()> {
    let doc = parse_file(config, file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc.summary())?);
    } else {
        print_tree(doc.root(), 0);
    }

    for diagnostic in doc.diagnostics().iter() {
        eprintln!("{} {}", "⚠".yellow(), diagnostic);
    }
    Ok(())
}

fn cmd_query(config: &EngineConfig, file: &Path, query: &TreeQuery) -> Result<()> {
    let doc = parse_file(config, file)?;
    let matches = query.run(doc.root());

    if matches.is_empty() {
        println!("{}", "No matching nodes".yellow());
        std::process::exit(1);
    }
    for node in &matches {
        println!("{}", node_line(node));
    }
    println!("\n{} match(es)", matches.len());
    Ok(())
}

fn cmd_resolve(
    config: &EngineConfig,
    file: &Path,
    instruction: &str,
    suggestion: &str,
    write: bool,
    show_diff: bool,
) -> Result<()> {
    let suggestion = if suggestion == "-" {
        read_input(Path::new("-"))?
    } else {
        suggestion.to_string()
    };
    let doc = parse_file(config, file)?;
    let intent = resolve(&doc, instruction, &suggestion);

    println!("{} {:?}", "Edit:".bold(), intent.edit_type);
    println!("{} {}", "Target:".bold(), node_line(&intent.target));
    println!("{} {:.2}", "Confidence:".bold(), intent.confidence);
    if !intent.content.is_empty() {
        println!("{}\n{}", "Content:".bold(), intent.content);
    }

    if !write && !show_diff {
        return Ok(());
    }

    let mut text = doc.source().to_string();
    intent.to_edit().apply_to(&mut text)?;
    if show_diff {
        display_diff(file, doc.source(), &text);
    }
    if write {
        atomic_write(file, text.as_bytes())?;
        println!("{} Wrote {}", "✓".green(), file.display());
    }
    Ok(())
}

fn cmd_extract(response: &Path, grammar: Grammar) -> Result<()> {
    let text = read_input(response)?;
    let edits = grammar.extract(&text)?;
    println!("{}", serde_json::to_string_pretty(&edits)?);
    Ok(())
}

fn cmd_apply(
    config: &EngineConfig,
    file: &Path,
    response: &Path,
    grammar: Grammar,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let source = read_input(file)?;
    let edits = grammar.extract(&read_input(response)?)?;
    finish(config, file, &source, &edits, dry_run, show_diff)
}

fn cmd_generate(
    config: &EngineConfig,
    file: &Path,
    instruction: &str,
    explain: bool,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let Some(command) = config.upstream.command.as_deref() else {
        anyhow::bail!(
            "{}\n  Set {} in {} or pass --config",
            "No upstream command configured.".red(),
            "[upstream] command".bold(),
            CONFIG_FILE
        );
    };

    let source = read_input(file)?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("main.tex");
    let task = EditTask {
        file_name,
        source: &source,
        instruction,
    };
    let runner = EscalationRunner::new(CommandClient::new(command, config.upstream.timeout()), config);

    let outcome = if explain {
        let (outcome, explanation) = runner.run_with_explanation(&task);
        match explanation {
            Ok(text) => println!("{}\n{}\n", "Explanation:".bold(), text.trim()),
            Err(e) => eprintln!("{} explanation unavailable: {}", "⊙".yellow(), e),
        }
        outcome
    } else {
        runner.run(&task)
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            print_attempts(e.attempts());
            if let EscalationError::Exhausted {
                excerpt: Some(excerpt),
                ..
            } = &e
            {
                eprintln!("  Last response: {}", excerpt.dimmed());
            }
            std::process::exit(1);
        }
    };

    println!(
        "Edits from tier {} after {} attempt(s)",
        outcome.tier,
        outcome.attempts.len()
    );
    print_attempts(&outcome.attempts);
    finish(config, file, &source, &outcome.edits, dry_run, show_diff)
}

fn print_attempts(attempts: &[AttemptRecord]) {
    for record in attempts {
        match (&record.failure, &record.message) {
            (Some(class), Some(message)) => eprintln!(
                "  tier {} attempt {}: {:?} - {} {}",
                record.tier.number(),
                record.attempt,
                class,
                message,
                format!("(waited {} ms)", record.delay_ms).dimmed()
            ),
            (Some(class), None) => eprintln!(
                "  tier {} attempt {}: {:?}",
                record.tier.number(),
                record.attempt,
                class
            ),
            (None, _) => eprintln!(
                "  tier {} attempt {}: {}",
                record.tier.number(),
                record.attempt,
                "ok".green()
            ),
        }
    }
}

/// Apply an edit set, report each hunk or block, and persist unless dry-run.
fn finish(
    config: &EngineConfig,
    file: &Path,
    source: &str,
    edits: &EditSet,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    if let EditSet::NoChanges { explanation } = edits {
        println!("{} No changes needed", "⊙".yellow());
        if let Some(explanation) = explanation {
            println!("  {}", explanation.dimmed());
        }
        return Ok(());
    }

    let report = apply_edit_set(source, edits, &PatchOptions::from(&config.patch));
    let failed = print_report(&report);

    if show_diff && report.text != source {
        display_diff(file, source, &report.text);
    }

    if report.text != source {
        if dry_run {
            println!("{}", "  [DRY RUN - file not modified]".cyan());
        } else {
            atomic_write(file, report.text.as_bytes())?;
            println!("{} Wrote {}", "✓".green(), file.display());
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &PatchReport) -> usize {
    let mut applied = 0;
    let mut already_applied = 0;
    let mut failed = 0;

    for (label, result) in &report.results {
        match result {
            Ok(PatchResult::Applied) => {
                println!("{} {}: Applied", "✓".green(), label);
                applied += 1;
            }
            Ok(PatchResult::AlreadyApplied) => {
                println!("{} {}: Already applied", "⊙".yellow(), label);
                already_applied += 1;
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), label, e);
                failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} applied", format!("{}", applied).green());
    println!(
        "  {} already applied",
        format!("{}", already_applied).yellow()
    );
    println!("  {} failed", format!("{}", failed).red());
    failed
}
