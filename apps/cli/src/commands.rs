//! CLI command definitions, routing, and tracing setup.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chronomark_core::{ChronologyConfig, ChronologyResult, ProgressReporter, build_chronology};
use chronomark_history::{extract_history, git};
use chronomark_shared::{
    AppConfig, Diagnostics, DuplicatePolicy, init_config, load_config, load_config_from,
};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// chronomark: see a markdown document in the order its content was added.
#[derive(Parser)]
#[command(
    name = "chronomark",
    version,
    about = "Reorder a markdown document chronologically using its git history.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.chronomark/chronomark.toml).
    #[arg(long, global = true, env = "CHRONOMARK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Diagnostics output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum DiagnosticsFormat {
    #[default]
    Text,
    Json,
}

/// Which introduction of re-added text dates a fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum DuplicateArg {
    MostRecent,
    Earliest,
}

impl From<DuplicateArg> for DuplicatePolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::MostRecent => DuplicatePolicy::MostRecent,
            DuplicateArg::Earliest => DuplicatePolicy::Earliest,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Write the chronological view of a document.
    Generate(GenerateArgs),

    /// Print the added lines extracted from history, one JSON object per line.
    History(HistoryArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Where the document and its history come from.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct SourceArgs {
    /// Git repository containing the document (prompted for when neither
    /// this nor --history is given).
    #[arg(short, long)]
    pub repo: Option<PathBuf>,

    /// Document path, relative to the repository.
    #[arg(short, long)]
    pub file: Option<String>,

    /// Read `git log -p` output from this file instead of running git.
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Do not follow renames of the document.
    #[arg(long)]
    pub no_follow: bool,
}

/// Options for `generate`.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct GenerateArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output file (defaults to the configured file name next to the document).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Print the view to stdout instead of writing a file.
    #[arg(long, conflicts_with = "out")]
    pub stdout: bool,

    /// Title of the generated document.
    #[arg(long)]
    pub title: Option<String>,

    /// Fuzzy similarity threshold, in (0, 1).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Bonus added to the similarity of candidates sharing a URL.
    #[arg(long)]
    pub link_bonus: Option<f64>,

    /// Which introduction of re-added text wins.
    #[arg(long, value_enum)]
    pub duplicates: Option<DuplicateArg>,

    /// Diagnostics format.
    #[arg(long, value_enum, default_value = "text")]
    pub diagnostics: DiagnosticsFormat,
}

/// Options for `history`.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct HistoryArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// List events oldest first instead of in log order.
    #[arg(long)]
    pub oldest_first: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so `--stdout`
/// output stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chronomark=info",
        1 => "chronomark=debug",
        _ => "chronomark=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate(args) => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_generate(&args, config)
        }
        Command::History(args) => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_history(&args, &config)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Resolved document and history locations.
#[derive(Debug, Clone, PartialEq)]
struct Source {
    repo: Option<PathBuf>,
    file: String,
    history_file: Option<PathBuf>,
    follow: bool,
}

impl Source {
    /// Resolve flags against config. `prompt` supplies the repository when
    /// neither `--repo` nor `--history` was given.
    fn resolve(
        args: &SourceArgs,
        config: &AppConfig,
        prompt: impl FnOnce() -> Result<PathBuf>,
    ) -> Result<Self> {
        let repo = match (&args.repo, &args.history) {
            (Some(repo), _) => Some(repo.clone()),
            (None, Some(_)) => None,
            (None, None) => Some(prompt()?),
        };

        Ok(Self {
            repo,
            file: args
                .file
                .clone()
                .unwrap_or_else(|| config.history.document.clone()),
            history_file: args.history.clone(),
            follow: config.history.follow_renames && !args.no_follow,
        })
    }

    fn document_path(&self) -> PathBuf {
        match &self.repo {
            Some(repo) => repo.join(&self.file),
            None => PathBuf::from(&self.file),
        }
    }

    fn read_document(&self) -> Result<String> {
        let path = self.document_path();
        std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("cannot read document '{}'", path.display()))
    }

    fn read_history(&self) -> Result<String> {
        match (&self.history_file, &self.repo) {
            (Some(path), _) => std::fs::read_to_string(path)
                .wrap_err_with(|| format!("cannot read history '{}'", path.display())),
            (None, Some(repo)) => Ok(git::file_history(repo, &self.file, self.follow)?),
            (None, None) => Err(eyre!("no repository or history file given")),
        }
    }
}

/// Ask for the repository path on stdin.
fn prompt_repo() -> Result<PathBuf> {
    let mut stderr = io::stderr();
    write!(stderr, "Path to the git repository: ")?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let path = line.trim();
    if path.is_empty() {
        return Err(eyre!("no repository path given"));
    }
    Ok(PathBuf::from(path))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_generate(args: &GenerateArgs, config: AppConfig) -> Result<()> {
    let source = Source::resolve(&args.source, &config, prompt_repo)?;
    let reporter = CliProgress::new();
    let (result, out) = generate(args, config, &source, &reporter)?;

    let diagnostics = render_diagnostics(&result.diagnostics, args.diagnostics)?;
    match out {
        Some(path) => {
            println!("{diagnostics}");
            println!("  Output: {}", path.display());
            println!("  Time:   {:.1}s", result.elapsed.as_secs_f64());
        }
        None => {
            print!("{}", result.markdown);
            eprintln!("{diagnostics}");
        }
    }
    Ok(())
}

/// Run the pipeline and write the view unless `--stdout` was given.
/// Returns the written path, if any.
fn generate(
    args: &GenerateArgs,
    mut config: AppConfig,
    source: &Source,
    progress: &dyn ProgressReporter,
) -> Result<(ChronologyResult, Option<PathBuf>)> {
    if let Some(title) = &args.title {
        config.output.title = title.clone();
    }
    if let Some(threshold) = args.threshold {
        config.matching.fuzzy_threshold = threshold;
    }
    if let Some(bonus) = args.link_bonus {
        config.matching.link_bonus = bonus;
    }
    if let Some(duplicates) = args.duplicates {
        config.matching.duplicate_policy = duplicates.into();
    }

    let document = source.read_document()?;
    let history = source.read_history()?;

    info!(
        document = %source.document_path().display(),
        history_bytes = history.len(),
        "generating chronological view"
    );

    let result = build_chronology(
        &history,
        &document,
        &ChronologyConfig::from(&config),
        progress,
    )?;

    if args.stdout {
        return Ok((result, None));
    }

    let out = match &args.out {
        Some(path) => path.clone(),
        None => source
            .document_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(&config.output.file_name),
    };
    std::fs::write(&out, &result.markdown)
        .wrap_err_with(|| format!("cannot write '{}'", out.display()))?;
    info!(path = %out.display(), "chronological view written");

    Ok((result, Some(out)))
}

fn render_diagnostics(diagnostics: &Diagnostics, format: DiagnosticsFormat) -> Result<String> {
    if format == DiagnosticsFormat::Json {
        return Ok(serde_json::to_string_pretty(diagnostics)?);
    }

    let mut out = String::new();
    out.push_str(&format!("  Fragments:    {}\n", diagnostics.total));
    out.push_str(&format!("  Exact:        {}\n", diagnostics.exact));
    out.push_str(&format!("  Normalized:   {}\n", diagnostics.normalized));
    out.push_str(&format!("  Fuzzy:        {}\n", diagnostics.fuzzy));
    out.push_str(&format!("  Link-boosted: {}\n", diagnostics.link_boosted));
    out.push_str(&format!("  Inferred:     {}\n", diagnostics.inferred));
    out.push_str(&format!("  Unmatched:    {}\n", diagnostics.unmatched));
    out.push_str(&format!(
        "  Match rate:   {:.1}%\n",
        diagnostics.match_rate * 100.0
    ));
    out.push_str(&format!(
        "  History:      {} added lines, {} commits skipped",
        diagnostics.history_events, diagnostics.skipped_commits
    ));
    for fragment in &diagnostics.unresolved {
        out.push_str(&format!(
            "\n    line {}: {} ({})",
            fragment.line, fragment.text, fragment.reason
        ));
    }
    Ok(out)
}

fn cmd_history(args: &HistoryArgs, config: &AppConfig) -> Result<()> {
    let source = Source::resolve(&args.source, config, prompt_repo)?;
    let log = extract_history(&source.read_history()?);

    let events = if args.oldest_first {
        log.chronological()
    } else {
        log.events().iter().collect()
    };

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    for event in events {
        writeln!(stdout, "{}", serde_json::to_string(event)?)?;
    }

    if log.skipped_commits() > 0 {
        warn!(skipped = log.skipped_commits(), "malformed commit blocks skipped");
    }
    eprintln!(
        "{} added lines from {} commits ({} skipped)",
        log.len(),
        log.commit_count(),
        log.skipped_commits()
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, _result: &ChronologyResult) {
        self.spinner.finish_and_clear();
    }
}

// Errors skip `done`; clear the spinner before the report is printed.
impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
