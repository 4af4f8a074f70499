mod session;
mod view;

use clap::{Args, Parser, Subcommand, ValueEnum};
use locfix_core::{
    CommandSource, DisplayOptions, EngineError, FixtureError, FixtureStore, LocationEngine,
    RepoError, RepoIdentity, SETTINGS_FILE, Settings, SettingsError, SourceError, Stage,
    TokenSource,
};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use session::Session;

#[derive(Parser)]
#[command(name = "locfix")]
#[command(
    about = "Step through lexer/parser tokens and record their expected source locations",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    context: ContextArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ContextArgs {
    /// Settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE)]
    config: PathBuf,

    /// Directory holding the case files
    #[arg(long, global = true)]
    cases_dir: Option<PathBuf>,

    /// Root of the fixture tree
    #[arg(long, global = true)]
    fixture_root: Option<PathBuf>,

    /// Repository URL (read from git when omitted)
    #[arg(long, global = true)]
    repo_url: Option<String>,

    /// Branch name (read from git when omitted)
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Command that dumps tokens/ASTs as JSON, e.g. "node scripts/dump.js".
    /// Quote arguments that contain spaces.
    #[arg(long = "command", global = true, value_name = "COMMAND")]
    token_command: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively step through tokens and edit their expected locations
    Step {
        /// Stage to check (lexer or parser); asked for when omitted
        stage: Option<String>,

        /// Case file to start with; asked for when omitted
        #[arg(short, long)]
        file: Option<String>,
    },

    /// List the case files of a stage
    List {
        /// Stage (lexer or parser)
        #[arg(default_value = "lexer")]
        stage: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Compare every case file of a stage with its fixture
    Check {
        /// Stage (lexer or parser)
        #[arg(default_value = "lexer")]
        stage: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Engine(EngineError),
    Repo(RepoError),
    Settings(SettingsError),
    InvalidCommand(String),
    Mismatch(usize),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Io(_) => ExitCode::from(2),
            CliError::Engine(EngineError::Fixture(FixtureError::Io { .. }))
            | CliError::Engine(EngineError::Source(SourceError::Io { .. }))
            | CliError::Settings(SettingsError::Io { .. }) => ExitCode::from(2),
            CliError::Engine(_) => ExitCode::from(1),
            CliError::Repo(_) => ExitCode::from(1),
            CliError::Settings(_) => ExitCode::from(1),
            CliError::InvalidCommand(_) => ExitCode::from(1),
            CliError::Mismatch(_) => ExitCode::from(1),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "IO error: {e}"),
            CliError::Engine(e) => write!(f, "{e}"),
            CliError::Repo(e) => write!(f, "Repository error: {e}"),
            CliError::Settings(e) => write!(f, "Settings error: {e}"),
            CliError::InvalidCommand(msg) => write!(f, "Invalid --command: {msg}"),
            CliError::Mismatch(count) => write!(f, "{count} locations do not match their fixtures"),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<RepoError> for CliError {
    fn from(e: RepoError) -> Self {
        CliError::Repo(e)
    }
}

impl From<SettingsError> for CliError {
    fn from(e: SettingsError) -> Self {
        CliError::Settings(e)
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(&cli.context)?;

    match cli.command {
        Commands::Step { stage, file } => {
            cmd_step(&cli.context, &settings, stage.as_deref(), file.as_deref())
        }
        Commands::List { stage, format } => cmd_list(&settings, &stage, &format),
        Commands::Check { stage, format } => cmd_check(&cli.context, &settings, &stage, &format),
    }
}

/// Settings file overlaid with command-line flags.
fn load_settings(context: &ContextArgs) -> Result<Settings, CliError> {
    let mut settings = Settings::load(&context.config)?;

    if let Some(dir) = &context.cases_dir {
        settings.cases_dir = dir.clone();
    }
    if let Some(root) = &context.fixture_root {
        settings.fixture_root = root.clone();
    }
    if let Some(command) = &context.token_command {
        settings.command = split_command(command)?;
    }

    Ok(settings)
}

/// Split a command line into words. Single or double quotes group words
/// and a backslash escapes the next character outside single quotes.
fn split_command(line: &str) -> Result<Vec<String>, CliError> {
    let mut words = Vec::new();
    let mut word: Option<String> = None;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => word.get_or_insert_default().push(c),
            (_, '\\') => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| CliError::InvalidCommand("trailing backslash".to_string()))?;
                word.get_or_insert_default().push(escaped);
            }
            (Some(_), c) => word.get_or_insert_default().push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                word.get_or_insert_default();
            }
            (None, c) if c.is_whitespace() => words.extend(word.take()),
            (None, c) => word.get_or_insert_default().push(c),
        }
    }

    if let Some(q) = quote {
        return Err(CliError::InvalidCommand(format!("unclosed {q} quote")));
    }
    words.extend(word);
    Ok(words)
}

/// Write display toggles made during a session back to the settings file,
/// leaving everything else in it as it was.
fn persist_display(path: &Path, display: DisplayOptions) -> Result<(), CliError> {
    let mut stored = Settings::load(path)?;
    if stored.display == display {
        return Ok(());
    }

    stored.display = display;
    stored.save(path)?;
    log::info!("saved display options to {}", path.display());
    Ok(())
}

fn resolve_repo(context: &ContextArgs) -> Result<RepoIdentity, CliError> {
    if let (Some(url), Some(branch)) = (&context.repo_url, &context.branch) {
        return Ok(RepoIdentity::new(url.as_str(), branch.as_str()));
    }

    let detected = RepoIdentity::detect(&std::env::current_dir()?)?;
    Ok(RepoIdentity::new(
        context.repo_url.clone().unwrap_or(detected.url),
        context.branch.clone().unwrap_or(detected.branch),
    ))
}

fn build_engine(
    context: &ContextArgs,
    settings: &Settings,
) -> Result<LocationEngine<CommandSource>, CliError> {
    let repo = resolve_repo(context)?;
    log::info!("fixtures for {} ({}) under {}", repo.url, repo.branch, repo.dir);

    let source = CommandSource::new(
        settings.cases_dir.clone(),
        settings.case_extension.as_str(),
        &settings.command,
    );
    Ok(
        LocationEngine::new(source, FixtureStore::new(settings.fixture_root.clone()), repo)
            .with_case_extension(settings.case_extension.as_str())
            .with_display(settings.display),
    )
}

fn cmd_step(
    context: &ContextArgs,
    settings: &Settings,
    stage: Option<&str>,
    file: Option<&str>,
) -> Result<(), CliError> {
    let engine = build_engine(context, settings)?;
    let color = io::stdout().is_terminal();

    let mut session = Session::new(engine, io::stdin().lock(), io::stdout().lock(), color);
    session.run(stage, file)?;

    if session.display_options() != settings.display {
        persist_display(&context.config, session.display_options())?;
    }
    Ok(())
}

/// Case files of `stage`. Needs neither a repository nor a token command.
fn case_listing(settings: &Settings, stage: &str) -> Result<(Stage, Vec<String>), CliError> {
    let stage = stage.parse::<Stage>().map_err(EngineError::from)?;
    let source = CommandSource::new(
        settings.cases_dir.clone(),
        settings.case_extension.as_str(),
        &settings.command,
    );
    let files = source.case_files(stage).map_err(EngineError::from)?;
    Ok((stage, files))
}

fn cmd_list(settings: &Settings, stage: &str, format: &OutputFormat) -> Result<(), CliError> {
    let (stage, files) = case_listing(settings, stage)?;

    match format {
        OutputFormat::Text => {
            println!("Case files for {stage}:\n");
            for (i, file) in files.iter().enumerate() {
                println!("  {}. {}", i + 1, file);
            }
            println!("\nTotal: {} files", files.len());
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "stage": stage,
                "files": files,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
    }

    Ok(())
}

fn cmd_check(
    context: &ContextArgs,
    settings: &Settings,
    stage: &str,
    format: &OutputFormat,
) -> Result<(), CliError> {
    let mut engine = build_engine(context, settings)?;
    engine.select_stage(stage)?;

    // (file, token count, mismatched positions)
    let mut results = Vec::new();
    for file in engine.files().to_vec() {
        engine.select_file(&file)?;
        results.push((file, engine.node_count(), engine.mismatched_positions()));
    }
    let total: usize = results.iter().map(|(_, _, m)| m.len()).sum();

    match format {
        OutputFormat::Text => {
            use owo_colors::OwoColorize;

            let color = io::stdout().is_terminal();
            for (file, count, mismatched) in &results {
                let status = if mismatched.is_empty() { "ok" } else { "!!" };
                let status = match (color, mismatched.is_empty()) {
                    (false, _) => status.to_string(),
                    (true, true) => status.green().to_string(),
                    (true, false) => status.red().bold().to_string(),
                };
                println!(
                    "  {status} {file}: {} of {count} tokens differ",
                    mismatched.len()
                );
                if !mismatched.is_empty() {
                    let positions: Vec<String> =
                        mismatched.iter().map(|p| (p + 1).to_string()).collect();
                    println!("     at {}", positions.join(", "));
                }
            }
            println!("\nTotal: {total} mismatches in {} files", results.len());
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "stage": stage,
                "mismatches": total,
                "files": results.iter().map(|(file, count, mismatched)| serde_json::json!({
                    "file": file,
                    "tokens": count,
                    "mismatched": mismatched.iter().map(|p| p + 1).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
    }

    if total > 0 {
        return Err(CliError::Mismatch(total));
    }
    Ok(())
}
