//! CLI command implementations

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use lintgate_core::config::{ConfigLoader, GateConfig, parse_duration};
use lintgate_core::hook::{DEFAULT_HOOK_TIMEOUT, ExitCode, Executor};
use lintgate_core::linters::BatchExecutor;
use lintgate_core::rules::{
    BlockingRuleEngine, CompositeRuleEngine, LintingRuleEngine, RuleEngine, format_feedback,
};
use lintgate_core::setup::{self, InitOptions};
use tokio::io::AsyncWriteExt;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Process one hook event from stdin (the default)
    Hook,
    /// Lint files and print the findings
    Check {
        /// Files to lint
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show which linters, rules and settings apply to files
    ShowActions {
        /// Files to describe
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Install the lintgate hook into agent settings
    Init {
        /// Only update ~/.claude/settings.json
        #[arg(long, conflicts_with = "project")]
        global: bool,
        /// Only update .claude/settings.json in the current directory
        #[arg(long)]
        project: bool,
        /// Show the changes without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Apply changes without asking
        #[arg(long)]
        force: bool,
    },
}

/// Flags shared by every command.
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub timeout: Option<String>,
}

/// Handle the CLI command, returning the process exit code.
///
/// # Errors
/// Returns an error when configuration, input or file access fails.
pub async fn handle_command(command: Commands, options: &GlobalOptions) -> Result<i32> {
    match command {
        Commands::Hook => run_hook(options).await,
        Commands::Check { files } => check_files(options, files).await,
        Commands::ShowActions { files } => show_actions(options, &files),
        Commands::Init {
            global,
            project,
            dry_run,
            force,
        } => init(InitOptions {
            global_only: global,
            project_only: project,
            dry_run,
            force,
        }),
    }
}

fn load_config(options: &GlobalOptions) -> Result<GateConfig> {
    let mut loader = ConfigLoader::new()?;
    if let Some(path) = &options.config {
        loader = loader.with_explicit(path);
    }
    let config = loader.load()?;
    tracing::debug!(project = %loader.project_dir().display(), "Configuration loaded");
    Ok(config)
}

fn linting_engine(config: &GateConfig) -> Result<LintingRuleEngine> {
    let mut engine = LintingRuleEngine::new();
    engine
        .set_config(config.clone())
        .context("invalid linter configuration")?;
    Ok(engine)
}

/// Reads a hook event from stdin and answers it through exit code and
/// output streams.
///
/// # Errors
/// Returns an error for invalid configuration, unparseable input or a
/// timeout.
pub async fn run_hook(options: &GlobalOptions) -> Result<i32> {
    let config = load_config(options)?;

    let mut engines: Vec<Arc<dyn RuleEngine>> = Vec::new();
    if !config.blocked_tools.is_empty() {
        engines.push(Arc::new(BlockingRuleEngine::new(config.blocked_tools.iter().cloned())));
    }
    engines.push(Arc::new(linting_engine(&config)?));

    let timeout = match &options.timeout {
        Some(value) => parse_duration(value)?,
        None => config.timeout.unwrap_or(DEFAULT_HOOK_TIMEOUT),
    };

    let mut executor = Executor::new(Arc::new(CompositeRuleEngine::new(engines)));
    executor.set_timeout(timeout);

    let outcome = executor.execute_reader(tokio::io::stdin()).await?;

    if !outcome.stdout.is_empty() {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&outcome.stdout).await?;
        stdout.flush().await?;
    }
    if !outcome.stderr.is_empty() {
        eprintln!("{}", outcome.stderr);
    }

    tracing::debug!(exit_code = outcome.exit_code.code(), "Hook processed");
    Ok(outcome.exit_code.code())
}

/// Lints files from disk, exiting with 2 when any error is found.
///
/// # Errors
/// Returns an error when configuration is invalid or a file cannot be read.
pub async fn check_files(options: &GlobalOptions, files: Vec<PathBuf>) -> Result<i32> {
    let config = load_config(options)?;
    let engine = linting_engine(&config)?;

    let mut inputs = Vec::with_capacity(files.len());
    for path in files {
        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        inputs.push((path, content));
    }

    let active = engine
        .linters()
        .iter()
        .filter(|l| config.is_linter_enabled(l.name()))
        .cloned()
        .collect();
    let results = BatchExecutor::new(active)
        .execute(&inputs, |path, linter| engine.effective_overrides(path, linter))
        .await;

    let mut errors = 0;
    for result in &results {
        errors += result.report.error_count();
        if result.report.has_issues() || !result.failures.is_empty() {
            println!("{}\n", format_feedback(&result.path, &result.report, &result.failures));
        }
    }

    let issues: usize = results.iter().map(|r| r.report.issues.len()).sum();
    println!("Checked {} file(s): {issues} issue(s), {errors} error(s)", results.len());
    Ok(if errors > 0 { ExitCode::Blocking.code() } else { ExitCode::Success.code() })
}

/// Prints the linting plan for each file.
///
/// # Errors
/// Returns an error when configuration is invalid.
pub fn show_actions(options: &GlobalOptions, files: &[PathBuf]) -> Result<i32> {
    let config = load_config(options)?;
    let engine = linting_engine(&config)?;

    for path in files {
        println!("{}", engine.describe_file(path));
    }
    Ok(0)
}

/// Adds the hook to the selected settings files.
///
/// # Errors
/// Returns an error when a settings file cannot be read or written.
pub fn init(options: InitOptions) -> Result<i32> {
    for path in options.default_targets()? {
        println!("Processing: {}", path.display());

        let Some(change) = setup::prepare_change(&path)? else {
            println!("✓ lintgate hook is already configured\n");
            continue;
        };

        println!("\n{}", change.describe());

        if options.dry_run {
            println!("(Dry run - no changes were made)\n");
            continue;
        }

        if !options.force && !confirm("Apply these changes? [y/N]: ")? {
            println!("Canceled - no changes made\n");
            continue;
        }

        if let Some(backup) = setup::apply_change(&change)? {
            println!("✓ Created backup: {}", backup.display());
        }
        println!("✓ Updated: {}\n", path.display());
    }
    Ok(0)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
