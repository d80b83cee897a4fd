//! Command-line interface: argument model and command dispatch.

use crate::config::{DEFAULT_CONFIG_PATH, OrganizerConfig};
use crate::file_organizer::{OrganizeError, RunReport, organize};
use crate::logging;
use crate::output::OutputFormatter;
use crate::scheduler::{Schedule, Scheduler};
use crate::undo::UndoManager;
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "tidybot",
    version,
    about = "Sort files into folders by type, date or name pattern"
)]
pub struct Cli {
    /// Configuration file (YAML, or TOML with a .toml extension)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Organize the target directory once
    Run {
        /// Only report what would be moved
        #[arg(long)]
        dry_run: bool,
    },
    /// Keep organizing on the configured schedule
    Schedule {
        /// Only report what would be moved
        #[arg(long)]
        dry_run: bool,
    },
    /// Menu driven mode (the default)
    Interactive,
    /// Move the files of the last run back
    Undo,
    /// Write a sample configuration
    Init {
        /// Replace an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Validate the configuration and list its rules
    Check,
}

/// `--dry-run` forces a dry run; without it the configuration decides.
fn dry_run_override(flag: bool) -> Option<bool> {
    flag.then_some(true)
}

pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config;

    match cli.command.unwrap_or(Command::Interactive) {
        Command::Init { force } => init(&config_path, force),
        Command::Run { dry_run } => {
            let config = load_with_logging(&config_path)?;
            let report = run_once(&config, dry_run_override(dry_run))?;
            if !report.is_clean() {
                anyhow::bail!("{} file(s) could not be organized", report.failed.len());
            }
            Ok(())
        }
        Command::Schedule { dry_run } => {
            let config = load_with_logging(&config_path)?;
            let stop = Arc::new(AtomicBool::new(false));
            if let Err(e) = install_stop_handler(Arc::clone(&stop)) {
                tracing::warn!(error = %e, "cannot listen for stop signals");
            }
            run_schedule(&config_path, &config, dry_run_override(dry_run), &stop)
        }
        Command::Interactive => {
            load_with_logging(&config_path)?;
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            interactive_menu(stdin.lock(), &mut stdout, |dry_run| {
                let config = OrganizerConfig::load(&config_path)?;
                run_once(&config, Some(dry_run)).map(|_| ())
            })
        }
        Command::Undo => undo(&load_with_logging(&config_path)?),
        Command::Check => check(&config_path, &load_with_logging(&config_path)?),
    }
}

fn init(config_path: &Path, force: bool) -> anyhow::Result<()> {
    let _ = logging::init(None);
    OrganizerConfig::write_sample(config_path, force)
        .with_context(|| format!("could not create {}", config_path.display()))?;
    OutputFormatter::success(&format!(
        "Sample configuration written to {}",
        config_path.display()
    ));
    OutputFormatter::info("Edit target_directory and the rules, then run `tidybot check`.");
    Ok(())
}

/// Loads the configuration and starts logging to its log file.
///
/// Logging is started either way so a broken configuration is still
/// reported.
fn load_with_logging(path: &Path) -> anyhow::Result<OrganizerConfig> {
    match OrganizerConfig::load(path) {
        Ok(config) => {
            if let Err(e) = logging::init(Some(&config.log_file)) {
                tracing::warn!(
                    log_file = %config.log_file.display(),
                    error = %e,
                    "cannot write log file, logging to console only"
                );
            }
            Ok(config)
        }
        Err(e) => {
            let _ = logging::init(None);
            Err(e).with_context(|| format!("could not load configuration {}", path.display()))
        }
    }
}

/// One pass over the target directory with live per-file output.
pub fn run_once(config: &OrganizerConfig, dry_run: Option<bool>) -> anyhow::Result<RunReport> {
    let effective_dry_run = dry_run.unwrap_or(config.dry_run);
    let base = &config.target_directory;

    if effective_dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing {}", base.display()));
    } else {
        OutputFormatter::info(&format!("Organizing {}", base.display()));
    }

    let spinner = (!effective_dry_run).then(OutputFormatter::create_spinner);
    let result = organize(config, dry_run, |action, outcome| {
        let line = OutputFormatter::describe(action, outcome, base);
        match &spinner {
            Some(spinner) => {
                spinner.println(line);
                spinner.inc(1);
            }
            None => OutputFormatter::plain(&line),
        }
    });
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let report = result.with_context(|| format!("organizing {} failed", base.display()))?;
    OutputFormatter::run_summary(&report);
    if !report.dry_run && report.processed > 0 {
        OutputFormatter::info("Run `tidybot undo` to revert this run.");
    }
    Ok(report)
}

/// The scheduled job. Each call rereads the configuration so edits apply
/// without a restart.
fn scheduled_job(
    config_path: &Path,
    dry_run: Option<bool>,
) -> impl FnMut() -> anyhow::Result<()> + '_ {
    move || {
        let config = OrganizerConfig::load(config_path)?;
        run_once(&config, dry_run).map(|_| ())
    }
}

/// Runs the schedule until `stop` is raised. A run in progress always
/// completes first.
fn run_schedule(
    config_path: &Path,
    config: &OrganizerConfig,
    dry_run: Option<bool>,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let schedule = Schedule::from_config(&config.schedule)?;
    let poll = Duration::from_secs(config.schedule.poll_seconds);

    OutputFormatter::info(&format!(
        "Scheduler running {schedule}, press Ctrl+C to stop"
    ));

    let mut scheduler = Scheduler::new(schedule, poll, scheduled_job(config_path, dry_run));
    scheduler.run_until(stop);
    OutputFormatter::info("Scheduler stopped");
    Ok(())
}

/// Raises `stop` on Ctrl+C or SIGTERM.
fn install_stop_handler(stop: Arc<AtomicBool>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("tidybot-signals".to_string())
        .spawn(move || {
            runtime.block_on(shutdown_signal());
            tracing::info!("stop requested, finishing the current run");
            stop.store(true, Ordering::SeqCst);
        })?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Prompts until the user exits or input ends.
///
/// `run` receives whether the chosen run is a dry run. A failing run is
/// reported and the menu comes back.
pub fn interactive_menu<R, W, F>(input: R, output: &mut W, mut run: F) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(bool) -> anyhow::Result<()>,
{
    writeln!(output, "Tidybot - Interactive Mode")?;
    writeln!(output, "==========================")?;

    let mut lines = input.lines();
    loop {
        writeln!(output, "\nOptions:")?;
        writeln!(output, "1. Run organization (dry run)")?;
        writeln!(output, "2. Run organization (actual move)")?;
        writeln!(output, "3. Exit")?;
        write!(output, "Enter your choice (1-3): ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            return Ok(());
        };

        let dry_run = match line?.trim() {
            "1" => true,
            "2" => false,
            "3" => {
                writeln!(output, "Goodbye!")?;
                return Ok(());
            }
            _ => {
                writeln!(output, "Invalid choice. Please try again.")?;
                continue;
            }
        };

        if let Err(e) = run(dry_run) {
            tracing::error!(error = %e, "organization failed");
            writeln!(output, "Error: {e:#}")?;
        }
    }
}

fn undo(config: &OrganizerConfig) -> anyhow::Result<()> {
    OutputFormatter::info(&format!(
        "Undoing last run in {}",
        config.target_directory.display()
    ));

    match UndoManager::undo(&config.target_directory) {
        Ok(report) => {
            OutputFormatter::undo_summary(&report);
            if report.is_complete_success() {
                Ok(())
            } else {
                anyhow::bail!("undo was incomplete")
            }
        }
        Err(OrganizeError::NoHistory(_)) => {
            OutputFormatter::warning("Nothing to undo.");
            Ok(())
        }
        Err(e) => Err(e).context("undo failed"),
    }
}

fn check(config_path: &Path, config: &OrganizerConfig) -> anyhow::Result<()> {
    let compiled = config.compile()?;
    let schedule = Schedule::from_config(&config.schedule)?;

    OutputFormatter::success(&format!("{} is valid", config_path.display()));
    OutputFormatter::plain(&format!("Target:    {}", config.target_directory.display()));
    OutputFormatter::plain(&format!("Log file:  {}", config.log_file.display()));
    OutputFormatter::plain(&format!("Conflicts: {}", config.conflict_resolution));
    OutputFormatter::plain(&format!("Schedule:  {schedule}"));
    if config.dry_run {
        OutputFormatter::dry_run_notice("dry_run is enabled in the configuration");
    }

    OutputFormatter::header("RULES");
    for (index, rule) in compiled.rules.rules().iter().enumerate() {
        let count = rule.condition_count();
        OutputFormatter::plain(&format!(
            "{:>3}. {} ({} condition{})",
            index + 1,
            rule.name,
            count,
            if count == 1 { "" } else { "s" }
        ));
    }
    if let Some(unmatched) = &config.unmatched {
        OutputFormatter::plain(&format!("     otherwise: {unmatched}"));
    }

    if !config.target_directory.is_dir() {
        OutputFormatter::warning(&format!(
            "Target directory {} does not exist yet",
            config.target_directory.display()
        ));
    }
    Ok(())
}
