//! CLI tool that syncs task slides into category sheets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tasksheet_core::config::{file_locator, validate_sheet_name};
use tasksheet_core::storage::DEFAULT_STATE_DIR;
use tasksheet_core::{
    plan_reset, CheckpointStore, Clock, FileCheckpointStore, FileScheduler, JobContext, JobStatus,
    Materializer, RunLock, RunPolicy, Scheduler, SettingKey, Settings, SettingsStore, StateDir,
    SyncJob, SystemClock, SYNC_JOB,
};
use tasksheet_pptx::PptxParser;
use tasksheet_xlsx::XlsxMaterializer;

/// Collect "Category / Task / Summary" slides into per-category sheets and an index.
#[derive(Parser, Debug)]
#[command(name = "tasksheet-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding settings, checkpoint and schedule
    #[arg(long, global = true, default_value = DEFAULT_STATE_DIR)]
    state_dir: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },

    /// Update the index and task sheets, resuming any interrupted scan
    Run {
        /// Stop after one invocation instead of waiting for the continuation
        #[arg(long)]
        once: bool,

        /// Time budget per invocation, in seconds (default: 300)
        #[arg(long)]
        budget_secs: Option<u64>,

        /// Delay before a suspended scan continues, in seconds (default: 10)
        #[arg(long)]
        resume_delay_secs: Option<u64>,
    },

    /// Show scan progress and any pending continuation
    Status,

    /// Delete all task sheets and clear every setting and saved state
    Reset,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the stored settings
    Show,

    /// Set the slide deck to scan (.pptx)
    SetSource {
        deck: PathBuf,

        /// Base URL used for task links (default: file URL of the deck)
        #[arg(long)]
        locator: Option<String>,
    },

    /// Set the destination workbook and its index sheet
    SetDestination {
        workbook: PathBuf,

        #[arg(long)]
        index_sheet: String,
    },

    /// Delete one setting (slide-source, slide-locator, workbook, index-sheet)
    Delete { key: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let state = StateDir::new(&args.state_dir);

    match args.command {
        Command::Settings { action } => settings_command(&state, action),
        Command::Run {
            once,
            budget_secs,
            resume_delay_secs,
        } => {
            let mut policy = RunPolicy::new();
            if let Some(secs) = budget_secs {
                policy = policy.with_budget_ms(secs.saturating_mul(1_000));
            }
            if let Some(secs) = resume_delay_secs {
                policy = policy.with_resume_delay_ms(secs.saturating_mul(1_000));
            }
            run_command(&state, policy, once)
        }
        Command::Status => status_command(&state),
        Command::Reset => reset_command(&state),
    }
}

fn settings_command(state: &StateDir, action: SettingsCommand) -> Result<()> {
    let mut store = SettingsStore::open(state.settings_path())?;

    match action {
        SettingsCommand::Show => {
            let mut any = false;
            for (key, value) in store.entries() {
                println!("{} = {}", key, value);
                any = true;
            }
            if !any {
                println!("No settings stored in {}", state.root().display());
            }
        }
        SettingsCommand::SetSource { deck, locator } => {
            let locator = locator.unwrap_or_else(|| file_locator(&deck));
            let parsed = PptxParser::new()
                .open(&deck, &locator)
                .with_context(|| format!("Invalid slide deck {}. Try again.", deck.display()))?;
            log::debug!("{} has {} slides", deck.display(), parsed.slides.len());

            let absolute = std::fs::canonicalize(&deck).unwrap_or(deck);
            store.set(SettingKey::SlideSource, absolute.to_string_lossy())?;
            store.set(SettingKey::SlideLocator, locator)?;
            report_setting(SettingKey::SlideSource, "set");
        }
        SettingsCommand::SetDestination {
            workbook,
            index_sheet,
        } => {
            validate_sheet_name(&index_sheet)?;
            check_parent_dir(&workbook)?;
            store.set(SettingKey::Workbook, workbook.to_string_lossy())?;
            store.set(SettingKey::IndexSheet, index_sheet.trim())?;
            report_setting(SettingKey::IndexSheet, "set");
        }
        SettingsCommand::Delete { key } => {
            let key: SettingKey = key.parse()?;
            store.delete(key)?;
            report_setting(key, "deleted");
        }
    }

    Ok(())
}

fn report_setting(key: SettingKey, action: &str) {
    println!("{} was successfully {}.", key.label(), action);
}

fn check_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            anyhow::bail!("Directory {} does not exist", parent.display())
        }
        _ => Ok(()),
    }
}

/// Run the job, waiting for and executing continuations unless `once` is set.
fn run_command(state: &StateDir, policy: RunPolicy, once: bool) -> Result<()> {
    let store = SettingsStore::open(state.settings_path())?;
    let settings = Settings::resolve(&store)?;
    policy.validate()?;

    let _lock = RunLock::acquire(state.lock_path())?;

    let deck = PptxParser::new()
        .open(&settings.slide_source, &settings.slide_locator)
        .with_context(|| format!("Failed to read {}", settings.slide_source.display()))?;
    log::info!("{} slides in {}", deck.slides.len(), settings.slide_source.display());

    let clock = SystemClock;
    let job = SyncJob::new(policy, &settings.index_sheet);

    loop {
        let mut checkpoints = FileCheckpointStore::new(state.checkpoint_path());
        let mut scheduler = FileScheduler::new(state.schedule_path(), &clock);
        let mut sink = XlsxMaterializer::new(&settings.workbook);

        let status = job.run(
            &deck.slides,
            &mut JobContext {
                store: &mut checkpoints,
                scheduler: &mut scheduler,
                materializer: &mut sink,
                clock: &clock,
            },
        )?;

        match status {
            JobStatus::Completed { groups, tasks } => {
                println!(
                    "Index Sheet and Task Sheets have been updated ({} sheets, {} tasks).",
                    groups, tasks
                );
                return Ok(());
            }
            JobStatus::Suspended { resume_index } => {
                println!(
                    "Time budget reached at slide {} of {}; \
                     processing will continue automatically.",
                    resume_index + 1,
                    deck.slides.len()
                );
                if once {
                    return Ok(());
                }
                if let Some(pending) = scheduler.pending(job.name())? {
                    let wait = pending.remaining_ms(clock.now_millis());
                    log::debug!("Continuing in {} ms", wait);
                    std::thread::sleep(Duration::from_millis(wait));
                }
            }
        }
    }
}

fn status_command(state: &StateDir) -> Result<()> {
    let clock = SystemClock;
    let checkpoint = FileCheckpointStore::new(state.checkpoint_path()).load()?;

    if checkpoint.is_fresh() {
        println!("No scan in progress.");
    } else {
        let tasks: usize = checkpoint
            .completed_groups
            .iter()
            .chain(checkpoint.in_progress_group.iter())
            .map(|g| g.tasks.len())
            .sum();
        println!(
            "Scan paused before slide {}: {} finished groups, {} tasks so far.",
            checkpoint.resume_index + 1,
            checkpoint.completed_groups.len(),
            tasks
        );
        if let Some(group) = &checkpoint.in_progress_group {
            println!("Current group: {}", group.sheet_name());
        }
    }

    let scheduler = FileScheduler::new(state.schedule_path(), &clock);
    if let Some(pending) = scheduler.pending(SYNC_JOB)? {
        println!(
            "Continuation due in {} s.",
            pending.remaining_ms(clock.now_millis()).div_ceil(1_000)
        );
    }

    if state.lock_path().exists() {
        println!("A run holds {}.", state.lock_path().display());
    }

    Ok(())
}

/// Blank the workbook down to its index sheet and forget all state.
fn reset_command(state: &StateDir) -> Result<()> {
    let clock = SystemClock;
    let mut store = SettingsStore::open(state.settings_path())?;

    if let (Some(workbook), Some(index_sheet)) = (
        store.get(SettingKey::Workbook),
        store.get(SettingKey::IndexSheet),
    ) {
        if Path::new(workbook).exists() {
            XlsxMaterializer::new(workbook)
                .materialize(&plan_reset(index_sheet))
                .with_context(|| format!("Failed to reset {}", workbook))?;
        }
    }

    FileCheckpointStore::new(state.checkpoint_path()).clear()?;
    FileScheduler::new(state.schedule_path(), &clock).cancel_all(SYNC_JOB)?;
    RunLock::force_release(&state.lock_path())?;
    store.delete_all()?;

    println!("All task sheets were deleted and all stored information was reset.");
    Ok(())
}
