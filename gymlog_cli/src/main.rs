use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use gymlog_core::store::{self, LoadSource};
use gymlog_core::tracker::SyncReport;
use gymlog_core::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gymlog")]
#[command(about = "Workout log with streaks and training statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a workout for today
    Log {
        /// Workout name from the catalog (case-insensitive)
        workout: String,

        /// Log even if today's picker would not offer this workout
        #[arg(long)]
        force: bool,
    },

    /// Show streak, monthly count, favorite and per-workout totals (default)
    Stats,

    /// List every entry grouped by day, newest first
    History,

    /// Show the entries logged on one day
    Day {
        /// Date as YYYY-MM-DD
        date: NaiveDate,
    },

    /// Show which workouts can still be logged today
    Choices,

    /// Change the workout of an entry
    Edit {
        #[command(flatten)]
        key: KeyArgs,

        /// New workout name from the catalog
        workout: String,
    },

    /// Delete an entry
    Delete {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Reload the log from the store
    Sync,

    /// Manage the workout catalog
    Workouts {
        #[command(subcommand)]
        action: Option<WorkoutsCommand>,
    },

    /// Show or set the theme preference
    Theme {
        /// light or dark
        theme: Option<String>,
    },

    /// Write the log to a CSV file
    Export {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum WorkoutsCommand {
    /// List catalog workouts (default)
    List,
    /// Add a workout to the catalog
    Add { name: String },
    /// Remove a workout from the catalog
    Remove { name: String },
    /// Restore the default catalog
    Reset,
}

/// Addresses one entry by store id or by creation timestamp
#[derive(Args)]
#[group(required = true, multiple = false)]
struct KeyArgs {
    /// Entry id issued by the store
    #[arg(long)]
    id: Option<String>,

    /// Entry timestamp in milliseconds
    #[arg(long)]
    timestamp: Option<i64>,
}

impl KeyArgs {
    fn into_key(self) -> Result<EntryKey> {
        match (self.id, self.timestamp) {
            (Some(id), _) => Ok(EntryKey::Id(id)),
            (None, Some(ts)) => Ok(EntryKey::Timestamp(ts)),
            (None, None) => Err(Error::Other("pass --id or --timestamp".into())),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    gymlog_core::logging::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let mut config = Config::load_or_default(&config_path)?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    let prefs_path = config.preferences_path();
    tracing::debug!(
        "Using {} store with data in {:?}",
        config.store.backend_name(),
        config.data.data_dir
    );

    // Catalog and theme live locally and never touch the store
    let command = match cli.command.unwrap_or(Commands::Stats) {
        Commands::Workouts { action } => return cmd_workouts(&prefs_path, action),
        Commands::Theme { theme } => return cmd_theme(&prefs_path, theme),
        command => command,
    };

    let prefs = Preferences::load(&prefs_path)?;
    let mut tracker = Tracker::new(store::open(&config)?);
    let report = tracker.refresh().await;

    if let Commands::Sync = command {
        return cmd_sync(&tracker, report);
    }
    if let Some(failure) = &report.failure {
        eprintln!(
            "Warning: could not load log from {} store ({}); showing {}",
            tracker.backend(),
            failure,
            match report.source {
                LoadSource::Cache => "cached entries",
                _ => "no entries",
            }
        );
    }

    match command {
        Commands::Log { workout, force } => cmd_log(&mut tracker, &prefs, &workout, force).await,
        Commands::Stats => {
            cmd_stats(&tracker, &prefs);
            Ok(())
        }
        Commands::History => {
            cmd_history(&tracker);
            Ok(())
        }
        Commands::Day { date } => {
            cmd_day(&tracker, date);
            Ok(())
        }
        Commands::Choices => {
            cmd_choices(&tracker, &prefs);
            Ok(())
        }
        Commands::Edit { key, workout } => {
            let key = key.into_key()?;
            let workout = resolve_workout(&prefs, &workout)?;
            tracker.edit(&key, &workout).await?;
            println!("✓ Changed entry with {} to {}", key, workout);
            Ok(())
        }
        Commands::Delete { key } => {
            let key = key.into_key()?;
            let removed = tracker.remove(&key).await?;
            println!("✓ Deleted {} entry with {}", removed.workout, key);
            Ok(())
        }
        Commands::Export { file } => {
            let count = gymlog_core::export::export_csv(tracker.entries(), &file, &Local)?;
            println!("✓ Exported {} entries", count);
            println!("  CSV: {}", file.display());
            Ok(())
        }
        Commands::Sync | Commands::Workouts { .. } | Commands::Theme { .. } => Ok(()),
    }
}

fn resolve_workout(prefs: &Preferences, name: &str) -> Result<String> {
    prefs
        .workouts
        .resolve(name)
        .map(str::to_string)
        .ok_or_else(|| Error::Other(format!("Unknown workout: {}", name)))
}

async fn cmd_log(tracker: &mut Tracker, prefs: &Preferences, name: &str, force: bool) -> Result<()> {
    let workout = resolve_workout(prefs, name)?;

    if !force {
        let blocked = tracker
            .choices(&prefs.workouts, &Local::now())
            .into_iter()
            .any(|choice| choice.workout == workout && choice.disabled);
        if blocked {
            return Err(Error::Other(format!(
                "{} is not available today (use --force to log anyway)",
                workout
            )));
        }
    }

    let entry = tracker.log_workout(&workout, Utc::now()).await?;
    println!("✓ Logged {}", entry.workout);
    println!("  Key: {}", entry.key());
    Ok(())
}

fn cmd_stats(tracker: &Tracker, prefs: &Preferences) {
    let dashboard = tracker.dashboard(&prefs.workouts, &Local::now());

    println!("Streak:     {} days", dashboard.streak);
    println!("This month: {}", dashboard.month_count);
    println!("Favorite:   {}", dashboard.favorite_label());

    if !dashboard.counts.is_empty() {
        println!();
        println!("By workout:");
        for (workout, count) in dashboard.counts.iter() {
            println!("  {:<12} {}", workout, count);
        }
    }

    println!();
    println!("Recent:");
    for day in &dashboard.recent {
        let workouts = if day.workouts.is_empty() {
            "-".to_string()
        } else {
            day.workouts.join(", ")
        };
        println!("  {}  {}", day.date, workouts);
    }

    if tracker.pending() > 0 {
        println!();
        println!("{} entries not yet confirmed by the store", tracker.pending());
    }
}

fn print_entry(entry: &LogEntry) {
    let time = entry
        .at(&Local)
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    println!("  {}  {:<12} [{}]", time, entry.workout, entry.key());
}

fn cmd_history(tracker: &Tracker) {
    let days = stats::group_by_day(tracker.entries(), &Local);
    if days.is_empty() {
        println!("No workouts logged yet.");
        return;
    }

    for (date, entries) in days.iter().rev() {
        println!("{}", date);
        for entry in entries {
            print_entry(entry);
        }
    }
}

fn cmd_day(tracker: &Tracker, date: NaiveDate) {
    let entries = stats::entries_on(tracker.entries(), date, &Local);
    if entries.is_empty() {
        println!("No workouts logged on {}.", date);
        return;
    }

    println!("{}", date);
    for entry in &entries {
        print_entry(entry);
    }
}

fn cmd_choices(tracker: &Tracker, prefs: &Preferences) {
    for choice in tracker.choices(&prefs.workouts, &Local::now()) {
        let mark = if choice.disabled { "x" } else { " " };
        println!("  [{}] {}", mark, choice.workout);
    }
}

fn cmd_sync(tracker: &Tracker, report: SyncReport) -> Result<()> {
    if let Some(failure) = report.failure {
        return Err(failure.into());
    }

    println!("Synced! {} entries from {} store", report.loaded, tracker.backend());
    if report.dropped > 0 {
        println!("  Dropped {} unconfirmed entries", report.dropped);
    }
    Ok(())
}

fn cmd_workouts(prefs_path: &Path, action: Option<WorkoutsCommand>) -> Result<()> {
    match action.unwrap_or(WorkoutsCommand::List) {
        WorkoutsCommand::List => {
            let prefs = Preferences::load(prefs_path)?;
            for workout in prefs.workouts.iter() {
                println!("{}", workout);
            }
        }
        WorkoutsCommand::Add { name } => {
            Preferences::update(prefs_path, |prefs| {
                if prefs.workouts.add(&name) {
                    Ok(())
                } else {
                    Err(Error::Other(format!(
                        "Cannot add {:?}: blank or already in the catalog",
                        name
                    )))
                }
            })?;
            println!("✓ Added {}", name.trim());
        }
        WorkoutsCommand::Remove { name } => {
            Preferences::update(prefs_path, |prefs| {
                if prefs.workouts.remove(&name) {
                    Ok(())
                } else {
                    Err(Error::Other(format!("No workout named {:?}", name)))
                }
            })?;
            println!("✓ Removed {}", name);
        }
        WorkoutsCommand::Reset => {
            Preferences::update(prefs_path, |prefs| {
                prefs.workouts.reset();
                Ok(())
            })?;
            println!("✓ Restored default workouts");
        }
    }
    Ok(())
}

fn cmd_theme(prefs_path: &Path, theme: Option<String>) -> Result<()> {
    match theme {
        None => {
            let prefs = Preferences::load(prefs_path)?;
            println!("{}", prefs.theme.as_str());
        }
        Some(value) => {
            let theme: Theme = value.parse()?;
            Preferences::update(prefs_path, |prefs| {
                prefs.theme = theme;
                Ok(())
            })?;
            println!("✓ Theme set to {}", theme.as_str());
        }
    }
    Ok(())
}
