use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use interval_core::experience::{level_progress, ExperienceCalculator};
use interval_core::history::export_csv;
use interval_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ivl")]
#[command(about = "Interval workout timer with achievements", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workout to completion (default)
    Run {
        /// Number of sets for this workout
        #[arg(long)]
        sets: Option<u32>,

        /// Drive the timer instantly instead of in real time
        #[arg(long)]
        simulate: bool,

        /// Only print the final summary
        #[arg(long)]
        quiet: bool,
    },

    /// Show or adjust the stored timer settings
    Settings {
        /// FIELD=DELTA, e.g. rest=+10 or sets=-1 (repeatable)
        #[arg(long = "adjust", value_name = "FIELD=DELTA")]
        adjustments: Vec<String>,
    },

    /// List completed workouts
    History {
        /// Append the history to a CSV file
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,

        /// Show at most this many entries
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show achievements and their progress
    Achievements,

    /// Show experience level
    Level,

    /// Abandon the stored workout session
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    interval_core::logging::init_with_level(if cli.verbose { "debug" } else { "warn" });

    let config = Config::load()?;
    if let Err(e) = config.ensure_valid() {
        eprintln!("Invalid configuration at {:?}", Config::default_config_path());
        return Err(e);
    }
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Some(Commands::Run {
            sets,
            simulate,
            quiet,
        }) => cmd_run(&data_dir, config, sets, simulate, quiet),
        Some(Commands::Settings { adjustments }) => cmd_settings(&data_dir, config, &adjustments),
        Some(Commands::History { csv, limit }) => cmd_history(&data_dir, csv.as_deref(), limit),
        Some(Commands::Achievements) => cmd_achievements(&data_dir),
        Some(Commands::Level) => cmd_level(&data_dir, &config),
        Some(Commands::Reset) => cmd_reset(&data_dir, config),
        None => cmd_run(&data_dir, config, None, false, false),
    }
}

fn cmd_run(
    data_dir: &Path,
    config: Config,
    sets: Option<u32>,
    simulate: bool,
    quiet: bool,
) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let store = FileStore::new(data_dir);

    if simulate {
        let clock = ManualClock::new(Utc::now());
        let handle = clock.clone();
        let timer = WorkoutTimer::new(store, clock, config);
        drive(timer, sets, quiet, |due| handle.set(due))
    } else {
        let timer = WorkoutTimer::new(store, SystemClock, config);
        drive(timer, sets, quiet, sleep_until)
    }
}

fn sleep_until(due: DateTime<Utc>) {
    let wait = due - Utc::now();
    if let Ok(wait) = wait.to_std() {
        std::thread::sleep(wait);
    }
}

/// Run the timer until the workout completes or nothing is left to do
fn drive<S: Store, C: Clock>(
    mut timer: WorkoutTimer<S, C>,
    sets: Option<u32>,
    quiet: bool,
    mut wait: impl FnMut(DateTime<Utc>),
) -> Result<()> {
    if timer.restore() {
        let session = timer.session();
        println!(
            "Resuming {} (set {}/{}, {}s left)",
            session.phase, session.current_set, session.total_sets, session.time_remaining
        );
        if sets.is_some() {
            eprintln!("Ignoring --sets for a resumed workout");
        }
        if timer.session().is_paused {
            timer.toggle_pause()?;
        }
    }

    if timer.session().phase == Phase::Setup {
        if let Some(sets) = sets {
            let delta = sets as i64 - i64::from(timer.session().total_sets);
            timer.adjust_sets(delta.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)?;
        }
        let session = timer.session();
        if !quiet {
            println!(
                "Starting {} sets of {} reps ({}s per rep, {}s rest, {}s stretch): {} total",
                session.total_sets,
                session.settings.reps_per_set,
                session.settings.time_per_rep,
                session.settings.rest_time,
                session.settings.stretch_time,
                format_seconds(session.total_duration())
            );
        }
        timer.start_workout()?;
    }

    loop {
        if timer.session().phase == Phase::Prepare {
            let events = timer.continue_to_stretch()?;
            print_events(&events, timer.session(), quiet);
        }

        let Some(due) = timer.next_due() else {
            break;
        };
        wait(due);

        let events = timer.run_due();
        print_events(&events, timer.session(), quiet);
        if events
            .iter()
            .any(|event| matches!(event, TimerEvent::Completed(_)))
        {
            break;
        }
    }

    Ok(())
}

fn print_events(events: &[TimerEvent], session: &WorkoutSession, quiet: bool) {
    for event in events {
        match event {
            TimerEvent::Completed(report) => print_report(report),
            _ if quiet => {}
            TimerEvent::Session(SessionEvent::PhaseChanged { to, .. }) => match to {
                Phase::Countdown => println!("Stretch: {}s", session.settings.stretch_time),
                Phase::Work => println!(
                    "Set {}/{}: work {}s",
                    session.current_set,
                    session.total_sets,
                    session.settings.work_seconds()
                ),
                Phase::Rest => println!("Rest: {}s", session.settings.rest_time),
                _ => {}
            },
            TimerEvent::Session(SessionEvent::RepAdvanced { rep, .. }) => {
                println!("  rep {}/{}", rep, session.settings.reps_per_set)
            }
            TimerEvent::Session(SessionEvent::Ticked { .. }) => {}
        }
    }
}

fn print_report(report: &CompletionReport) {
    let facts = &report.session_facts;
    println!();
    println!(
        "✓ Workout complete: {} sets, {} reps, {} active",
        facts.sets,
        facts.reps,
        format_seconds(facts.time_seconds)
    );
    if facts.paused_seconds > 0 {
        println!("  Paused for {}", format_seconds(facts.paused_seconds));
    }

    for achievement in &report.unlocked_achievements {
        println!(
            "  🏆 Achievement unlocked: {} ({}, {})",
            achievement.name, achievement.category, achievement.rarity
        );
    }
    for progress in &report.progress_achievements {
        println!(
            "  Progress: {} {}/{}",
            progress.name, progress.progress, progress.max_progress
        );
    }

    let xp = &report.experience;
    println!(
        "  +{} XP (level {}, {}/{} to next)",
        xp.total_awarded, xp.progress.level, xp.progress.into_level, xp.progress.needed
    );
    if let Some(level) = xp.level_up {
        println!("  Level up! Now level {}", level);
    }
}

fn cmd_settings(data_dir: &Path, config: Config, adjustments: &[String]) -> Result<()> {
    let mut timer = WorkoutTimer::new(FileStore::new(data_dir), SystemClock, config);
    if timer.restore() && !adjustments.is_empty() {
        return Err(Error::Other(format!(
            "A workout is in progress ({}); run `ivl reset` before changing settings",
            timer.session().phase
        )));
    }

    for adjustment in adjustments {
        let (field, delta) = adjustment
            .split_once('=')
            .ok_or_else(|| Error::Other(format!("Expected FIELD=DELTA, got '{}'", adjustment)))?;
        let delta: i32 = delta
            .trim()
            .parse()
            .map_err(|_| Error::Other(format!("Invalid delta '{}'", delta)))?;

        match field.trim() {
            "sets" | "total_sets" => timer.adjust_sets(delta)?,
            other => timer.adjust_time(other.parse::<TimeField>()?, delta)?,
        };
    }

    let session = timer.session();
    println!("Sets:          {}", session.total_sets);
    for field in TimeField::ALL {
        println!("{:<14} {}", format!("{}:", field.as_str()), session.settings.get(field));
    }
    println!("Session length: {}", format_seconds(session.total_duration()));
    Ok(())
}

fn cmd_history(data_dir: &Path, csv: Option<&Path>, limit: usize) -> Result<()> {
    let store = FailOpen::new(FileStore::new(data_dir));
    let entries = store.history();

    if let Some(csv_path) = csv {
        let count = export_csv(&entries, csv_path)?;
        println!("✓ Exported {} workouts to {}", count, csv_path.display());
        return Ok(());
    }

    if entries.is_empty() {
        println!("No workouts yet.");
        return Ok(());
    }

    for entry in entries.iter().rev().take(limit) {
        let stats = &entry.statistics;
        println!(
            "{}  {} sets x {} reps  {} active  {} paused",
            entry.completed_at.format("%Y-%m-%d %H:%M"),
            entry.total_sets,
            entry.settings.reps_per_set,
            format_seconds(stats.active_seconds()),
            format_seconds(stats.total_time_paused)
        );
    }
    Ok(())
}

fn cmd_achievements(data_dir: &Path) -> Result<()> {
    let store = FailOpen::new(FileStore::new(data_dir));
    let states = store.achievement_states();
    let data = store.accumulated_data();
    let catalog = get_default_catalog();

    let mut unlocked = 0;
    for def in catalog.definitions() {
        let state = states.iter().find(|s| s.id == def.id);
        let line = format!("{} ({}, {})", def.name, def.category, def.rarity);
        match state {
            Some(s) if s.unlocked => {
                unlocked += 1;
                let when = s
                    .unlocked_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!("[x] {}  {}", line, when);
            }
            _ => {
                let progress = def
                    .rule
                    .progress(&data)
                    .zip(def.max_progress)
                    .map(|(p, max)| format!("  {}/{}", p.min(max), max))
                    .unwrap_or_default();
                println!("[ ] {}{}", line, progress);
                println!("      {}", def.description);
            }
        }
    }

    println!();
    println!("{}/{} unlocked", unlocked, catalog.len());
    println!(
        "Weekly streak: {}  Workout days: {}  Sets: {}  Reps: {}",
        data.weekly_streak, data.total_workout_days, data.cumulative_sets, data.cumulative_reps
    );
    Ok(())
}

fn cmd_level(data_dir: &Path, config: &Config) -> Result<()> {
    let store = FailOpen::new(FileStore::new(data_dir));
    let state = store.experience();
    let max_level = ExperienceCalculator::new(config.experience.clone()).max_level();
    let progress = level_progress(state.total_xp, max_level);

    println!("Level {} ({} XP)", progress.level, state.total_xp);
    println!("  {}/{} XP to level {}", progress.into_level, progress.needed, progress.level + 1);
    if let Some(at) = state.last_level_up_time {
        println!("  Last level up: {}", at.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn cmd_reset(data_dir: &Path, config: Config) -> Result<()> {
    let mut timer = WorkoutTimer::new(FileStore::new(data_dir), SystemClock, config);
    if !timer.restore() {
        println!("No workout in progress.");
        return Ok(());
    }

    let phase = timer.session().phase;
    timer.reset_workout()?;
    println!("✓ Workout reset (was in {})", phase);
    Ok(())
}

fn format_seconds(seconds: u64) -> String {
    if seconds >= 60 {
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
