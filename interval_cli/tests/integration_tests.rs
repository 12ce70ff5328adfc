//! Integration tests for the ivl binary.
//!
//! These tests verify end-to-end behavior including:
//! - Simulated workouts and their rewards
//! - Settings adjustments and persistence
//! - History listing and CSV export
//! - Recovery from corrupt or leftover data

use assert_cmd::Command;
use interval_core::storage::Store;
use interval_core::{FileStore, Phase, Settings, WorkoutSession};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// The CLI with its config isolated inside `temp_dir`
fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ivl"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"))
        .arg("--data-dir")
        .arg(temp_dir.path().join("data"));
    cmd
}

fn simulate(temp_dir: &TempDir) {
    cli(temp_dir)
        .args(["run", "--simulate", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workout complete"));
}

fn data_file(temp_dir: &TempDir, name: &str) -> std::path::PathBuf {
    temp_dir.path().join("data").join(name)
}

fn mid_workout_session(dir: &Path) {
    let mut session = WorkoutSession::new(Settings::default(), 2);
    session.phase = Phase::Work;
    session.current_set = 2;
    session.time_remaining = 12;
    session.statistics.workout_start_time = Some(chrono::Utc::now());
    FileStore::new(dir).save_session(&session).unwrap();
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("ivl"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Interval workout timer with achievements",
        ));
}

#[test]
fn test_simulated_run_records_everything() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["run", "--simulate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting 3 sets of 10 reps"))
        .stdout(predicate::str::contains("Set 3/3"))
        .stdout(predicate::str::contains("Achievement unlocked: First Steps"))
        .stdout(predicate::str::contains("XP"));

    for name in [
        "session.json",
        "history.json",
        "achievements.json",
        "achievement_data.json",
        "experience.json",
    ] {
        assert!(data_file(&temp_dir, name).exists(), "{} missing", name);
    }

    let history: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_file(&temp_dir, "history.json")).unwrap())
            .unwrap();
    assert_eq!(history.as_array().map(Vec::len), Some(1));
    assert_eq!(history[0]["statistics"]["total_time_exercised"], 90);
    assert_eq!(history[0]["statistics"]["total_reps_completed"], 30);
}

#[test]
fn test_sets_flag_overrides_for_one_run() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["run", "--simulate", "--sets", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Starting 1 sets"))
        .stdout(predicate::str::contains("Rest:").not());
}

#[test]
fn test_history_lists_and_exports() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workouts yet."));

    simulate(&temp_dir);
    simulate(&temp_dir);

    let output = cli(&temp_dir).arg("history").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().filter(|l| l.contains("3 sets x 10 reps")).count(), 2);

    let csv_path = temp_dir.path().join("export").join("history.csv");
    cli(&temp_dir)
        .arg("history")
        .arg("--csv")
        .arg(&csv_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 workouts"));

    let csv = fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.starts_with("id,started_at,completed_at"));
}

#[test]
fn test_settings_adjust_and_persist() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["settings", "--adjust", "rest=+10", "--adjust", "sets=-1"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"rest_time:\s+40").unwrap())
        .stdout(predicate::str::is_match(r"Sets:\s+2").unwrap());

    cli(&temp_dir)
        .arg("settings")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"rest_time:\s+40").unwrap())
        .stdout(predicate::str::is_match(r"Sets:\s+2").unwrap());

    cli(&temp_dir)
        .args(["run", "--simulate", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 sets"));
}

#[test]
fn test_settings_are_clamped() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["settings", "--adjust", "time_per_rep=-100"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"time_per_rep:\s+1\n").unwrap());
}

#[test]
fn test_settings_rejects_bad_input() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .args(["settings", "--adjust", "tempo=+1"])
        .assert()
        .failure();

    cli(&temp_dir)
        .args(["settings", "--adjust", "rest"])
        .assert()
        .failure();
}

#[test]
fn test_achievements_and_level_after_run() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .arg("level")
        .assert()
        .success()
        .stdout(predicate::str::contains("Level 1 (0 XP)"));

    simulate(&temp_dir);

    cli(&temp_dir)
        .arg("achievements")
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] First Steps"))
        .stdout(predicate::str::contains("[ ] Warming Up (milestone, common)  3/10"))
        .stdout(predicate::str::contains("Weekly streak: 1"));

    cli(&temp_dir)
        .arg("level")
        .assert()
        .success()
        .stdout(predicate::str::contains("Level 1 (0 XP)").not())
        .stdout(predicate::str::contains("Last level up"));
}

#[test]
fn test_corrupt_reward_files_do_not_block_a_workout() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("achievements.json"), "{ invalid json }}}}").unwrap();
    fs::write(data_dir.join("achievement_data.json"), "[1, 2").unwrap();
    fs::write(data_dir.join("experience.json"), "").unwrap();
    fs::write(data_dir.join("history.json"), "not a list").unwrap();

    simulate(&temp_dir);

    let data: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_dir.join("achievement_data.json")).unwrap())
            .unwrap();
    assert_eq!(data["cumulative_sets"], 3);
}

#[test]
fn test_interrupted_workout_resumes() {
    let temp_dir = setup_test_dir();
    mid_workout_session(&temp_dir.path().join("data"));

    cli(&temp_dir)
        .args(["run", "--simulate", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming work (set 2/2, 12s left)"))
        .stdout(predicate::str::contains("Workout complete: 2 sets"));
}

#[test]
fn test_reset_clears_stored_session() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workout in progress."));

    mid_workout_session(&temp_dir.path().join("data"));
    cli(&temp_dir)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workout reset (was in work)"));

    assert!(!data_file(&temp_dir, "session.json").exists());
}

#[test]
fn test_invalid_config_is_refused() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config").join("interval");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[timer.bounds.rest_time]\nmin = 100\nmax = 10\n",
    )
    .unwrap();

    cli(&temp_dir)
        .args(["run", "--simulate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
