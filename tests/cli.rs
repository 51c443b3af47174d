//! CLI-surface tests: argument parsing only. Every one of these exits
//! before the binary ever dials a database connection (`--help`/`--version`
//! and clap's own usage-error path both short-circuit inside `Cli::parse()`,
//! ahead of `cli::run()`'s config/DB wiring), so no Postgres instance is
//! required to run this file.

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn help_lists_every_subcommand() {
    Command::cargo_bin("daybook")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("import"))
        .stdout(contains("classify"))
        .stdout(contains("run"))
        .stdout(contains("export"))
        .stdout(contains("search"));
}

#[test]
fn version_flag_reports_the_crate_version() {
    Command::cargo_bin("daybook")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn run_create_without_required_args_is_a_usage_error() {
    Command::cargo_bin("daybook")
        .unwrap()
        .args(["run", "create"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn classify_without_mode_defaults_but_still_requires_ids() {
    Command::cargo_bin("daybook")
        .unwrap()
        .arg("classify")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn search_requires_a_scope() {
    Command::cargo_bin("daybook")
        .unwrap()
        .args(["search", "some query"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn label_model_without_prompt_version_id_is_rejected() {
    Command::cargo_bin("daybook")
        .unwrap()
        .args([
            "run",
            "create",
            "--import-batch-id",
            "batch-1",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-01-31",
            "--source",
            "chatgpt",
            "--filter-profile-id",
            "profile-1",
            "--label-model",
            "gpt-4.1",
        ])
        .assert()
        .failure()
        .code(2);
}
