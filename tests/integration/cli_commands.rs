//! Integration tests for the CLI route table

use crate::integration::test_utils::{make_dir, make_repo, workdir};
use clap::Parser;
use std::path::Path;
use tempfile::TempDir;
use wdctx::cli::{Cli, RunContext};
use wdctx::{SavedState, StateStore};

/// Run context whose state file lives inside `temp`.
fn run_context(temp: &TempDir) -> RunContext {
    let config_file = temp.path().join("wdctx.toml");
    let state_file = temp.path().join("state").join("state.json");
    std::fs::write(
        &config_file,
        format!(
            "[cache]\nmax_entries = 50\n\n[state]\nfile = {:?}\n",
            state_file.to_string_lossy()
        ),
    )
    .unwrap();
    RunContext::new(temp.path().to_path_buf(), Some(config_file)).unwrap()
}

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["wdctx"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_find_prints_repository_root() {
    let temp = TempDir::new().unwrap();
    let repo = make_repo(temp.path(), "repo");
    let nested = make_dir(&repo, "src/deep");
    let context = run_context(&temp);

    let cli = parse(&["find", &path_arg(&nested)]);
    let output = context.execute(&cli.command).await.unwrap();
    assert_eq!(output, workdir(&repo).to_string());

    let loose = make_dir(temp.path(), "loose");
    let cli = parse(&["find", &path_arg(&loose), "--format", "json"]);
    let output = context.execute(&cli.command).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert!(value["root"].is_null());
}

#[tokio::test]
async fn test_resolve_reports_active_and_persists_state() {
    let temp = TempDir::new().unwrap();
    let a = make_repo(temp.path(), "a");
    let b = make_repo(temp.path(), "b");
    let file_in_b = b.join("README.md");
    std::fs::write(&file_in_b, "# b").unwrap();
    let context = run_context(&temp);

    let cli = parse(&[
        "resolve",
        "--project",
        &path_arg(&a),
        "--project",
        &path_arg(&b),
        "--active",
        &path_arg(&file_in_b),
        "--format",
        "json",
    ]);
    let output = context.execute(&cli.command).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(value["active"], workdir(&b).to_string());
    assert_eq!(value["pool"].as_array().unwrap().len(), 2);

    let store = StateStore::new(temp.path().join("state").join("state.json"));
    let saved: SavedState = store.load().unwrap();
    assert_eq!(saved.active_repository_path, Some(workdir(&b).to_string()));
    assert!(!saved.first_run);

    // Without focus hints the saved repository is picked again.
    let cli = parse(&[
        "resolve",
        "--project",
        &path_arg(&a),
        "--project",
        &path_arg(&b),
        "--no-save",
    ]);
    let output = context.execute(&cli.command).await.unwrap();
    assert!(output.starts_with(&format!("Active: {}", workdir(&b))));
}

#[tokio::test]
async fn test_resolve_without_projects_is_absent() {
    let temp = TempDir::new().unwrap();
    let context = run_context(&temp);

    let cli = parse(&["resolve", "--no-save"]);
    let output = context.execute(&cli.command).await.unwrap();
    assert!(output.contains("No resident working directories"));
    assert!(!temp.path().join("state").join("state.json").exists());
}

#[tokio::test]
async fn test_config_command_prints_effective_config() {
    let temp = TempDir::new().unwrap();
    let context = run_context(&temp);
    assert_eq!(context.config().cache.max_entries, 50);

    let output = context.execute(&parse(&["config"]).command).await.unwrap();
    assert!(output.contains("max_entries = 50"));
}
