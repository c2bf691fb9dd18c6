use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pph_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pph"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/pph.sqlite"

[collector]
subreddits = ["SaaS"]
request_delay_ms = 0

[classifier]
batch_size = 5
delay_ms = 0

[server]
bind = "127.0.0.1:7332"
"#,
        root.display()
    );

    let config_path = config_dir.join("pph.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pph(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pph_binary();
    let workdir = config_path
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."));

    let output = Command::new(&binary)
        .current_dir(workdir)
        .env_remove("REDDIT_CLIENT_ID")
        .env_remove("REDDIT_CLIENT_SECRET")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("SUBREDDITS")
        .env_remove("DATABASE_PATH")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pph binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pph(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully"));
    assert!(tmp.path().join("data/pph.sqlite").exists());

    // Idempotent
    let (_, stderr, success) = run_pph(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_demo_then_stats() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pph(&config_path, &["demo"]);
    assert!(success, "demo failed: {}", stderr);
    assert!(stdout.contains("6 sample pain points loaded"));

    let (stdout, _, _) = run_pph(&config_path, &["demo"]);
    assert!(stdout.contains("0 sample pain points loaded"));

    let (stdout, stderr, success) = run_pph(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Items:       6"));
    assert!(stdout.contains("Top score:   88"));
    assert!(stdout.contains("Developer Tools"));
}

#[test]
fn test_export_csv_and_json() {
    let (tmp, config_path) = setup_test_env();
    run_pph(&config_path, &["demo"]);

    let out = tmp.path().join("out/pain_points.csv");
    let (_, stderr, success) = run_pph(
        &config_path,
        &["export", "--format", "csv", "--output", out.to_str().unwrap()],
    );
    assert!(success, "csv export failed: {}", stderr);
    let csv = fs::read_to_string(&out).unwrap();
    assert!(csv.starts_with("id,external_id,kind,subreddit"));
    assert!(csv.contains("t3_demo_002"));
    assert_eq!(csv.trim_end().split("\r\n").count(), 7);

    let (stdout, stderr, success) = run_pph(&config_path, &["export"]);
    assert!(success, "json export failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["count"], 6);
    // Best opportunity first
    assert_eq!(json["items"][0]["external_id"], "t3_demo_002");
}

#[test]
fn test_trending_and_get() {
    let (_tmp, config_path) = setup_test_env();
    run_pph(&config_path, &["demo"]);

    let (stdout, stderr, success) = run_pph(&config_path, &["trending", "--limit", "3"]);
    assert!(success, "trending failed: {}", stderr);
    assert!(stdout.starts_with("1. "));
    assert!(!stdout.contains("\n4. "));

    let (_, stderr, success) = run_pph(&config_path, &["get", "no-such-id"]);
    assert!(!success);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_classify_with_nothing_pending_needs_no_key() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pph(&config_path, &["classify"]);
    assert!(success, "classify failed: {}", stderr);
    assert!(stdout.contains("analyzed: 0"));
}

#[test]
fn test_collect_without_credentials_fails_fast() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_pph(&config_path, &["collect"]);
    assert!(!success);
    assert!(stderr.contains("REDDIT_CLIENT_ID"));
}

#[test]
fn test_runs_empty() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pph(&config_path, &["runs"]);
    assert!(success, "runs failed: {}", stderr);
    assert!(stdout.contains("No collection runs yet."));
}

#[test]
fn test_invalid_config_is_fatal() {
    let (tmp, config_path) = setup_test_env();
    fs::write(&config_path, "[classifier]\nprovider = \"llama\"\n").unwrap();

    let (_, stderr, success) = run_pph(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Unknown classifier provider"));
    drop(tmp);
}
