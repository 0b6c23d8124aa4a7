use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PYTHON: &str = r#"import logging

log = logging.getLogger(__name__)


def top_level(x):
    return x * 2


class Greeter:
    def greet(self, name):
        log.info("greeting %s", name)
        return "hello " + name
"#;

#[allow(deprecated)]
fn codeintel(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("codeintel").expect("binary");
    cmd.current_dir(workdir)
        .env("CODEINTEL_EMBEDDING_MODE", "stub")
        .env("CODEINTEL_MODEL_DIR", workdir.join("models"))
        .env_remove("CODEINTEL_RAM_BUDGET_MB")
        .env_remove("CODEINTEL_MODEL_LOAD_TIMEOUT_MS");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect()
}

#[test]
fn process_prints_one_record_per_chunk() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("greeter.py"), PYTHON).unwrap();

    let output = codeintel(temp.path())
        .args(["--quiet", "process", "greeter.py", "--usage"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 4);
    let names: Vec<_> = lines[..3]
        .iter()
        .map(|line| line["qualified_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["top_level", "Greeter", "Greeter.greet"]);
    for line in &lines[..3] {
        assert_eq!(line["status"], "EMBEDDED");
        assert!(line.get("vector").is_none());
        assert!(line["metadata"]["signature"].is_string());
    }

    let usage = &lines[3]["usage"];
    assert_eq!(usage["resident_mb"], 400);
    assert_eq!(usage["threshold_mb"], 1024);
}

#[test]
fn vectors_and_language_override() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("snippet"), "def f():\n    return 1\n").unwrap();

    let output = codeintel(temp.path())
        .args(["-q", "process", "snippet", "--language", "python", "--with-vectors"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let lines = json_lines(&output.stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["language"], "python");
    assert_eq!(lines[0]["vector"].as_array().unwrap().len(), 768);
}

#[test]
fn directories_are_scanned() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("project").join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("lib.rs"), "pub fn one() -> u8 { 1 }\n").unwrap();
    fs::write(temp.path().join("project").join("README.md"), "# Project\n").unwrap();

    let output = codeintel(temp.path())
        .args(["-q", "process", "project"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let files: Vec<_> = json_lines(&output.stdout)
        .iter()
        .map(|line| line["file_id"].as_str().unwrap().to_string())
        .collect();
    assert!(files.contains(&"src/lib.rs".to_string()), "{files:?}");
    assert!(files.contains(&"README.md".to_string()), "{files:?}");
}

#[test]
fn unknown_language_tag_is_an_error() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.txt"), "hello\n").unwrap();

    codeintel(temp.path())
        .args(["-q", "process", "a.txt", "--language", "cobol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown language"));
}

#[test]
fn check_config_prints_effective_toml() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("codeintel.toml"), "[embeddings]\nram_budget_mb = 2048\n").unwrap();

    codeintel(temp.path())
        .args(["check-config", "--config", "codeintel.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ram_budget_mb = 2048"))
        .stdout(predicate::str::contains("[embeddings.code]"));
}

#[test]
fn check_config_rejects_mismatched_dimensions() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("codeintel.toml"),
        "[embeddings.code]\nmodel_id = \"codebert-base\"\ndimension = 512\nestimated_mb = 450\n",
    )
    .unwrap();

    codeintel(temp.path())
        .args(["check-config", "--config", "codeintel.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dimensions differ"));
}

#[test]
fn check_config_compares_against_the_manifest() {
    let temp = tempdir().unwrap();
    let models = temp.path().join("models");
    fs::create_dir_all(&models).unwrap();
    fs::write(
        models.join("manifest.json"),
        r#"{
  "schema_version": 1,
  "models": [
    { "id": "bge-base-en-v1.5", "dimension": 1024, "max_length": 512, "max_batch": 32, "assets": [] }
  ]
}"#,
    )
    .unwrap();

    codeintel(temp.path())
        .args(["check-config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("the manifest declares 1024"));
}
