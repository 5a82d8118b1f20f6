use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn localsql(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_localsql"))
        .args(args)
        .output()
        .expect("failed to run localsql")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

/// Writes a JSON spec for `person` at `version` with the given extra fields.
fn write_person_spec(dir: &TempDir, file: &str, version: &str, extra: &[&str]) -> PathBuf {
    let mut add = vec![
        serde_json::json!({"name": "id", "type": "Counter", "primary": true}),
        serde_json::json!({"name": "name", "type": "Text", "size": 120}),
    ];
    for field in extra {
        add.push(serde_json::json!({"name": field, "type": "Integer"}));
    }
    let spec = serde_json::json!({
        "appliesTo": "person",
        "version": version,
        "add": add,
        "indexes": [{"name": "idx_person_name", "columns": ["name"]}]
    });
    let path = dir.path().join(file);
    fs::write(&path, serde_json::to_string_pretty(&spec).unwrap()).expect("failed to write spec");
    path
}

// ---------------------------------------------------------------------------
// migrate
// ---------------------------------------------------------------------------

#[test]
fn migrate_creates_then_skips_applied_version() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let spec = write_person_spec(&dir, "person.json", "1.0", &[]);

    let first = localsql(&["migrate", "--db", path_str(&db), path_str(&spec)]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert_eq!(String::from_utf8_lossy(&first.stdout).trim(), "person: created");

    let second = localsql(&["migrate", "--db", path_str(&db), path_str(&spec)]);
    assert!(second.status.success());
    assert_eq!(String::from_utf8_lossy(&second.stdout).trim(), "person: already applied");
}

#[test]
fn migrate_reads_yaml_spec_lists_and_reports_json() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let yaml = r#"
- appliesTo: tag
  version: "1.0"
  add:
    - name: id
      type: Counter
      primary: true
    - name: label
      type: Text
      size: 40
- appliesTo: tag
  version: "1.1"
  add:
    - name: id
      type: Counter
      primary: true
    - name: label
      type: Text
      size: 40
    - name: color
      type: Text
"#;
    let spec = dir.path().join("tags.yaml");
    fs::write(&spec, yaml).unwrap();

    let output = localsql(&["migrate", "--db", path_str(&db), "--format", "json", path_str(&spec)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["outcome"], "Created");
    assert_eq!(reports[1]["outcome"], "Altered");
    assert_eq!(reports[1]["rebuilt"], serde_json::Value::Null);
}

#[test]
fn migrate_rejects_invalid_spec() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let spec = dir.path().join("empty.json");
    fs::write(&spec, r#"{"appliesTo": "person", "version": "1.0", "add": []}"#).unwrap();

    let output = localsql(&["migrate", "--db", path_str(&db), path_str(&spec)]);
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: "));
}

// ---------------------------------------------------------------------------
// status and identity
// ---------------------------------------------------------------------------

#[test]
fn status_reports_version_and_columns() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let v1 = write_person_spec(&dir, "v1.json", "1.0", &[]);
    let v2 = write_person_spec(&dir, "v2.json", "1.1", &["age"]);
    let output = localsql(&["migrate", "--db", path_str(&db), path_str(&v1), path_str(&v2)]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = localsql(&[
        "status", "--db", path_str(&db), "--table", "person", "--format", "json",
    ]);
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["exists"], true);
    assert_eq!(status["version"], "1.1");
    let names: Vec<&str> = status["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["id", "name", "age"]);
    let history: Vec<&str> = status["migrations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["version"].as_str().unwrap())
        .collect();
    assert_eq!(history, vec!["1.0", "1.1"]);
    assert_eq!(status["migrations"][0]["appliesTo"], "person");

    let output = localsql(&["status", "--db", path_str(&db), "--table", "person"]);
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("  Migrations:\n    1.0\n    1.1"), "{text}");
}

#[test]
fn status_of_missing_table() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let output = localsql(&["status", "--db", path_str(&db), "--table", "ghost"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Exists: no"));
}

#[test]
fn identity_allocates_sequential_values() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let spec = write_person_spec(&dir, "person.json", "1.0", &[]);
    assert!(localsql(&["migrate", "--db", path_str(&db), path_str(&spec)]).status.success());

    let values: Vec<String> = (0..3)
        .map(|_| {
            let output = localsql(&[
                "identity", "--db", path_str(&db), "--entity", "person", "--attribute", "id",
            ]);
            assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        })
        .collect();
    assert_eq!(values, vec!["1", "2", "3"]);
}

#[test]
fn config_file_sets_adapter_options() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("app.db");
    let config = dir.path().join("localsql.yaml");
    fs::write(&config, "name: configured\nretry: 2\nretry_interval_ms: 10\n").unwrap();
    let spec = write_person_spec(&dir, "person.json", "1.0", &[]);

    let output = localsql(&[
        "--config",
        path_str(&config),
        "migrate",
        "--db",
        path_str(&db),
        path_str(&spec),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let missing = dir.path().join("missing.yaml");
    let output = localsql(&["--config", path_str(&missing), "status", "--db", path_str(&db), "--table", "person"]);
    assert_eq!(output.status.code(), Some(1));
}
