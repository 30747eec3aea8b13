use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use convlog::store::LogStore;

#[allow(dead_code)]
pub fn create_temp_store() -> (LogStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = LogStore::new(tmp.path().join("logs"));
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Write a hand-made partition file, one line per element
#[allow(dead_code)]
pub fn write_partition(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    fs::create_dir_all(dir).expect("failed to create log dir");
    let path = dir.join(name);
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(&path, body).expect("failed to write partition");
    path
}

#[allow(dead_code)]
pub fn entry_line(timestamp: &str, session_id: &str, role: &str, message: &str) -> String {
    serde_json::json!({
        "timestamp": timestamp,
        "session_id": session_id,
        "user_id": null,
        "role": role,
        "message": message,
        "tokens": message.split_whitespace().count(),
        "latency_ms": null,
        "model": null,
        "metadata": {}
    })
    .to_string()
}
