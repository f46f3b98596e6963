use std::process::Command;

use tempfile::TempDir;

#[test]
fn renders_frames_and_exports_png() {
    let dir = TempDir::new().unwrap();
    let export = dir.path().join("last.png");

    let output = Command::new(env!("CARGO_BIN_EXE_fxpreview"))
        .args(["--frames", "6", "--size", "64x36", "--frame-interval", "1ms", "--json"])
        .arg("--export")
        .arg(&export)
        .output()
        .expect("failed to run fxpreview");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stats: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stats must be valid JSON");
    assert_eq!(stats["submitted"], 6);
    assert!(stats["rendered"].as_u64().expect("rendered count") >= 1);
    assert!(export.exists(), "exported PNG missing");
}

#[test]
fn rejects_malformed_size() {
    let output = Command::new(env!("CARGO_BIN_EXE_fxpreview"))
        .args(["--frames", "1", "--size", "potato"])
        .output()
        .expect("failed to run fxpreview");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("WxH"));
}

#[test]
fn applies_tuning_overrides() {
    let dir = TempDir::new().unwrap();
    let tuning = dir.path().join("tuning.toml");
    std::fs::write(&tuning, "max_pending_frames = 2\ndraw_backoff = \"2ms\"\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_fxpreview"))
        .args(["--frames", "4", "--size", "32x18", "--frame-interval", "1ms", "--json"])
        .arg("--tuning")
        .arg(&tuning)
        .output()
        .expect("failed to run fxpreview");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stats: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stats must be valid JSON");
    assert_eq!(stats["submitted"], 4);
}
