use std::path::PathBuf;

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_mapsweep")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "mapsweep.exe"
            } else {
                "mapsweep"
            });
            p
        })
}

#[test]
fn cli_help_lists_both_subcommands() {
    let output = std::process::Command::new(exe())
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sweep"));
    assert!(stdout.contains("compare"));
}

#[test]
fn cli_rejects_unknown_pipeline() {
    let status = std::process::Command::new(exe())
        .args(["sweep", "--pipeline", "middle"])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn cli_reports_bad_config() {
    let dir = PathBuf::from("target").join("cli_smoke");
    std::fs::create_dir_all(&dir).unwrap();
    let cfg_path = dir.join("bad.json");
    std::fs::write(&cfg_path, r#"{ "padding": 4, "no_such_key": true }"#).unwrap();

    let output = std::process::Command::new(exe())
        .arg("compare")
        .arg("--root")
        .arg(&dir)
        .arg("--config")
        .arg(&cfg_path)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no_such_key"), "{stderr}");
}
