pub mod ffmpeg;
pub mod png;

use std::path::Path;

use crate::foundation::error::MapsweepResult;

/// Whether `tool` can be spawned (checked with a cheap `check_arg` such as `-version`).
pub fn tool_on_path(tool: &str, check_arg: &str) -> bool {
    std::process::Command::new(tool)
        .arg(check_arg)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> MapsweepResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}
