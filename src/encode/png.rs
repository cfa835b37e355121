use std::{
    io::Cursor,
    path::Path,
    process::{Command, Stdio},
    time::{Duration, Instant},
};

use anyhow::Context as _;
use image::ImageEncoder as _;

use crate::{
    config::OptimiseOptions,
    encode::{ensure_parent_dir, tool_on_path},
    foundation::error::{MapsweepError, MapsweepResult},
};

/// Size of a PNG before and after [`optimise_png`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptimiseOutcome {
    pub before: u64,
    pub after: u64,
}

fn encode_png(
    bytes: &[u8],
    width: u32,
    height: u32,
    color: image::ExtendedColorType,
    compression: image::codecs::png::CompressionType,
) -> MapsweepResult<Vec<u8>> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new_with_quality(
        Cursor::new(&mut out),
        compression,
        image::codecs::png::FilterType::Adaptive,
    )
    .write_image(bytes, width, height, color)?;
    Ok(out)
}

/// Write an RGB canvas as a PNG, creating parent directories.
///
/// Uses default compression; [`optimise_png`] does the expensive pass.
pub fn save_png(path: &Path, img: &image::RgbImage) -> MapsweepResult<()> {
    ensure_parent_dir(path)?;
    let bytes = encode_png(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
        image::codecs::png::CompressionType::Default,
    )?;
    std::fs::write(path, bytes).with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

/// Losslessly shrink a PNG in place.
///
/// The in-process pass re-encodes the pixels with the strongest settings; the file is only
/// replaced when that is smaller. Ancillary chunks are dropped as a side effect. If enabled
/// and installed, `optipng` then gets a go under `opts.timeout_s`.
#[tracing::instrument(skip(opts, debug))]
pub fn optimise_png(
    path: &Path,
    opts: &OptimiseOptions,
    debug: bool,
) -> MapsweepResult<OptimiseOutcome> {
    let before = file_len(path)?;

    let img = image::open(path).with_context(|| format!("decode png '{}'", path.display()))?;
    let bytes = encode_png(
        img.as_bytes(),
        img.width(),
        img.height(),
        img.color().into(),
        image::codecs::png::CompressionType::Best,
    )?;
    if (bytes.len() as u64) < before {
        let tmp = path.with_extension("png.tmp");
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("write temporary png '{}'", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("replace png '{}'", path.display()))?;
    }

    if opts.use_optipng && tool_on_path("optipng", "-version") {
        run_optipng(path, Duration::from_secs_f64(opts.timeout_s), debug)?;
    } else if opts.use_optipng {
        tracing::debug!("optipng not found on PATH; skipping external pass");
    }

    let after = file_len(path)?;
    tracing::debug!(before, after, "optimised \"{}\"", path.display());
    Ok(OptimiseOutcome { before, after })
}

fn file_len(path: &Path) -> MapsweepResult<u64> {
    Ok(std::fs::metadata(path)
        .with_context(|| format!("stat '{}'", path.display()))?
        .len())
}

fn run_optipng(path: &Path, timeout: Duration, debug: bool) -> MapsweepResult<()> {
    let mut cmd = Command::new("optipng");
    cmd.stdin(Stdio::null());
    if debug {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        cmd.arg("-quiet")
            .stdout(Stdio::null())
            .stderr(Stdio::null());
    }
    cmd.args(["-strip", "all", "-o2"]).arg(path);

    let mut child = cmd
        .spawn()
        .map_err(|e| MapsweepError::encode(format!("failed to spawn optipng: {e}")))?;

    let started = Instant::now();
    loop {
        let status = child
            .try_wait()
            .map_err(|e| MapsweepError::encode(format!("failed to poll optipng: {e}")))?;
        if let Some(status) = status {
            if !status.success() {
                return Err(MapsweepError::encode(format!(
                    "optipng exited with status {status} on '{}'",
                    path.display()
                )));
            }
            return Ok(());
        }
        if started.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MapsweepError::encode(format!(
                "optipng timed out after {:.0} s on '{}'",
                timeout.as_secs_f64(),
                path.display()
            )));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
