use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    encode::{ensure_parent_dir, tool_on_path},
    foundation::error::{MapsweepError, MapsweepResult},
};

#[derive(Clone, Debug)]
pub struct WebpConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub out_path: PathBuf,
    pub debug: bool,
}

impl WebpConfig {
    pub fn validate(&self) -> MapsweepResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MapsweepError::validation(
                "webp width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(MapsweepError::validation("webp fps must be non-zero"));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg", "-version")
}

/// With `debug`, ffmpeg talks straight to our stderr; otherwise its errors are captured
/// for the failure message.
fn captures_stderr(cfg: &WebpConfig) -> bool {
    !cfg.debug
}

fn ffmpeg_command(cfg: &WebpConfig) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.stdin(Stdio::piped()).stdout(Stdio::null());
    if captures_stderr(cfg) {
        cmd.stderr(Stdio::piped());
    } else {
        cmd.stderr(Stdio::inherit());
    }

    cmd.args([
        "-y",
        "-loglevel",
        if cfg.debug { "info" } else { "error" },
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
        &format!("{}x{}", cfg.width, cfg.height),
        "-r",
        &cfg.fps.to_string(),
        "-i",
        "pipe:0",
        "-an",
        "-c:v",
        "libwebp_anim",
        "-lossless",
        "1",
        "-loop",
        "0",
    ])
    .arg(&cfg.out_path);
    cmd
}

/// Streams raw RGBA frames into `ffmpeg`, which writes a lossless, looping animated WEBP.
pub struct WebpEncoder {
    cfg: WebpConfig,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl WebpEncoder {
    pub fn new(cfg: WebpConfig) -> MapsweepResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !is_ffmpeg_on_path() {
            return Err(MapsweepError::encode(
                "ffmpeg (built with libwebp) is required for WEBP animations, but was not found on PATH; install the \"ffmpeg\" package",
            ));
        }

        let mut cmd = ffmpeg_command(&cfg);

        let mut child = cmd.spawn().map_err(|e| {
            MapsweepError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MapsweepError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            cfg,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &image::RgbaImage) -> MapsweepResult<()> {
        if frame.width() != self.cfg.width || frame.height() != self.cfg.height {
            return Err(MapsweepError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.width,
                self.cfg.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MapsweepError::encode("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(frame.as_raw()).map_err(|e| {
            MapsweepError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        Ok(())
    }

    pub fn finish(mut self) -> MapsweepResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            MapsweepError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if captures_stderr(&self.cfg) {
                stderr.trim()
            } else {
                "see ffmpeg output above"
            };
            return Err(MapsweepError::encode(format!(
                "ffmpeg exited with status {}: {detail}",
                output.status
            )));
        }

        Ok(())
    }
}

/// Largest size that fits `width` x `height` inside a `max` x `max` box without upscaling.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max);
    (w, h)
}

/// Flatten a frame to opaque RGBA8 over `bg_rgb`.
fn flatten_to_opaque_rgba8(img: &image::DynamicImage, bg_rgb: [u8; 3]) -> image::RgbaImage {
    let mut rgba = img.to_rgba8();
    for px in rgba.pixels_mut() {
        let a = u16::from(px.0[3]);
        if a == 255 {
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            px.0[c] = (mul_div255(u16::from(px.0[c]), a) + mul_div255(u16::from(bg_rgb[c]), inv))
                .min(255) as u8;
        }
        px.0[3] = 255;
    }
    rgba
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Assemble `frames` (image files, in order) into an animated WEBP at `fps`.
///
/// With `max_size`, every frame is scaled down (Lanczos3) to fit a `max_size` square.
#[tracing::instrument(skip(frames, debug), fields(frames = frames.len()))]
pub fn images_to_webp(
    frames: &[PathBuf],
    out: &Path,
    fps: u32,
    max_size: Option<u32>,
    debug: bool,
) -> MapsweepResult<()> {
    let Some(first) = frames.first() else {
        return Err(MapsweepError::validation(
            "cannot build an animation from zero frames",
        ));
    };

    let (src_w, src_h) = image::image_dimensions(first)
        .with_context(|| format!("read dimensions of '{}'", first.display()))?;
    let (width, height) = match max_size {
        Some(max) => fit_within(src_w, src_h, max),
        None => (src_w, src_h),
    };

    let mut enc = WebpEncoder::new(WebpConfig {
        width,
        height,
        fps,
        out_path: out.to_path_buf(),
        debug,
    })?;

    for path in frames {
        let img =
            image::open(path).with_context(|| format!("open frame '{}'", path.display()))?;
        if (img.width(), img.height()) != (src_w, src_h) {
            return Err(MapsweepError::validation(format!(
                "frame '{}' is {}x{}, expected {src_w}x{src_h}",
                path.display(),
                img.width(),
                img.height()
            )));
        }
        let img = if (width, height) != (src_w, src_h) {
            img.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
        } else {
            img
        };
        enc.encode_frame(&flatten_to_opaque_rgba8(&img, [255, 255, 255]))?;
    }

    enc.finish()
}
