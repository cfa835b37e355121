//! On-disk naming conventions shared by the sweep (writer) and the composer (reader).
//!
//! Every output path is a pure function of its sweep parameters, which is what lets the
//! filesystem double as a completion cache.

use std::path::{Path, PathBuf};

/// Safety factors are always printed with two decimals (`0.25`, `1.00`, `4.00`).
pub fn sf_label(sf: f64) -> String {
    format!("{sf:4.2}")
}

pub fn dpi_dir(base: &Path, dpi: u32) -> PathBuf {
    base.join(format!("dpi={dpi}"))
}

/// Directory that receives one sweep cell's PNGs and animations.
pub fn sweep_dir(base: &Path, dpi: u32, sf: Option<f64>) -> PathBuf {
    let dir = dpi_dir(base, dpi);
    match sf {
        Some(sf) => dir.join(format!("sf={}", sf_label(sf))),
        None => dir,
    }
}

pub fn frame_png(dir: &Path, resolution: &str) -> PathBuf {
    dir.join(format!("res={resolution}.png"))
}

pub fn full_size_webp(dir: &Path) -> PathBuf {
    dir.join("fullSize.webp")
}

pub fn max_size_webp(dir: &Path, max_size: u32) -> PathBuf {
    dir.join(format!("{max_size:04}px.webp"))
}

pub fn comparison_png(base: &Path, dpi: u32, sf: f64) -> PathBuf {
    dpi_dir(base, dpi).join(format!("sf={}.png", sf_label(sf)))
}
