use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::foundation::error::{MapsweepError, MapsweepResult};

/// Which rendering pipeline produced (or should produce) a map figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    /// Fixed `regrid_shape`, nearest-neighbour drawing.
    Old,
    /// DPI-derived `regrid_shape` scaled by a safety factor, bicubic drawing.
    New,
}

impl Pipeline {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }

    pub fn interpolation(self) -> Interpolation {
        match self {
            Self::Old => Interpolation::None,
            Self::New => Interpolation::Bicubic,
        }
    }
}

/// Filter used when drawing the regridded background into the map box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    None,
    Bicubic,
}

impl Interpolation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bicubic => "bicubic",
        }
    }

    pub fn filter(self) -> image::imageops::FilterType {
        match self {
            Self::None => image::imageops::FilterType::Nearest,
            Self::Bicubic => image::imageops::FilterType::CatmullRom,
        }
    }
}

/// Lossless PNG re-optimisation settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimiseOptions {
    /// Run `optipng` after the in-process re-encode when it is on PATH.
    pub use_optipng: bool,
    /// Seconds before an external optimiser is killed.
    pub timeout_s: f64,
}

impl Default for OptimiseOptions {
    fn default() -> Self {
        Self {
            use_optipng: true,
            timeout_s: 3600.0,
        }
    }
}

impl OptimiseOptions {
    pub fn validate(&self) -> MapsweepResult<()> {
        if !self.timeout_s.is_finite() || self.timeout_s <= 0.0 {
            return Err(MapsweepError::validation(
                "optimise timeout_s must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Font selection shared by both subcommands.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontConfig {
    pub family: String,
    /// Explicit font file; takes precedence over the system lookup.
    pub path: Option<PathBuf>,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "DejaVu Sans".to_string(),
            path: None,
        }
    }
}

pub fn default_dpis() -> Vec<u32> {
    vec![75, 150, 300, 600]
}

pub fn default_resolutions() -> Vec<String> {
    [
        "large0256px",
        "large0512px",
        "large1024px",
        "large2048px",
        "large4096px",
        "large8192px",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_safety_factors() -> Vec<f64> {
    vec![0.25, 0.5, 1.0, 2.0, 4.0]
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub dpis: Vec<u32>,
    pub resolutions: Vec<String>,
    /// Only used by [`Pipeline::New`].
    pub safety_factors: Vec<f64>,
    pub figure_width_in: f64,
    pub figure_height_in: f64,
    pub font_size_pt: f64,
    pub font: FontConfig,
    /// `regrid_shape` of the old pipeline (shorter side of the grid).
    pub old_regrid_shape: u32,
    /// Directory holding `<background_name>/<resolution>.png`.
    pub background_dir: PathBuf,
    pub background_name: String,
    pub fixtures_dir: PathBuf,
    pub fixture_prefix: String,
    pub fixture_suffix: String,
    pub fps: u32,
    pub webp_max_sizes: Vec<u32>,
    pub optimise: OptimiseOptions,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            dpis: default_dpis(),
            resolutions: default_resolutions(),
            safety_factors: default_safety_factors(),
            figure_width_in: 12.8,
            figure_height_in: 7.2,
            font_size_pt: 8.0,
            font: FontConfig::default(),
            old_regrid_shape: 750,
            background_dir: PathBuf::from("backgrounds"),
            background_name: "natural-earth-1".to_string(),
            fixtures_dir: PathBuf::from("fixtures").join("greatCircle"),
            fixture_prefix: "greatCircle".to_string(),
            fixture_suffix: "_4.geojson".to_string(),
            fps: 1,
            webp_max_sizes: vec![256, 512, 1024, 2048, 4096, 8192],
            optimise: OptimiseOptions::default(),
        }
    }
}

impl SweepConfig {
    pub fn from_path(path: &Path) -> MapsweepResult<Self> {
        read_json(path)
    }

    pub fn validate(&self) -> MapsweepResult<()> {
        validate_sweep_axes(&self.dpis, &self.resolutions, &self.safety_factors)?;
        if !self.figure_width_in.is_finite()
            || !self.figure_height_in.is_finite()
            || self.figure_width_in <= 0.0
            || self.figure_height_in <= 0.0
        {
            return Err(MapsweepError::validation(
                "figure width/height must be finite and > 0",
            ));
        }
        if !self.font_size_pt.is_finite() || self.font_size_pt <= 0.0 {
            return Err(MapsweepError::validation(
                "font_size_pt must be finite and > 0",
            ));
        }
        if self.old_regrid_shape == 0 {
            return Err(MapsweepError::validation(
                "old_regrid_shape must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(MapsweepError::validation("fps must be non-zero"));
        }
        if self.webp_max_sizes.contains(&0) {
            return Err(MapsweepError::validation(
                "webp_max_sizes must be non-zero",
            ));
        }
        self.optimise.validate()
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareConfig {
    pub padding: u32,
    pub snippet: u32,
    pub snippet_scale: u32,
    pub title: u32,
    pub dpis: Vec<u32>,
    pub safety_factors: Vec<f64>,
    pub resolutions: Vec<String>,
    pub figure_width_in: f64,
    pub figure_height_in: f64,
    /// Regrid shape printed in the old column's labels.
    pub old_regrid_shape: u32,
    pub old_dir: PathBuf,
    pub new_dir: PathBuf,
    pub out_dir: PathBuf,
    pub shade_rgb: [u8; 3],
    pub font: FontConfig,
    pub optimise: OptimiseOptions,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            padding: 32,
            snippet: 256,
            snippet_scale: 4,
            title: 128,
            dpis: default_dpis(),
            safety_factors: default_safety_factors(),
            resolutions: default_resolutions(),
            figure_width_in: 12.8,
            figure_height_in: 7.2,
            old_regrid_shape: 750,
            old_dir: PathBuf::from("old"),
            new_dir: PathBuf::from("new"),
            out_dir: PathBuf::from("old-vs-new (columns)"),
            shade_rgb: [223, 223, 223],
            font: FontConfig::default(),
            optimise: OptimiseOptions::default(),
        }
    }
}

impl CompareConfig {
    pub fn from_path(path: &Path) -> MapsweepResult<Self> {
        read_json(path)
    }

    pub fn validate(&self) -> MapsweepResult<()> {
        validate_sweep_axes(&self.dpis, &self.resolutions, &self.safety_factors)?;
        if self.snippet == 0 || self.snippet_scale == 0 || self.title == 0 {
            return Err(MapsweepError::validation(
                "snippet, snippet_scale and title must be non-zero",
            ));
        }
        if !self.snippet.is_multiple_of(2) {
            return Err(MapsweepError::validation("snippet must be even"));
        }
        if self.title < 4 {
            return Err(MapsweepError::validation(
                "title band must be at least 4 px (labels use title/4 px)",
            ));
        }
        self.optimise.validate()
    }
}

fn validate_sweep_axes(
    dpis: &[u32],
    resolutions: &[String],
    safety_factors: &[f64],
) -> MapsweepResult<()> {
    if dpis.is_empty() || dpis.contains(&0) {
        return Err(MapsweepError::validation(
            "dpis must be non-empty and non-zero",
        ));
    }
    if resolutions.is_empty() || resolutions.iter().any(|r| r.trim().is_empty()) {
        return Err(MapsweepError::validation(
            "resolutions must be non-empty names",
        ));
    }
    if safety_factors.is_empty()
        || safety_factors
            .iter()
            .any(|sf| !sf.is_finite() || *sf <= 0.0)
    {
        return Err(MapsweepError::validation(
            "safety_factors must be non-empty, finite and > 0",
        ));
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> MapsweepResult<T> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| MapsweepError::serde(format!("parse config '{}': {e}", path.display())))
}
