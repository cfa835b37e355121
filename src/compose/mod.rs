//! Old-vs-new comparison grids: centre snippets of both pipelines' renders, upscaled and
//! stacked in two columns, one row per background resolution.

pub mod layout;

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    config::CompareConfig,
    encode::png::{optimise_png, save_png},
    foundation::core::PixelRect,
    foundation::error::{MapsweepError, MapsweepResult},
    map::background::RegridShape,
    naming,
    text::Labeller,
};

pub use layout::{Band, CanvasLayout, Column};

/// Outcome of one `compare` run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompareReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Input PNG of the old pipeline for one tier.
pub fn old_input(root: &Path, cfg: &CompareConfig, dpi: u32, resolution: &str) -> PathBuf {
    naming::frame_png(&naming::sweep_dir(&root.join(&cfg.old_dir), dpi, None), resolution)
}

/// Input PNG of the new pipeline for one tier.
pub fn new_input(
    root: &Path,
    cfg: &CompareConfig,
    dpi: u32,
    sf: f64,
    resolution: &str,
) -> PathBuf {
    naming::frame_png(
        &naming::sweep_dir(&root.join(&cfg.new_dir), dpi, Some(sf)),
        resolution,
    )
}

pub fn title_text(cfg: &CompareConfig, dpi: u32) -> String {
    format!(
        "{:.1} inches × {:.1} inches at {dpi} DPI\nresample = False",
        cfg.figure_width_in, cfg.figure_height_in
    )
}

pub fn column_label(
    cfg: &CompareConfig,
    column: Column,
    dpi: u32,
    sf: f64,
    resolution: &str,
) -> String {
    match column {
        Column::Old => format!(
            "interpolation = \"none\"\nregrid_shape = {}\nresolution = \"{resolution}\"",
            cfg.old_regrid_shape
        ),
        Column::New => {
            let (nx, ny) =
                RegridShape::for_safety_factor(sf, cfg.figure_width_in, cfg.figure_height_in, dpi)
                    .dims_for_extent(2.0);
            format!(
                "interpolation = \"bicubic\"\nregrid_shape = ({nx},{ny})\nresolution = \"{resolution}\""
            )
        }
    }
}

/// Load `path`, cut the centred snippet and upscale it with nearest-neighbour sampling.
#[tracing::instrument(skip(layout))]
pub fn load_snippet(path: &Path, layout: &CanvasLayout) -> MapsweepResult<image::RgbImage> {
    tracing::info!("  Loading \"{}\" ...", path.display());
    let img = image::open(path)
        .with_context(|| format!("open rendered map '{}'", path.display()))?
        .to_rgb8();
    let crop = layout.centre_crop(img.width(), img.height())?;
    Ok(upscale_crop(&img, crop, layout.scaled()))
}

fn upscale_crop(img: &image::RgbImage, crop: PixelRect, size: u32) -> image::RgbImage {
    let cut = image::imageops::crop_imm(
        img,
        crop.left as u32,
        crop.upper as u32,
        crop.width() as u32,
        crop.height() as u32,
    )
    .to_image();
    image::imageops::resize(&cut, size, size, image::imageops::FilterType::Nearest)
}

pub fn fill_rect(canvas: &mut image::RgbImage, rect: PixelRect, rgb: [u8; 3]) {
    let r = rect.clamp_to(canvas.width(), canvas.height());
    if r.is_empty() {
        return;
    }
    for y in r.upper..r.lower {
        for x in r.left..r.right {
            canvas.put_pixel(x as u32, y as u32, image::Rgb(rgb));
        }
    }
}

/// Build one comparison canvas in memory. Missing inputs abort with the offending path.
pub fn compose_comparison(
    cfg: &CompareConfig,
    layout: &CanvasLayout,
    labeller: &mut dyn Labeller,
    root: &Path,
    dpi: u32,
    sf: f64,
) -> MapsweepResult<image::RgbImage> {
    let mut canvas =
        image::RgbImage::from_pixel(layout.width(), layout.height(), image::Rgb([255, 255, 255]));

    labeller.label(
        &mut canvas,
        &title_text(cfg, dpi),
        layout.font_px() as f32,
        layout.title_anchor(),
    )?;

    for (tier, resolution) in cfg.resolutions.iter().enumerate() {
        let tier = tier as u32;
        for column in Column::ALL {
            let band = layout.band(tier, column)?;
            fill_rect(&mut canvas, band.shade, cfg.shade_rgb);
            labeller.label(
                &mut canvas,
                &column_label(cfg, column, dpi, sf, resolution),
                layout.font_px() as f32,
                band.label_anchor,
            )?;

            let src = match column {
                Column::Old => old_input(root, cfg, dpi, resolution),
                Column::New => new_input(root, cfg, dpi, sf, resolution),
            };
            if !src.exists() {
                return Err(MapsweepError::validation(format!(
                    "rendered map '{}' does not exist",
                    src.display()
                )));
            }
            let snippet = load_snippet(&src, layout)?;
            image::imageops::replace(&mut canvas, &snippet, band.snippet.left, band.snippet.upper);
        }
    }

    Ok(canvas)
}

/// Compose every (DPI, safety factor) canvas that is not yet on disk.
#[tracing::instrument(skip(cfg, labeller, debug))]
pub fn run_compare(
    cfg: &CompareConfig,
    root: &Path,
    labeller: &mut dyn Labeller,
    debug: bool,
) -> MapsweepResult<CompareReport> {
    cfg.validate()?;
    let layout = CanvasLayout::from_config(cfg)?;
    let out_base = root.join(&cfg.out_dir);
    let mut report = CompareReport::default();

    for &dpi in &cfg.dpis {
        let dir = naming::dpi_dir(&out_base, dpi);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;

        for &sf in &cfg.safety_factors {
            let out = naming::comparison_png(&out_base, dpi, sf);
            if out.exists() {
                tracing::debug!("skipping existing \"{}\"", out.display());
                report.skipped.push(out);
                continue;
            }

            tracing::info!("Making \"{}\" ...", out.display());
            let canvas = compose_comparison(cfg, &layout, labeller, root, dpi, sf)?;

            tracing::info!("Saving \"{}\" ...", out.display());
            save_png(&out, &canvas)?;
            optimise_png(&out, &cfg.optimise, debug)?;
            report.written.push(out);
        }
    }

    Ok(report)
}
