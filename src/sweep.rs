//! Renderer sweep: one map figure per (DPI, background resolution), plus per-DPI
//! animations of the resulting frames.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    config::{Pipeline, SweepConfig},
    encode::{
        ffmpeg::images_to_webp,
        png::{optimise_png, save_png},
    },
    foundation::core::FigureSize,
    foundation::error::MapsweepResult,
    geojson::{LonLatLine, extract_lines, find_fixtures, load_geojson},
    map::{
        background::{RegridShape, background_path, load_background},
        figure::{FigureParams, render_map_figure},
    },
    naming,
    text::Labeller,
};

/// Outcome of one `sweep` run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rendered: Vec<PathBuf>,
    pub animated: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// One directory of frames: a DPI, and for the new pipeline a safety factor.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Cell {
    dpi: u32,
    sf: Option<f64>,
    regrid: RegridShape,
}

fn cells(cfg: &SweepConfig, pipeline: Pipeline) -> Vec<Cell> {
    let mut out = Vec::new();
    for &dpi in &cfg.dpis {
        match pipeline {
            Pipeline::Old => out.push(Cell {
                dpi,
                sf: None,
                regrid: RegridShape::Square(cfg.old_regrid_shape),
            }),
            Pipeline::New => {
                for &sf in &cfg.safety_factors {
                    out.push(Cell {
                        dpi,
                        sf: Some(sf),
                        regrid: RegridShape::for_safety_factor(
                            sf,
                            cfg.figure_width_in,
                            cfg.figure_height_in,
                            dpi,
                        ),
                    });
                }
            }
        }
    }
    out
}

pub fn suptitle(cfg: &SweepConfig, dpi: u32, resolution: &str) -> String {
    format!(
        "{:.1} inches × {:.1} inches at {dpi} DPI with \"{resolution}\" background image",
        cfg.figure_width_in, cfg.figure_height_in
    )
}

pub fn axes_title(pipeline: Pipeline, regrid: RegridShape) -> String {
    format!(
        "interpolation = \"{}\"; regrid_shape = {}; resample = False",
        pipeline.interpolation().as_str(),
        regrid.label()
    )
}

/// Every great-circle line from the configured fixtures, in file-name order.
#[tracing::instrument(skip(cfg))]
pub fn load_reference_lines(cfg: &SweepConfig, root: &Path) -> MapsweepResult<Vec<LonLatLine>> {
    let dir = root.join(&cfg.fixtures_dir);
    let files = find_fixtures(&dir, &cfg.fixture_prefix, &cfg.fixture_suffix)?;
    if files.is_empty() {
        tracing::warn!(
            "no \"{}?{}\" fixtures in \"{}\"; maps will have no great circles",
            cfg.fixture_prefix,
            cfg.fixture_suffix,
            dir.display()
        );
    }
    let mut lines = Vec::new();
    for file in &files {
        lines.extend(extract_lines(&load_geojson(file)?)?);
    }
    Ok(lines)
}

/// Render every missing figure of `pipeline`, then build the missing animations.
#[tracing::instrument(skip(cfg, labeller, debug))]
pub fn run_sweep(
    cfg: &SweepConfig,
    pipeline: Pipeline,
    root: &Path,
    labeller: &mut dyn Labeller,
    debug: bool,
) -> MapsweepResult<SweepReport> {
    cfg.validate()?;
    let base = root.join(pipeline.dir_name());
    let mut report = SweepReport::default();
    let mut reference: Option<Vec<LonLatLine>> = None;

    for cell in cells(cfg, pipeline) {
        let size = FigureSize::new(cfg.figure_width_in, cfg.figure_height_in, cell.dpi)?;
        let dir = naming::sweep_dir(&base, cell.dpi, cell.sf);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;

        let mut frames = Vec::with_capacity(cfg.resolutions.len());
        for resolution in &cfg.resolutions {
            let png = naming::frame_png(&dir, resolution);
            frames.push(png.clone());
            if png.exists() {
                tracing::debug!("skipping existing \"{}\"", png.display());
                report.skipped.push(png);
                continue;
            }

            if reference.is_none() {
                reference = Some(load_reference_lines(cfg, root)?);
            }

            tracing::info!("Making \"{}\" ...", png.display());
            let bg = load_background(&background_path(
                &root.join(&cfg.background_dir),
                &cfg.background_name,
                resolution,
            ))?;
            let params = FigureParams {
                size,
                font_pt: cfg.font_size_pt,
                interpolation: pipeline.interpolation(),
                regrid: cell.regrid,
                suptitle: suptitle(cfg, cell.dpi, resolution),
                axes_title: axes_title(pipeline, cell.regrid),
            };
            let figure = render_map_figure(
                &params,
                &bg,
                reference.as_deref().unwrap_or_default(),
                labeller,
            )?;

            tracing::info!("Saving \"{}\" ...", png.display());
            save_png(&png, &figure)?;
            optimise_png(&png, &cfg.optimise, debug)?;
            report.rendered.push(png);
        }

        animate(cfg, &dir, &frames, size.width_px(), debug, &mut report)?;
    }

    Ok(report)
}

fn animate(
    cfg: &SweepConfig,
    dir: &Path,
    frames: &[PathBuf],
    width_px: u32,
    debug: bool,
    report: &mut SweepReport,
) -> MapsweepResult<()> {
    let full = naming::full_size_webp(dir);
    if full.exists() {
        report.skipped.push(full);
    } else {
        tracing::info!("Making \"{}\" ...", full.display());
        images_to_webp(frames, &full, cfg.fps, None, debug)?;
        report.animated.push(full);
    }

    for &max in &cfg.webp_max_sizes {
        if max >= width_px {
            continue;
        }
        let out = naming::max_size_webp(dir, max);
        if out.exists() {
            report.skipped.push(out);
            continue;
        }
        tracing::info!("Making \"{}\" ...", out.display());
        images_to_webp(frames, &out, cfg.fps, Some(max), debug)?;
        report.animated.push(out);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoLabels;

    impl Labeller for NoLabels {
        fn label(
            &mut self,
            _canvas: &mut image::RgbImage,
            _text: &str,
            _size_px: f32,
            _anchor: (i64, i64),
        ) -> MapsweepResult<()> {
            Ok(())
        }
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = PathBuf::from("target").join("sweep_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn small_config() -> SweepConfig {
        let mut cfg = SweepConfig {
            dpis: vec![20],
            resolutions: vec!["large0256px".to_string(), "large0512px".to_string()],
            safety_factors: vec![0.5, 1.0],
            ..SweepConfig::default()
        };
        cfg.optimise.use_optipng = false;
        cfg
    }

    #[test]
    fn titles_follow_the_parameters() {
        let cfg = SweepConfig::default();
        assert_eq!(
            suptitle(&cfg, 75, "large1024px"),
            "12.8 inches × 7.2 inches at 75 DPI with \"large1024px\" background image"
        );
        assert_eq!(
            axes_title(Pipeline::Old, RegridShape::Square(750)),
            "interpolation = \"none\"; regrid_shape = 750; resample = False"
        );
        assert_eq!(
            axes_title(
                Pipeline::New,
                RegridShape::for_safety_factor(1.0, 12.8, 7.2, 75)
            ),
            "interpolation = \"bicubic\"; regrid_shape = (960,540); resample = False"
        );
    }

    #[test]
    fn new_pipeline_has_one_cell_per_safety_factor() {
        let cfg = small_config();
        assert_eq!(cells(&cfg, Pipeline::Old).len(), 1);
        let new = cells(&cfg, Pipeline::New);
        assert_eq!(new.len(), 2);
        assert_eq!(new[0].sf, Some(0.5));
        assert_eq!(new[0].regrid, RegridShape::Explicit { nx: 128, ny: 72 });
    }

    #[test]
    fn existing_outputs_are_left_alone() {
        let root = scratch("existing");
        let cfg = small_config();
        let dir = naming::sweep_dir(&root.join("old"), 20, None);
        std::fs::create_dir_all(&dir).unwrap();
        let mut paths = Vec::new();
        for res in &cfg.resolutions {
            paths.push(naming::frame_png(&dir, res));
        }
        paths.push(naming::full_size_webp(&dir));
        for p in &paths {
            std::fs::write(p, b"placeholder").unwrap();
        }
        let before: Vec<_> = paths
            .iter()
            .map(|p| std::fs::metadata(p).unwrap().modified().unwrap())
            .collect();

        // No fixtures or backgrounds exist, so any attempt to render would fail.
        let report = run_sweep(&cfg, Pipeline::Old, &root, &mut NoLabels, false).unwrap();
        assert!(report.rendered.is_empty());
        assert!(report.animated.is_empty());
        assert_eq!(report.skipped, paths);

        let after: Vec<_> = paths
            .iter()
            .map(|p| std::fs::metadata(p).unwrap().modified().unwrap())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn missing_frames_are_rendered() {
        let root = scratch("render");
        let cfg = small_config();

        let bg_dir = root.join("backgrounds").join("natural-earth-1");
        std::fs::create_dir_all(&bg_dir).unwrap();
        for (res, shade) in [("large0256px", 40u8), ("large0512px", 200)] {
            image::RgbImage::from_pixel(16, 8, image::Rgb([0, shade, 0]))
                .save(bg_dir.join(format!("{res}.png")))
                .unwrap();
        }
        let fixtures = root.join("fixtures").join("greatCircle");
        std::fs::create_dir_all(&fixtures).unwrap();
        std::fs::write(
            fixtures.join("greatCircle1_4.geojson"),
            r#"{ "type": "LineString", "coordinates": [[-150, 0], [150, 0]] }"#,
        )
        .unwrap();

        // The animation is pre-seeded so the test does not depend on ffmpeg.
        let dir = naming::sweep_dir(&root.join("new"), 20, Some(1.0));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(naming::full_size_webp(&dir), b"placeholder").unwrap();
        let mut cfg = cfg;
        cfg.safety_factors = vec![1.0];

        let report = run_sweep(&cfg, Pipeline::New, &root, &mut NoLabels, false).unwrap();
        assert_eq!(report.rendered.len(), 2);
        assert!(report.animated.is_empty());

        let frame = image::open(&report.rendered[0]).unwrap().to_rgb8();
        assert_eq!(frame.dimensions(), (256, 144));
        assert_eq!(frame.get_pixel(0, 0).0, [255, 255, 255]);
        assert!(frame.pixels().any(|p| p.0 == [0, 40, 0]));
    }
}
