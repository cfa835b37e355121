use std::path::{Path, PathBuf};

use mapsweep::{
    CanvasLayout, Column, CompareConfig, Labeller, MapsweepResult, comparison_png, frame_png,
    run_compare, sweep_dir,
};

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

const OLD_RGB: [u8; 3] = [200, 30, 30];
const NEW_RGB: [u8; 3] = [30, 30, 200];

fn scratch(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("compose_grid").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_config() -> CompareConfig {
    let mut cfg = CompareConfig {
        padding: 4,
        snippet: 8,
        snippet_scale: 2,
        title: 8,
        dpis: vec![75],
        safety_factors: vec![1.0],
        resolutions: vec!["large0256px".to_string(), "large0512px".to_string()],
        ..CompareConfig::default()
    };
    cfg.optimise.use_optipng = false;
    cfg
}

fn write_solid(path: &Path, rgb: [u8; 3]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(32, 18, image::Rgb(rgb))
        .save(path)
        .unwrap();
}

fn seed_inputs(root: &Path, cfg: &CompareConfig) {
    for res in &cfg.resolutions {
        write_solid(
            &frame_png(&sweep_dir(&root.join("old"), 75, None), res),
            OLD_RGB,
        );
        write_solid(
            &frame_png(&sweep_dir(&root.join("new"), 75, Some(1.0)), res),
            NEW_RGB,
        );
    }
}

#[test]
fn snippets_land_in_their_bands() {
    let root = scratch("bands");
    let cfg = small_config();
    seed_inputs(&root, &cfg);

    let report = run_compare(&cfg, &root, &mut NoLabels, false).unwrap();
    let out = comparison_png(&root.join(&cfg.out_dir), 75, 1.0);
    assert_eq!(report.written, vec![out.clone()]);
    assert!(out.ends_with("old-vs-new (columns)/dpi=75/sf=1.00.png"));

    let layout = CanvasLayout::from_config(&cfg).unwrap();
    let canvas = image::open(&out).unwrap().to_rgb8();
    assert_eq!(canvas.dimensions(), (layout.width(), layout.height()));

    for tier in 0..2 {
        for (column, rgb) in [(Column::Old, OLD_RGB), (Column::New, NEW_RGB)] {
            let band = layout.band(tier, column).unwrap();
            let s = band.snippet;
            for (x, y) in [(s.left, s.upper), (s.right - 1, s.lower - 1)] {
                assert_eq!(canvas.get_pixel(x as u32, y as u32).0, rgb);
            }
            // The shade shows around the snippet.
            let sh = band.shade;
            assert_eq!(
                canvas.get_pixel(sh.left as u32, (sh.lower - 1) as u32).0,
                cfg.shade_rgb
            );
        }
    }
    // Above every band the canvas stays white.
    assert_eq!(canvas.get_pixel(0, 0).0, [255, 255, 255]);
}

fn old_gradient(x: u32, y: u32) -> [u8; 3] {
    [(x * 6) as u8, (y * 10) as u8, 17]
}

fn new_gradient(x: u32, y: u32) -> [u8; 3] {
    [29, (y * 10) as u8, (x * 6) as u8]
}

#[test]
fn snippets_are_centre_crops_upscaled_pixel_for_pixel() {
    let root = scratch("gradient");
    let cfg = small_config();
    // Odd sizes so the centre is not symmetric.
    let (w, h) = (41u32, 23u32);
    for res in &cfg.resolutions {
        for (path, f) in [
            (
                frame_png(&sweep_dir(&root.join("old"), 75, None), res),
                old_gradient as fn(u32, u32) -> [u8; 3],
            ),
            (
                frame_png(&sweep_dir(&root.join("new"), 75, Some(1.0)), res),
                new_gradient,
            ),
        ] {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            image::RgbImage::from_fn(w, h, |x, y| image::Rgb(f(x, y)))
                .save(&path)
                .unwrap();
        }
    }

    let report = run_compare(&cfg, &root, &mut NoLabels, false).unwrap();
    let canvas = image::open(&report.written[0]).unwrap().to_rgb8();
    let layout = CanvasLayout::from_config(&cfg).unwrap();

    let (s, scale) = (cfg.snippet, cfg.snippet_scale);
    let (x0, y0) = (w / 2 - s / 2, h / 2 - s / 2);
    for tier in 0..2 {
        for (column, f) in [
            (Column::Old, old_gradient as fn(u32, u32) -> [u8; 3]),
            (Column::New, new_gradient),
        ] {
            let band = layout.band(tier, column).unwrap().snippet;
            assert_eq!(band.width(), i64::from(s * scale));
            for y in 0..s * scale {
                for x in 0..s * scale {
                    let got = canvas
                        .get_pixel(band.left as u32 + x, band.upper as u32 + y)
                        .0;
                    let want = f(x0 + x / scale, y0 + y / scale);
                    assert_eq!(got, want, "tier {tier} {column:?} at ({x}, {y})");
                }
            }
        }
    }
}

#[test]
fn second_run_skips_existing_canvas() {
    let root = scratch("skip");
    let cfg = small_config();
    seed_inputs(&root, &cfg);

    let first = run_compare(&cfg, &root, &mut NoLabels, false).unwrap();
    assert_eq!(first.written.len(), 1);
    let out = &first.written[0];
    let before = std::fs::metadata(out).unwrap().modified().unwrap();

    let second = run_compare(&cfg, &root, &mut NoLabels, false).unwrap();
    assert!(second.written.is_empty());
    assert_eq!(second.skipped, first.written);
    assert_eq!(std::fs::metadata(out).unwrap().modified().unwrap(), before);
}

#[test]
fn missing_input_names_the_path() {
    let root = scratch("missing");
    let cfg = small_config();
    seed_inputs(&root, &cfg);
    let gone = frame_png(&sweep_dir(&root.join("new"), 75, Some(1.0)), "large0512px");
    std::fs::remove_file(&gone).unwrap();

    let err = run_compare(&cfg, &root, &mut NoLabels, false).unwrap_err();
    assert!(err.to_string().contains("large0512px"), "{err}");
    assert!(!comparison_png(&root.join(&cfg.out_dir), 75, 1.0).exists());
}

#[test]
fn undersized_inputs_are_rejected() {
    let root = scratch("small");
    let mut cfg = small_config();
    cfg.snippet = 64;
    seed_inputs(&root, &cfg);
    assert!(run_compare(&cfg, &root, &mut NoLabels, false).is_err());
}
