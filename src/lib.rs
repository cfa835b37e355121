//! mapsweep renders a parameter sweep of global map figures and composes old-vs-new
//! comparison grids from the results.
//!
//! # Pipeline overview
//!
//! 1. **Sweep**: for each DPI (and, for the new pipeline, safety factor) and background
//!    resolution, render one map figure to `<pipeline>/dpi=N[/sf=X.XX]/res=R.png`
//! 2. **Animate**: stream each directory's frames through the system `ffmpeg` binary into
//!    `fullSize.webp` and downscaled `NNNNpx.webp` variants
//! 3. **Compare**: crop centre snippets from both pipelines, upscale them and lay them out
//!    in two labelled columns, one row per resolution
//!
//! The filesystem is the only state: an output that already exists is never redone.
#![forbid(unsafe_code)]

mod compose;
mod config;
mod encode;
mod foundation;
mod geojson;
mod map;
mod naming;
mod sweep;
mod text;

pub use compose::{
    Band, CanvasLayout, Column, CompareReport, column_label, compose_comparison, fill_rect,
    load_snippet, new_input, old_input, run_compare, title_text,
};
pub use config::{
    CompareConfig, FontConfig, Interpolation, OptimiseOptions, Pipeline, SweepConfig,
    default_dpis, default_resolutions, default_safety_factors,
};
pub use encode::ffmpeg::{WebpConfig, WebpEncoder, fit_within, images_to_webp, is_ffmpeg_on_path};
pub use encode::png::{OptimiseOutcome, optimise_png, save_png};
pub use encode::{ensure_parent_dir, tool_on_path};
pub use foundation::core::{FigureSize, PixelRect, Point, Rect};
pub use foundation::error::{MapsweepError, MapsweepResult};
pub use geojson::{
    GeoJson, LonLatLine, Position, extract_lines, find_fixtures, load_geojson, parse_geojson,
    split_antimeridian,
};
pub use map::background::{RegridShape, background_path, load_background, render_background};
pub use map::figure::{FigureLayout, FigureParams, render_map_figure, render_map_layers};
pub use naming::{
    comparison_png, dpi_dir, frame_png, full_size_webp, max_size_webp, sf_label, sweep_dir,
};
pub use sweep::{SweepReport, axes_title, load_reference_lines, run_sweep, suptitle};
pub use text::{
    Labeller, LoadedFont, PlacedGlyph, TextBlock, TextBrushRgba8, TextLayoutEngine,
    blend_premul_onto_rgb, engine_for, resolve_font,
};
