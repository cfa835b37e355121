use crate::{
    config::Interpolation,
    foundation::core::{FigureSize, PixelRect, Point},
    foundation::error::{MapsweepError, MapsweepResult},
    geojson::{LonLatLine, split_antimeridian},
    map::background::{RegridShape, render_background},
    text::{Labeller, blend_premul_onto_rgb},
};

/// Pixel geometry of one map figure: titles stacked at the top, a 2:1 global map box
/// centred in the space that remains.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FigureLayout {
    pub width: u32,
    pub height: u32,
    pub font_px: f64,
    pub title_px: f64,
    pub pad: f64,
    pub suptitle_anchor: (f64, f64),
    pub axes_title_anchor: (f64, f64),
    pub map_box: PixelRect,
    pub line_width_px: f64,
    pub grid_width_px: f64,
    pub frame_width_px: f64,
}

impl FigureLayout {
    pub fn new(size: FigureSize, font_pt: f64) -> MapsweepResult<Self> {
        size.validate()?;
        if !font_pt.is_finite() || font_pt <= 0.0 {
            return Err(MapsweepError::validation("font size must be finite and > 0"));
        }
        let (width, height) = (size.width_px(), size.height_px());
        let font_px = size.points_to_px(font_pt);
        let title_px = 1.2 * font_px;
        let pad = 1.08 * font_px;

        let sup_baseline = pad + title_px;
        let axes_baseline = sup_baseline + 1.6 * title_px;
        let map_top = (axes_baseline + 0.5 * pad).ceil();

        let avail_w = (f64::from(width) - 2.0 * pad).floor();
        let avail_h = (f64::from(height) - map_top - pad).floor();
        if avail_w < 2.0 || avail_h < 1.0 {
            return Err(MapsweepError::validation(format!(
                "figure {width}x{height} px leaves no room for the map"
            )));
        }
        let box_w = (avail_w.min(2.0 * avail_h) as i64) & !1;
        let box_h = box_w / 2;
        let left = (i64::from(width) - box_w) / 2;
        let top = map_top as i64 + (avail_h as i64 - box_h) / 2;
        let map_box = PixelRect::new(left, top, left + box_w, top + box_h);

        Ok(Self {
            width,
            height,
            font_px,
            title_px,
            pad,
            suptitle_anchor: (f64::from(width) / 2.0, sup_baseline),
            axes_title_anchor: (map_box.center_x() as f64, axes_baseline),
            map_box,
            line_width_px: size.points_to_px(1.0),
            grid_width_px: size.points_to_px(0.5),
            frame_width_px: size.points_to_px(0.8),
        })
    }

    /// Equirectangular projection of `(lon, lat)` degrees into the map box.
    pub fn project(&self, lon: f64, lat: f64) -> Point {
        let b = self.map_box.to_kurbo();
        Point::new(
            b.x0 + (lon + 180.0) / 360.0 * b.width(),
            b.y0 + (90.0 - lat) / 180.0 * b.height(),
        )
    }
}

/// Everything that varies between two figures of the sweep.
#[derive(Clone, Debug, PartialEq)]
pub struct FigureParams {
    pub size: FigureSize,
    pub font_pt: f64,
    pub interpolation: Interpolation,
    pub regrid: RegridShape,
    pub suptitle: String,
    pub axes_title: String,
}

const GRID_LON_STEP: f64 = 45.0;
const GRID_LAT_STEP: f64 = 30.0;
const GRID_RGBA: [u8; 4] = [128, 128, 128, 255];
const FRAME_RGBA: [u8; 4] = [0, 0, 0, 255];
const LINE_RGBA: [u8; 4] = [255, 0, 0, 255];

/// Draw background, gridlines, frame and great-circle lines. Titles are left to
/// [`render_map_figure`].
pub fn render_map_layers(
    layout: &FigureLayout,
    params: &FigureParams,
    background: &image::RgbImage,
    lines: &[LonLatLine],
) -> MapsweepResult<image::RgbImage> {
    let mut canvas =
        image::RgbImage::from_pixel(layout.width, layout.height, image::Rgb([255, 255, 255]));

    let b = layout.map_box;
    let raster = render_background(
        background,
        params.regrid,
        params.interpolation,
        b.width() as u32,
        b.height() as u32,
    )?;
    image::imageops::replace(&mut canvas, &raster, b.left, b.upper);

    draw_overlay(&mut canvas, layout, |ctx| {
        stroke_lines(ctx, &graticule(layout), layout.grid_width_px, GRID_RGBA);

        let mut frame = kurbo::BezPath::new();
        let r = b.to_kurbo();
        frame.move_to((r.x0, r.y0));
        frame.line_to((r.x1, r.y0));
        frame.line_to((r.x1, r.y1));
        frame.line_to((r.x0, r.y1));
        frame.close_path();
        stroke_path(ctx, &frame, layout.frame_width_px, FRAME_RGBA);

        let mut paths = Vec::new();
        for line in lines {
            for part in split_antimeridian(line) {
                paths.push(polyline(layout, &part));
            }
        }
        stroke_lines(ctx, &paths, layout.line_width_px, LINE_RGBA);
        Ok(())
    })?;

    Ok(canvas)
}

/// Render a complete figure: map layers plus suptitle and axes title.
#[tracing::instrument(skip_all, fields(dpi = params.size.dpi))]
pub fn render_map_figure(
    params: &FigureParams,
    background: &image::RgbImage,
    lines: &[LonLatLine],
    labeller: &mut dyn Labeller,
) -> MapsweepResult<image::RgbImage> {
    let layout = FigureLayout::new(params.size, params.font_pt)?;
    let mut canvas = render_map_layers(&layout, params, background, lines)?;

    for (text, (x, y)) in [
        (&params.suptitle, layout.suptitle_anchor),
        (&params.axes_title, layout.axes_title_anchor),
    ] {
        if text.is_empty() {
            continue;
        }
        labeller.label(
            &mut canvas,
            text,
            layout.title_px as f32,
            (x.round() as i64, y.round() as i64),
        )?;
    }

    Ok(canvas)
}

/// Run `draw` against a transparent vector surface the size of the figure and blend the
/// result over `canvas`.
fn draw_overlay(
    canvas: &mut image::RgbImage,
    layout: &FigureLayout,
    draw: impl FnOnce(&mut vello_cpu::RenderContext) -> MapsweepResult<()>,
) -> MapsweepResult<()> {
    let w: u16 = layout
        .width
        .try_into()
        .map_err(|_| MapsweepError::render("figure width exceeds u16"))?;
    let h: u16 = layout
        .height
        .try_into()
        .map_err(|_| MapsweepError::render("figure height exceeds u16"))?;

    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    let mut ctx = vello_cpu::RenderContext::new(w, h);
    draw(&mut ctx)?;
    ctx.flush();
    ctx.render_to_pixmap(&mut pixmap);

    blend_premul_onto_rgb(
        canvas,
        pixmap.data_as_u8_slice(),
        layout.width,
        layout.height,
        0,
        0,
    );
    Ok(())
}

fn graticule(layout: &FigureLayout) -> Vec<kurbo::BezPath> {
    let mut paths = Vec::new();
    let mut lon = -180.0 + GRID_LON_STEP;
    while lon < 180.0 {
        paths.push(polyline(layout, &[[lon, -90.0], [lon, 90.0]]));
        lon += GRID_LON_STEP;
    }
    let mut lat = -90.0 + GRID_LAT_STEP;
    while lat < 90.0 {
        paths.push(polyline(layout, &[[-180.0, lat], [180.0, lat]]));
        lat += GRID_LAT_STEP;
    }
    paths
}

fn polyline(layout: &FigureLayout, pts: &[[f64; 2]]) -> kurbo::BezPath {
    let mut path = kurbo::BezPath::new();
    for (i, &[lon, lat]) in pts.iter().enumerate() {
        let p = layout.project(lon, lat);
        if i == 0 {
            path.move_to(p);
        } else {
            path.line_to(p);
        }
    }
    path
}

fn stroke_lines(
    ctx: &mut vello_cpu::RenderContext,
    paths: &[kurbo::BezPath],
    width: f64,
    rgba: [u8; 4],
) {
    for path in paths {
        stroke_path(ctx, path, width, rgba);
    }
}

fn stroke_path(
    ctx: &mut vello_cpu::RenderContext,
    path: &kurbo::BezPath,
    width: f64,
    [r, g, b, a]: [u8; 4],
) {
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
    ctx.set_stroke(vello_cpu::kurbo::Stroke::new(width));
    ctx.stroke_path(&bezpath_to_cpu(path));
}

fn point_to_cpu(p: kurbo::Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
