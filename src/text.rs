use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    config::FontConfig,
    foundation::error::{MapsweepError, MapsweepResult},
};

/// Font bytes resolved once per run and shared by every label.
#[derive(Clone)]
pub struct LoadedFont {
    pub bytes: Arc<Vec<u8>>,
    pub index: u32,
    /// Where the face came from (file path or "system"), for diagnostics.
    pub origin: String,
}

impl std::fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFont")
            .field("bytes_len", &self.bytes.len())
            .field("index", &self.index)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Resolve the configured font: an explicit file wins, then the named system family,
/// then any sans-serif face, then whatever face the system has.
#[tracing::instrument(skip(cfg), fields(family = %cfg.family))]
pub fn resolve_font(cfg: &FontConfig) -> MapsweepResult<LoadedFont> {
    if let Some(path) = &cfg.path {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font file '{}'", path.display()))?;
        return Ok(LoadedFont {
            bytes: Arc::new(bytes),
            index: 0,
            origin: path.display().to_string(),
        });
    }

    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let families = [
        usvg::fontdb::Family::Name(cfg.family.as_str()),
        usvg::fontdb::Family::SansSerif,
    ];
    let query = usvg::fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|f| f.id))
        .ok_or_else(|| {
            MapsweepError::validation(format!(
                "no usable font found for \"{}\"; install it (e.g. \"fonts-dejavu-core\") or set font.path",
                cfg.family
            ))
        })?;

    let origin = db
        .face(id)
        .map(|face| match &face.source {
            usvg::fontdb::Source::File(p) => p.display().to_string(),
            usvg::fontdb::Source::SharedFile(p, _) => p.display().to_string(),
            usvg::fontdb::Source::Binary(_) => "system".to_string(),
        })
        .unwrap_or_else(|| "system".to_string());

    let (bytes, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| MapsweepError::validation(format!("font face '{origin}' has no data")))?;

    tracing::debug!(%origin, "resolved font");
    Ok(LoadedFont {
        bytes: Arc::new(bytes),
        index,
        origin,
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush colour used by Parley text layout.
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrushRgba8 {
    pub const BLACK: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };
}

/// One shaped glyph in block coordinates (origin top-left of the text block).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedGlyph {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// Shaped multi-line text. Lines start at the block's left edge; `width` is the widest line.
#[derive(Clone, Debug)]
pub struct TextBlock {
    pub glyphs: Vec<PlacedGlyph>,
    pub size_px: f32,
    pub brush: TextBrushRgba8,
    pub width: f32,
    pub height: f32,
    /// Baseline of the first line, measured from the block top.
    pub first_baseline: f32,
}

impl TextBlock {
    /// Offset from an anchor point (middle of the block, first baseline) to the block's top-left.
    pub fn origin_for_anchor(&self, anchor_x: f64, anchor_y: f64) -> (f64, f64) {
        (
            anchor_x - f64::from(self.width) / 2.0,
            anchor_y - f64::from(self.first_baseline),
        )
    }
}

/// Stateful helper for shaping text with one registered font.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl TextLayoutEngine {
    pub fn new(font: &LoadedFont) -> MapsweepResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font.bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            MapsweepError::validation(format!(
                "no font families registered from '{}'",
                font.origin
            ))
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| MapsweepError::validation("registered font family has no name"))?
            .to_string();

        let data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font.bytes.as_ref().clone()),
            font.index,
        );

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font: data,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    /// Shape `text` (newlines split lines) at `size_px`.
    pub fn layout_block(
        &mut self,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> MapsweepResult<TextBlock> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(MapsweepError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);

        // Lines are left-aligned inside the block; the anchor centres the block as a whole.
        let mut glyphs = Vec::new();
        let mut width = 0.0f32;
        let mut first_baseline = None;
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let baseline = run.baseline();
                first_baseline.get_or_insert(baseline);
                let mut x = run.offset();
                for g in run.glyphs() {
                    glyphs.push(PlacedGlyph {
                        id: g.id,
                        x: x + g.x,
                        y: baseline - g.y,
                    });
                    x += g.advance;
                }
                width = width.max(x);
            }
        }

        Ok(TextBlock {
            glyphs,
            size_px,
            brush,
            width,
            height: layout.height(),
            first_baseline: first_baseline.unwrap_or(size_px),
        })
    }

    /// Fill `block` into `ctx` with its top-left at `origin`.
    pub fn draw(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        block: &TextBlock,
        origin: (f64, f64),
    ) {
        ctx.set_transform(vello_cpu::kurbo::Affine::translate(origin));
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            block.brush.r,
            block.brush.g,
            block.brush.b,
            block.brush.a,
        ));
        let glyphs = block.glyphs.iter().map(|g| vello_cpu::Glyph {
            id: g.id,
            x: g.x,
            y: g.y,
        });
        ctx.glyph_run(&self.font)
            .font_size(block.size_px)
            .fill_glyphs(glyphs);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    /// Rasterise `block` on its own transparent surface and blend it onto `canvas` so that
    /// the block's anchor (horizontal middle, first baseline) lands on `anchor`.
    pub fn blit_anchored(
        &self,
        canvas: &mut image::RgbImage,
        block: &TextBlock,
        anchor: (i64, i64),
    ) -> MapsweepResult<()> {
        let margin = block.size_px.ceil() as i64;
        let w = block.width.ceil() as i64 + 2 * margin;
        let h = block.height.ceil() as i64 + 2 * margin;
        let w16: u16 = w
            .try_into()
            .map_err(|_| MapsweepError::render("text block width exceeds u16"))?;
        let h16: u16 = h
            .try_into()
            .map_err(|_| MapsweepError::render("text block height exceeds u16"))?;

        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        self.draw(&mut ctx, block, (margin as f64, margin as f64));
        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        let (ox, oy) = block.origin_for_anchor(anchor.0 as f64, anchor.1 as f64);
        let left = ox.round() as i64 - margin;
        let top = oy.round() as i64 - margin;
        blend_premul_onto_rgb(canvas, pixmap.data_as_u8_slice(), w as u32, h as u32, left, top);
        Ok(())
    }
}

/// Draws text onto a raster, anchored at the middle of its first baseline.
pub trait Labeller {
    fn label(
        &mut self,
        canvas: &mut image::RgbImage,
        text: &str,
        size_px: f32,
        anchor: (i64, i64),
    ) -> MapsweepResult<()>;
}

impl Labeller for TextLayoutEngine {
    fn label(
        &mut self,
        canvas: &mut image::RgbImage,
        text: &str,
        size_px: f32,
        anchor: (i64, i64),
    ) -> MapsweepResult<()> {
        let block = self.layout_block(text, size_px, TextBrushRgba8::BLACK)?;
        self.blit_anchored(canvas, &block, anchor)
    }
}

/// Source-over blend of a premultiplied RGBA8 buffer onto an opaque RGB canvas.
pub fn blend_premul_onto_rgb(
    canvas: &mut image::RgbImage,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    left: i64,
    top: i64,
) {
    let (cw, ch) = (i64::from(canvas.width()), i64::from(canvas.height()));
    for sy in 0..i64::from(src_h) {
        let y = top + sy;
        if y < 0 || y >= ch {
            continue;
        }
        for sx in 0..i64::from(src_w) {
            let x = left + sx;
            if x < 0 || x >= cw {
                continue;
            }
            let i = ((sy * i64::from(src_w) + sx) * 4) as usize;
            let a = u16::from(src[i + 3]);
            if a == 0 {
                continue;
            }
            let inv = 255 - a;
            let px = canvas.get_pixel_mut(x as u32, y as u32);
            for c in 0..3 {
                let v = u16::from(src[i + c]) + mul_div255(u16::from(px.0[c]), inv);
                px.0[c] = v.min(255) as u8;
            }
        }
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Resolve a font and build an engine in one go; the usual entry point for both subcommands.
pub fn engine_for(cfg: &FontConfig) -> MapsweepResult<TextLayoutEngine> {
    let font = resolve_font(cfg)?;
    let engine = TextLayoutEngine::new(&font)?;
    tracing::info!(
        "Will use \"{}\" (family \"{}\")",
        font.origin,
        engine.family_name()
    );
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Option<TextLayoutEngine> {
        match engine_for(&FontConfig::default()) {
            Ok(e) => Some(e),
            Err(e) => {
                eprintln!("skipping: {e}");
                None
            }
        }
    }

    #[test]
    fn blend_opaque_source_replaces_canvas() {
        let mut canvas = image::RgbImage::from_pixel(2, 1, image::Rgb([255, 255, 255]));
        let src = [10u8, 20, 30, 255, 0, 0, 0, 0];
        blend_premul_onto_rgb(&mut canvas, &src, 2, 1, 0, 0);
        assert_eq!(canvas.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(canvas.get_pixel(1, 0).0, [255, 255, 255]);
    }

    #[test]
    fn blend_clips_outside_canvas() {
        let mut canvas = image::RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
        let src = [0u8, 0, 0, 255, 0, 0, 0, 255];
        blend_premul_onto_rgb(&mut canvas, &src, 2, 1, -1, 0);
        assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0]);
        blend_premul_onto_rgb(&mut canvas, &src, 2, 1, 5, 5);
    }

    #[test]
    fn anchor_origin_is_middle_first_baseline() {
        let block = TextBlock {
            glyphs: vec![],
            size_px: 10.0,
            brush: TextBrushRgba8::BLACK,
            width: 40.0,
            height: 24.0,
            first_baseline: 9.0,
        };
        assert_eq!(block.origin_for_anchor(100.0, 50.0), (80.0, 41.0));
    }

    #[test]
    fn multiline_blocks_are_taller_than_single_lines() {
        let Some(mut e) = engine() else { return };
        let one = e
            .layout_block("resolution", 32.0, TextBrushRgba8::BLACK)
            .unwrap();
        let three = e
            .layout_block("a\nresolution\nb", 32.0, TextBrushRgba8::BLACK)
            .unwrap();
        assert!(three.height > 2.0 * one.height);
        assert!((three.width - one.width).abs() < 1.0);
        assert!(one.first_baseline > 0.0 && one.first_baseline < one.height);
    }

    #[test]
    fn lines_share_the_block_left_edge() {
        let Some(mut e) = engine() else { return };
        let block = e
            .layout_block(
                "interpolation = \"none\"\nregrid_shape = 750\nres",
                32.0,
                TextBrushRgba8::BLACK,
            )
            .unwrap();
        let mut starts: Vec<(f32, f32)> = Vec::new();
        for g in &block.glyphs {
            if starts.last().is_none_or(|&(_, y)| (g.y - y).abs() > 1.0) {
                starts.push((g.x, g.y));
            }
        }
        assert_eq!(starts.len(), 3);
        for (x, _) in &starts {
            assert!((x - starts[0].0).abs() < 0.5, "line starts {starts:?}");
        }
    }

    #[test]
    fn blit_darkens_pixels_near_anchor() {
        let Some(mut e) = engine() else { return };
        let block = e
            .layout_block("HHHH", 32.0, TextBrushRgba8::BLACK)
            .unwrap();
        let mut canvas = image::RgbImage::from_pixel(200, 80, image::Rgb([255, 255, 255]));
        e.blit_anchored(&mut canvas, &block, (100, 60)).unwrap();
        let dark = canvas.pixels().filter(|p| p.0[0] < 128).count();
        assert!(dark > 0);
        // Nothing is drawn below the baseline for capital H.
        assert!((62..80).all(|y| canvas.get_pixel(100, y).0[0] > 200));
    }

    #[test]
    fn rejects_non_positive_size() {
        let Some(mut e) = engine() else { return };
        assert!(e.layout_block("x", 0.0, TextBrushRgba8::BLACK).is_err());
    }
}
