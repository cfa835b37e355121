use crate::{
    config::CompareConfig,
    foundation::core::PixelRect,
    foundation::error::{MapsweepError, MapsweepResult},
};

/// Column of the comparison grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Old,
    New,
}

impl Column {
    pub const ALL: [Column; 2] = [Column::Old, Column::New];

    pub fn index(self) -> i64 {
        match self {
            Self::Old => 0,
            Self::New => 1,
        }
    }
}

/// Pixel geometry of one comparison canvas.
///
/// Everything is a deterministic affine function of the tier index and column, so the
/// composer never measures anything at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanvasLayout {
    pub padding: u32,
    pub snippet: u32,
    pub snippet_scale: u32,
    pub title: u32,
    pub tiers: u32,
}

/// Placement of one snippet band and its label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Band {
    /// Where the upscaled snippet is pasted.
    pub snippet: PixelRect,
    /// Shaded background behind label and snippet.
    pub shade: PixelRect,
    /// Middle/first-baseline anchor of the three-line label.
    pub label_anchor: (i64, i64),
}

impl CanvasLayout {
    pub fn new(
        padding: u32,
        snippet: u32,
        snippet_scale: u32,
        title: u32,
        tiers: u32,
    ) -> MapsweepResult<Self> {
        if snippet == 0 || snippet_scale == 0 || title == 0 || tiers == 0 {
            return Err(MapsweepError::validation(
                "canvas snippet, scale, title and tier count must be non-zero",
            ));
        }
        let layout = Self {
            padding,
            snippet,
            snippet_scale,
            title,
            tiers,
        };
        let (w, h) = layout.size();
        if w > u64::from(u32::MAX) || h > u64::from(u32::MAX) {
            return Err(MapsweepError::validation(format!(
                "canvas {w}x{h} px is too large"
            )));
        }
        Ok(layout)
    }

    pub fn from_config(cfg: &CompareConfig) -> MapsweepResult<Self> {
        let tiers: u32 = cfg
            .resolutions
            .len()
            .try_into()
            .map_err(|_| MapsweepError::validation("too many resolution tiers"))?;
        Self::new(cfg.padding, cfg.snippet, cfg.snippet_scale, cfg.title, tiers)
    }

    /// Edge length of a pasted (upscaled) snippet.
    pub fn scaled(&self) -> u32 {
        self.snippet_scale * self.snippet
    }

    /// Horizontal distance between the two columns' left edges.
    pub fn column_stride(&self) -> u32 {
        self.scaled() + 2 * self.padding
    }

    /// Vertical distance between consecutive tiers.
    pub fn tier_stride(&self) -> u32 {
        self.scaled() + 2 * self.padding + self.title
    }

    fn size(&self) -> (u64, u64) {
        let w = 2 * u64::from(self.column_stride());
        let h = u64::from(self.title) + u64::from(self.tiers) * u64::from(self.tier_stride());
        (w, h)
    }

    pub fn width(&self) -> u32 {
        self.size().0 as u32
    }

    pub fn height(&self) -> u32 {
        self.size().1 as u32
    }

    /// Anchor of the canvas-wide title (horizontal middle, first baseline).
    pub fn title_anchor(&self) -> (i64, i64) {
        (i64::from(self.width() / 2), i64::from(self.title / 2))
    }

    /// Label font size in pixels.
    pub fn font_px(&self) -> u32 {
        self.title / 4
    }

    pub fn band_top(&self, tier: u32) -> i64 {
        i64::from(2 * self.title + self.padding) + i64::from(tier) * i64::from(self.tier_stride())
    }

    pub fn band_left(&self, column: Column) -> i64 {
        i64::from(self.padding) + column.index() * i64::from(self.column_stride())
    }

    pub fn band(&self, tier: u32, column: Column) -> MapsweepResult<Band> {
        if tier >= self.tiers {
            return Err(MapsweepError::validation(format!(
                "tier {tier} out of range (canvas has {} tiers)",
                self.tiers
            )));
        }
        let upper = self.band_top(tier);
        let left = self.band_left(column);
        let snippet = PixelRect::from_origin_size(left, upper, self.scaled(), self.scaled());

        let half_pad = i64::from(self.padding / 2);
        let title = i64::from(self.title);
        let mut shade = snippet.outset(half_pad);
        shade.upper -= title;

        let label_anchor = (snippet.center_x(), upper - 3 * title / 4);

        Ok(Band {
            snippet,
            shade,
            label_anchor,
        })
    }

    /// Centred `snippet` x `snippet` crop window for a `width` x `height` source.
    pub fn centre_crop(&self, width: u32, height: u32) -> MapsweepResult<PixelRect> {
        if width < self.snippet || height < self.snippet {
            return Err(MapsweepError::validation(format!(
                "source image {width}x{height} px is smaller than the {0}x{0} px snippet",
                self.snippet
            )));
        }
        let half = i64::from(self.snippet / 2);
        let cx = i64::from(width / 2);
        let cy = i64::from(height / 2);
        Ok(PixelRect::new(cx - half, cy - half, cx + half, cy + half))
    }
}
