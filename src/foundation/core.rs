use crate::foundation::error::{MapsweepError, MapsweepResult};

pub use kurbo::{Point, Rect};

/// Axis-aligned pixel rectangle in image coordinates (`right`/`lower` are exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelRect {
    pub left: i64,
    pub upper: i64,
    pub right: i64,
    pub lower: i64,
}

impl PixelRect {
    pub fn new(left: i64, upper: i64, right: i64, lower: i64) -> Self {
        Self {
            left,
            upper,
            right,
            lower,
        }
    }

    pub fn from_origin_size(left: i64, upper: i64, width: u32, height: u32) -> Self {
        Self::new(
            left,
            upper,
            left + i64::from(width),
            upper + i64::from(height),
        )
    }

    pub fn width(self) -> i64 {
        (self.right - self.left).max(0)
    }

    pub fn height(self) -> i64 {
        (self.lower - self.upper).max(0)
    }

    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn center_x(self) -> i64 {
        (self.left + self.right).div_euclid(2)
    }

    /// Grow every edge outward by `by` pixels.
    pub fn outset(self, by: i64) -> Self {
        Self::new(
            self.left - by,
            self.upper - by,
            self.right + by,
            self.lower + by,
        )
    }

    /// Intersection with the `width` x `height` image rooted at the origin.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let w = i64::from(width);
        let h = i64::from(height);
        Self::new(
            self.left.clamp(0, w),
            self.upper.clamp(0, h),
            self.right.clamp(0, w),
            self.lower.clamp(0, h),
        )
    }

    pub fn to_kurbo(self) -> Rect {
        Rect::new(
            self.left as f64,
            self.upper as f64,
            self.right as f64,
            self.lower as f64,
        )
    }
}

/// Physical figure size plus output resolution.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl FigureSize {
    pub fn new(width_in: f64, height_in: f64, dpi: u32) -> MapsweepResult<Self> {
        let size = Self {
            width_in,
            height_in,
            dpi,
        };
        size.validate()?;
        Ok(size)
    }

    pub fn validate(&self) -> MapsweepResult<()> {
        if !self.width_in.is_finite() || !self.height_in.is_finite() {
            return Err(MapsweepError::validation(
                "figure size must be finite inches",
            ));
        }
        if self.width_in <= 0.0 || self.height_in <= 0.0 {
            return Err(MapsweepError::validation("figure size must be positive"));
        }
        if self.dpi == 0 {
            return Err(MapsweepError::validation("figure dpi must be non-zero"));
        }
        let (w, h) = (self.width_px(), self.height_px());
        if w == 0 || h == 0 || w > u32::from(u16::MAX) || h > u32::from(u16::MAX) {
            return Err(MapsweepError::validation(format!(
                "figure raster {w}x{h} px is outside the supported range"
            )));
        }
        Ok(())
    }

    pub fn width_px(&self) -> u32 {
        (self.width_in * f64::from(self.dpi)).round() as u32
    }

    pub fn height_px(&self) -> u32 {
        (self.height_in * f64::from(self.dpi)).round() as u32
    }

    /// Convert typographic points to device pixels at this DPI.
    pub fn points_to_px(&self, pt: f64) -> f64 {
        pt * f64::from(self.dpi) / 72.0
    }
}
