use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    config::Interpolation,
    foundation::error::{MapsweepError, MapsweepResult},
};

/// Target grid the background image is resampled onto before it is drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RegridShape {
    /// Length of the shorter side; the longer side follows the extent's aspect ratio.
    Square(u32),
    /// Explicit `(nx, ny)` grid.
    Explicit { nx: u32, ny: u32 },
}

impl RegridShape {
    /// Grid sized from the figure's pixel dimensions, scaled by a safety factor
    /// (values above 1 oversample, after Nyquist).
    pub fn for_safety_factor(sf: f64, width_in: f64, height_in: f64, dpi: u32) -> Self {
        let dpi = f64::from(dpi);
        Self::Explicit {
            nx: (sf * width_in * dpi).round() as u32,
            ny: (sf * height_in * dpi).round() as u32,
        }
    }

    /// Concrete `(nx, ny)` for an extent whose width/height ratio is `aspect`.
    pub fn dims_for_extent(self, aspect: f64) -> (u32, u32) {
        match self {
            Self::Square(n) => {
                if aspect >= 1.0 {
                    ((f64::from(n) * aspect) as u32, n)
                } else {
                    (n, (f64::from(n) / aspect) as u32)
                }
            }
            Self::Explicit { nx, ny } => (nx, ny),
        }
    }

    /// Text used in figure titles.
    pub fn label(self) -> String {
        match self {
            Self::Square(n) => n.to_string(),
            Self::Explicit { nx, ny } => format!("({nx},{ny})"),
        }
    }
}

/// Path of the background image for one named set and resolution.
pub fn background_path(dir: &Path, name: &str, resolution: &str) -> PathBuf {
    dir.join(name).join(format!("{resolution}.png"))
}

#[tracing::instrument]
pub fn load_background(path: &Path) -> MapsweepResult<image::RgbImage> {
    tracing::debug!("loading background \"{}\"", path.display());
    let img = image::open(path)
        .with_context(|| format!("open background image '{}'", path.display()))?
        .to_rgb8();
    if img.width() == 0 || img.height() == 0 {
        return Err(MapsweepError::validation(format!(
            "background image '{}' is empty",
            path.display()
        )));
    }
    Ok(img)
}

/// Resample a global background onto the regrid grid and then draw that grid into a
/// `box_w` x `box_h` map box with the requested interpolation.
pub fn render_background(
    src: &image::RgbImage,
    regrid: RegridShape,
    interpolation: Interpolation,
    box_w: u32,
    box_h: u32,
) -> MapsweepResult<image::RgbImage> {
    if box_w == 0 || box_h == 0 {
        return Err(MapsweepError::render("map box must be non-empty"));
    }
    let (nx, ny) = regrid.dims_for_extent(2.0);
    if nx == 0 || ny == 0 {
        return Err(MapsweepError::validation(format!(
            "regrid shape {} collapses to an empty grid",
            regrid.label()
        )));
    }

    let grid = if (nx, ny) == src.dimensions() {
        src.clone()
    } else {
        image::imageops::resize(src, nx, ny, image::imageops::FilterType::Nearest)
    };
    Ok(image::imageops::resize(
        &grid,
        box_w,
        box_h,
        interpolation.filter(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_regrid_follows_extent_aspect() {
        assert_eq!(RegridShape::Square(750).dims_for_extent(2.0), (1500, 750));
        assert_eq!(RegridShape::Square(750).dims_for_extent(0.5), (750, 1500));
        assert_eq!(RegridShape::Square(750).label(), "750");
    }

    #[test]
    fn safety_factor_grid_scales_with_dpi() {
        let r = RegridShape::for_safety_factor(0.25, 12.8, 7.2, 75);
        assert_eq!(r, RegridShape::Explicit { nx: 240, ny: 135 });
        assert_eq!(r.label(), "(240,135)");
        let r = RegridShape::for_safety_factor(1.0, 12.8, 7.2, 300);
        assert_eq!(r.dims_for_extent(2.0), (3840, 2160));
    }

    #[test]
    fn coarse_regrid_loses_detail_even_with_a_fine_source() {
        let mut src = image::RgbImage::new(8, 4);
        for (x, _, p) in src.enumerate_pixels_mut() {
            *p = if x % 2 == 0 {
                image::Rgb([0, 0, 0])
            } else {
                image::Rgb([255, 255, 255])
            };
        }
        let out = render_background(
            &src,
            RegridShape::Explicit { nx: 2, ny: 1 },
            Interpolation::None,
            8,
            4,
        )
        .unwrap();
        assert_eq!(out.dimensions(), (8, 4));
        // Two flat halves: each column of the 2x1 grid covers four output columns.
        let left = out.get_pixel(1, 1).0;
        assert!((0..4).all(|x| out.get_pixel(x, 2).0 == left));
        let right = out.get_pixel(6, 1).0;
        assert!((4..8).all(|x| out.get_pixel(x, 2).0 == right));
    }

    #[test]
    fn background_path_layout() {
        assert_eq!(
            background_path(Path::new("bg"), "natural-earth-1", "large0256px"),
            PathBuf::from("bg/natural-earth-1/large0256px.png")
        );
    }

    #[test]
    fn empty_box_is_rejected() {
        let src = image::RgbImage::new(4, 2);
        assert!(
            render_background(&src, RegridShape::Square(2), Interpolation::Bicubic, 0, 4).is_err()
        );
    }
}
