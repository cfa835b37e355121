//! Minimal GeoJSON reader: just enough to pull line work out of reference fixtures.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{MapsweepError, MapsweepResult};

/// `[longitude, latitude, ...]`; extra ordinates (altitude) are ignored.
pub type Position = Vec<f64>;

/// Longitude/latitude polyline in degrees.
pub type LonLatLine = Vec<[f64; 2]>;

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Feature {
        geometry: Option<Box<GeoJson>>,
    },
    FeatureCollection {
        features: Vec<GeoJson>,
    },
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJson>,
    },
}

pub fn parse_geojson(text: &str) -> MapsweepResult<GeoJson> {
    serde_json::from_str(text).map_err(|e| MapsweepError::serde(format!("parse GeoJSON: {e}")))
}

#[tracing::instrument]
pub fn load_geojson(path: &Path) -> MapsweepResult<GeoJson> {
    tracing::info!("Loading \"{}\" ...", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read GeoJSON '{}'", path.display()))?;
    parse_geojson(&text).map_err(|e| match e {
        MapsweepError::Serde(msg) => MapsweepError::serde(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Flatten any GeoJSON object into its line work. Points carry no lines; polygon rings
/// become closed lines.
pub fn extract_lines(obj: &GeoJson) -> MapsweepResult<Vec<LonLatLine>> {
    let mut out = Vec::new();
    collect_lines(obj, &mut out)?;
    Ok(out)
}

fn collect_lines(obj: &GeoJson, out: &mut Vec<LonLatLine>) -> MapsweepResult<()> {
    match obj {
        GeoJson::Feature { geometry } => {
            if let Some(g) = geometry {
                collect_lines(g, out)?;
            }
        }
        GeoJson::FeatureCollection { features } => {
            for f in features {
                collect_lines(f, out)?;
            }
        }
        GeoJson::GeometryCollection { geometries } => {
            for g in geometries {
                collect_lines(g, out)?;
            }
        }
        GeoJson::Point { .. } | GeoJson::MultiPoint { .. } => {}
        GeoJson::LineString { coordinates } => push_line(coordinates, out)?,
        GeoJson::MultiLineString { coordinates } | GeoJson::Polygon { coordinates } => {
            for line in coordinates {
                push_line(line, out)?;
            }
        }
        GeoJson::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                for ring in polygon {
                    push_line(ring, out)?;
                }
            }
        }
    }
    Ok(())
}

fn push_line(coords: &[Position], out: &mut Vec<LonLatLine>) -> MapsweepResult<()> {
    let mut line = Vec::with_capacity(coords.len());
    for pos in coords {
        let [lon, lat, ..] = pos.as_slice() else {
            return Err(MapsweepError::validation(
                "GeoJSON position needs at least two ordinates",
            ));
        };
        if !lon.is_finite() || !lat.is_finite() {
            return Err(MapsweepError::validation(
                "GeoJSON position must be finite",
            ));
        }
        line.push([*lon, *lat]);
    }
    if line.len() >= 2 {
        out.push(line);
    }
    Ok(())
}

/// Break a line wherever consecutive vertices are more than 180 degrees of longitude apart,
/// so a wrapped line is not drawn straight across the whole map. Both pieces are extended
/// to the map edge at the latitude where the segment crosses it.
pub fn split_antimeridian(line: &[[f64; 2]]) -> Vec<LonLatLine> {
    let mut parts = Vec::new();
    let mut current: LonLatLine = Vec::new();
    for &p in line {
        if let Some(&prev) = current.last()
            && (p[0] - prev[0]).abs() > 180.0
        {
            let (edge, unwrapped) = if prev[0] >= 0.0 {
                (180.0, p[0] + 360.0)
            } else {
                (-180.0, p[0] - 360.0)
            };
            let t = (edge - prev[0]) / (unwrapped - prev[0]);
            let lat = prev[1] + t * (p[1] - prev[1]);

            push_distinct(&mut current, [edge, lat]);
            if current.len() >= 2 {
                parts.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            current.push([-edge, lat]);
        }
        push_distinct(&mut current, p);
    }
    if current.len() >= 2 {
        parts.push(current);
    }
    parts
}

fn push_distinct(line: &mut LonLatLine, p: [f64; 2]) {
    if line.last() != Some(&p) {
        line.push(p);
    }
}

/// Fixture files named `<prefix>?<suffix>` (exactly one character between), sorted by name.
pub fn find_fixtures(dir: &Path, prefix: &str, suffix: &str) -> MapsweepResult<Vec<PathBuf>> {
    let rd = std::fs::read_dir(dir)
        .with_context(|| format!("list fixtures in '{}'", dir.display()))?;
    let mut out = Vec::new();
    for entry in rd.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(middle) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };
        if middle.chars().count() == 1 {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}
