use std::path::Path;

use mapsweep::{SweepConfig, extract_lines, find_fixtures, load_geojson, load_reference_lines};

#[test]
fn bundled_great_circles_load_in_name_order() {
    let dir = Path::new("fixtures").join("greatCircle");
    let files = find_fixtures(&dir, "greatCircle", "_4.geojson").unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "greatCircle1_4.geojson",
            "greatCircle2_4.geojson",
            "greatCircle3_4.geojson"
        ]
    );

    for file in &files {
        let lines = extract_lines(&load_geojson(file).unwrap()).unwrap();
        assert!(!lines.is_empty(), "{} has no lines", file.display());
        for line in &lines {
            for &[lon, lat] in line {
                assert!((-180.0..=180.0).contains(&lon));
                assert!((-90.0..=90.0).contains(&lat));
            }
        }
    }
}

#[test]
fn reference_lines_come_from_every_fixture() {
    let lines = load_reference_lines(&SweepConfig::default(), Path::new(".")).unwrap();
    assert_eq!(lines.len(), 3);
}
