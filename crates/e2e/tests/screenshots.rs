//! Screenshot evidence inspection on real PNG files

use image::{Rgba, RgbaImage};
use matchup_e2e::visual;
use matchup_e2e::E2eError;

fn write_png(path: &std::path::Path, width: u32, height: u32) {
    let img = RgbaImage::from_pixel(width, height, Rgba([24, 119, 242, 255]));
    img.save(path).unwrap();
}

#[test]
fn inspects_png_dimensions_and_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verification.png");
    write_png(&path, 1280, 720);

    let artifact = visual::inspect(&path).unwrap();
    assert_eq!((artifact.width, artifact.height), (1280, 720));
    assert!(artifact.size_bytes > 0);
    assert_eq!(artifact.size_bytes, std::fs::metadata(&path).unwrap().len());
    assert_eq!(artifact.sha256.len(), 64);
}

#[test]
fn overwritten_screenshot_changes_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("verification.png");

    write_png(&path, 10, 10);
    let first = visual::inspect(&path).unwrap();
    write_png(&path, 20, 10);
    let second = visual::inspect(&path).unwrap();

    assert_ne!(first.sha256, second.sha256);
    assert_eq!(second.width, 20);
}

#[test]
fn inspect_all_stops_at_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("register_page.png");
    write_png(&good, 4, 4);
    let missing = dir.path().join("verification.png");

    let err = visual::inspect_all(&[good, missing]).unwrap_err();
    assert!(matches!(err, E2eError::ScreenshotMissing(p) if p.ends_with("verification.png")));
}
