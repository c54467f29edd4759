//! Image fixtures written into temporary directories.

#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A garment-like test image: a dark shape on a light background.
pub fn garment_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < width * 3 / 4 && y > height / 5 && y < height * 4 / 5;
        if inside {
            Rgb([40, 60, (x % 200) as u8])
        } else {
            Rgb([235, 235, 235])
        }
    })
}

/// PNG-encoded bytes of [`garment_image`].
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    garment_image(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    garment_image(width, height).save(&path).unwrap();
    path
}

/// A file with an image extension whose contents do not decode.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"this is not an image").unwrap();
    path
}

/// Named garment photos in a fresh directory.
pub fn garment_dir(names: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        write_png(dir.path(), name, 120, 160);
    }
    dir
}
