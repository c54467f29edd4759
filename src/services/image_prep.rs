use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// File extensions accepted as garment photos (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Default square edge for prepared try-on inputs.
pub const GARMENT_TARGET_SIZE: u32 = 1024;

const JPEG_QUALITY: u8 = 90;

/// Region of a full-body render used for the detail shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusRegion {
    /// Chest / logo area.
    #[default]
    Upper,
    Center,
    TopHalf,
}

impl FocusRegion {
    /// Crop box as (left, top, right, bottom) fractions of the source.
    fn fractions(self) -> (f32, f32, f32, f32) {
        match self {
            FocusRegion::Upper => (0.15, 0.10, 0.85, 0.50),
            FocusRegion::Center => (0.20, 0.25, 0.80, 0.75),
            FocusRegion::TopHalf => (0.0, 0.0, 1.0, 0.5),
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// MIME type for a supported image file name, if any.
pub fn mime_type_for(name: &str) -> Option<&'static str> {
    let format = ImageFormat::from_path(name).ok()?;
    matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)
        .then(|| format.to_mime_type())
}

/// Width and height, read from the file header only.
pub fn dimensions(path: &Path) -> Result<(u32, u32), ImageError> {
    image::image_dimensions(path).map_err(|e| ImageError::decode(path, e))
}

/// Normalise a garment photo for submission: RGB on white, shrunk to fit
/// `target` (never enlarged), padded to a `target` square when not square.
pub fn prepare_garment(input: &Path, output: &Path, target: u32) -> Result<PathBuf, ImageError> {
    let img = open(input)?;
    let mut rgb = flatten_on_white(&img);

    let (w, h) = rgb.dimensions();
    if w > target || h > target {
        rgb = DynamicImage::ImageRgb8(rgb).resize(target, target, FilterType::Lanczos3).to_rgb8();
    }

    let (w, h) = rgb.dimensions();
    if w != h {
        let mut canvas = RgbImage::from_pixel(target, target, Rgb([255, 255, 255]));
        let x = i64::from((target - w) / 2);
        let y = i64::from((target - h) / 2);
        imageops::overlay(&mut canvas, &rgb, x, y);
        rgb = canvas;
    }

    save(&DynamicImage::ImageRgb8(rgb), output)?;
    tracing::debug!(input = %input.display(), output = %output.display(), "Prepared garment image");
    Ok(output.to_path_buf())
}

/// Crop a detail shot out of a full-body render.
pub fn create_closeup(input: &Path, output: &Path, region: FocusRegion) -> Result<PathBuf, ImageError> {
    let img = open(input)?;
    let (w, h) = img.dimensions();
    let (left, top, right, bottom) = region.fractions();

    let x = (w as f32 * left) as u32;
    let y = (h as f32 * top) as u32;
    let crop_w = ((w as f32 * right) as u32).saturating_sub(x).max(1);
    let crop_h = ((h as f32 * bottom) as u32).saturating_sub(y).max(1);

    let cropped = img.crop_imm(x, y, crop_w, crop_h);
    save(&cropped, output)?;
    Ok(output.to_path_buf())
}

/// Decode, flatten and shrink an image to fit `max_px`, returning JPEG bytes
/// and the encoded dimensions. Used when embedding images into the catalog.
pub fn encode_for_page(path: &Path, max_px: u32) -> Result<(Vec<u8>, u32, u32), ImageError> {
    let img = open(path)?;
    let mut rgb = flatten_on_white(&img);
    let (w, h) = rgb.dimensions();
    if w > max_px || h > max_px {
        rgb = DynamicImage::ImageRgb8(rgb).resize(max_px, max_px, FilterType::Triangle).to_rgb8();
    }
    let (w, h) = rgb.dimensions();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ImageError::encode(path, e))?;
    Ok((bytes, w, h))
}

fn open(path: &Path) -> Result<DynamicImage, ImageError> {
    let bytes = std::fs::read(path).map_err(|e| ImageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Io {
            path: path.to_path_buf(),
            source: e,
        })?
        .decode()
        .map_err(|e| ImageError::decode(path, e))
}

/// Composite any alpha channel over white and drop it.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

fn save(img: &DynamicImage, output: &Path) -> Result<(), ImageError> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ImageError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let format = ImageFormat::from_path(output).unwrap_or(ImageFormat::Png);
    if format == ImageFormat::Jpeg {
        let file = std::fs::File::create(output).map_err(|e| ImageError::Io {
            path: output.to_path_buf(),
            source: e,
        })?;
        let mut writer = std::io::BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, 95)
            .encode_image(&img.to_rgb8())
            .map_err(|e| ImageError::encode(output, e))?;
        return Ok(());
    }
    img.save_with_format(output, format)
        .map_err(|e| ImageError::encode(output, e))
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode image {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Failed to encode image {path}: {message}")]
    Encode { path: PathBuf, message: String },
}

impl ImageError {
    fn decode(path: &Path, err: image::ImageError) -> Self {
        ImageError::Decode {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    fn encode(path: &Path, err: image::ImageError) -> Self {
        ImageError::Encode {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(w, h, Rgb([10, 20, 30])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("a/tee.PNG")));
        assert!(is_supported(Path::new("tee.jpeg")));
        assert!(is_supported(Path::new("tee.webp")));
        assert!(!is_supported(Path::new("tee.gif")));
        assert!(!is_supported(Path::new("README")));
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for("tee.png"), Some("image/png"));
        assert_eq!(mime_type_for("tee.JPG"), Some("image/jpeg"));
        assert_eq!(mime_type_for("notes.txt"), None);
    }

    #[test]
    fn test_prepare_pads_to_square() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "wide.png", 2048, 1024);
        let out = dir.path().join("prepared/wide.png");
        prepare_garment(&src, &out, 1024).unwrap();

        let img = image::open(&out).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1024, 1024));
        // Top rows are padding, the middle is the shrunk photo.
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_ne!(img.get_pixel(512, 512), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_prepare_never_enlarges_square() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "small.png", 200, 200);
        let out = dir.path().join("small_out.png");
        prepare_garment(&src, &out, 1024).unwrap();
        assert_eq!(dimensions(&out).unwrap(), (200, 200));
    }

    #[test]
    fn test_prepare_flattens_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("clear.png");
        RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 0])).save(&src).unwrap();
        let out = dir.path().join("clear_out.png");
        prepare_garment(&src, &out, 1024).unwrap();
        let img = image::open(&out).unwrap();
        assert!(!img.color().has_alpha());
        assert_eq!(img.to_rgb8().get_pixel(5, 5), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_closeup_upper_region() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "body.png", 1000, 2000);
        let out = dir.path().join("closeup.png");
        create_closeup(&src, &out, FocusRegion::Upper).unwrap();
        assert_eq!(dimensions(&out).unwrap(), (700, 800));
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.png");
        std::fs::write(&src, b"not an image").unwrap();
        let err = prepare_garment(&src, &dir.path().join("x.png"), 1024).unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }));
    }

    #[test]
    fn test_encode_for_page_shrinks() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_png(dir.path(), "big.png", 3000, 1500);
        let (bytes, w, h) = encode_for_page(&src, 1200).unwrap();
        assert_eq!((w, h), (1200, 600));
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
