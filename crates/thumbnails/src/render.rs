use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::{JPEG_QUALITY, MAX_THUMB_WIDTH, ThumbnailError};

/// Target size for a `width`x`height` source: capped at `max_width`,
/// aspect kept, never below 1x1.
pub fn thumbnail_size(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    let (w, h) = if width > max_width {
        let ratio = f64::from(max_width) / f64::from(width);
        (max_width, (f64::from(height) * ratio) as u32)
    } else {
        (width, height)
    };
    (w.max(1), h.max(1))
}

/// Decodes the image at `path`, scales it and encodes the thumbnail.
///
/// Blocking; run it on a blocking thread.
pub fn render_thumbnail(path: &Path, as_png: bool) -> Result<Vec<u8>, ThumbnailError> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    encode(&scale(&img), as_png)
}

fn scale(img: &DynamicImage) -> DynamicImage {
    let (w, h) = img.dimensions();
    let (tw, th) = thumbnail_size(w, h, MAX_THUMB_WIDTH);
    if (tw, th) == (w, h) {
        return img.clone();
    }
    img.resize_exact(tw, th, FilterType::CatmullRom)
}

fn encode(img: &DynamicImage, as_png: bool) -> Result<Vec<u8>, ThumbnailError> {
    let mut buf = Vec::new();
    if as_png {
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    } else {
        let rgb = img.to_rgb8();
        JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn wide_images_shrink_to_max_width() {
        assert_eq!(thumbnail_size(640, 480, 320), (320, 240));
        assert_eq!(thumbnail_size(4032, 3024, 320), (320, 240));
    }

    #[test]
    fn small_images_keep_size() {
        assert_eq!(thumbnail_size(100, 50, 320), (100, 50));
        assert_eq!(thumbnail_size(320, 1000, 320), (320, 1000));
    }

    #[test]
    fn dimensions_never_reach_zero() {
        assert_eq!(thumbnail_size(1000, 1, 320), (320, 1));
        assert_eq!(thumbnail_size(0, 0, 320), (1, 1));
    }

    #[test]
    fn png_source_renders_png() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.png");
        RgbaImage::from_pixel(640, 320, Rgba([10, 20, 30, 128]))
            .save(&src)
            .unwrap();

        let bytes = render_thumbnail(&src, true).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!(thumb.dimensions(), (320, 160));
    }

    #[test]
    fn other_sources_render_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("b.png");
        RgbImage::from_pixel(800, 400, Rgb([200, 100, 50]))
            .save(&src)
            .unwrap();

        let bytes = render_thumbnail(&src, false).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8, 0xFF]));
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!(thumb.dimensions(), (320, 160));
    }

    #[test]
    fn content_decides_decoder() {
        let dir = tempfile::tempdir().unwrap();
        // PNG bytes behind a .jpg name.
        let src = dir.path().join("mislabeled.jpg");
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(10, 10))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        std::fs::write(&src, png).unwrap();

        assert!(render_thumbnail(&src, false).is_ok());
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("junk.jpg");
        std::fs::write(&src, b"definitely not an image").unwrap();
        assert!(render_thumbnail(&src, false).is_err());
    }
}
