//! PNG encoding for rendered graphs and symbols.
//!
//! Drawing happens on an [`RgbaImage`]; encoding goes through the `image`
//! crate's PNG codec with fast compression, since graphs are rendered per
//! request.

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::io::Reader as ImageReader;
use image::{ColorType, ImageEncoder, ImageFormat, RgbaImage};

use fews_common::{FewsError, FewsResult};

/// Encode a drawn image.
pub fn encode_rgba_image(img: &RgbaImage) -> FewsResult<Vec<u8>> {
    encode_rgba(img.as_raw(), img.width(), img.height())
}

/// Encode raw RGBA bytes, four per pixel, row-major.
pub fn encode_rgba(pixels: &[u8], width: u32, height: u32) -> FewsResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(FewsError::Render(format!(
            "Invalid image size {}x{}",
            width, height
        )));
    }
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(FewsError::Render(format!(
            "Pixel buffer holds {} bytes, expected {} for {}x{}",
            pixels.len(),
            expected,
            width,
            height
        )));
    }

    let mut png = Vec::new();
    PngEncoder::new_with_quality(&mut png, CompressionType::Fast, FilterType::Adaptive)
        .write_image(pixels, width, height, ColorType::Rgba8)
        .map_err(|e| FewsError::Render(format!("PNG encoding failed: {}", e)))?;
    Ok(png)
}

/// Width and height of a PNG, `None` if `data` is not one.
pub fn read_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    if reader.format() != Some(ImageFormat::Png) {
        return None;
    }
    reader.into_dimensions().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_encoded_image_decodes_back() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 1, Rgba([214, 39, 40, 255]));

        let png = encode_rgba_image(&img).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(read_dimensions(&png), Some((3, 2)));

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([214, 39, 40, 255]));
    }

    #[test]
    fn test_buffer_size_mismatch_is_render_error() {
        let err = encode_rgba(&[0u8; 12], 2, 2).unwrap_err();
        assert_eq!(err.kind(), "RenderError");
        assert!(encode_rgba(&[], 0, 0).is_err());
    }

    #[test]
    fn test_read_dimensions_rejects_garbage() {
        assert_eq!(read_dimensions(b"not a png at all, clearly"), None);
    }
}
