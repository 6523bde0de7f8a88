//! Map symbols for location points.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};

use fews_common::{FewsError, FewsResult};

use crate::png::encode_rgba_image;

pub const MIN_SYMBOL_SIZE: u32 = 4;
pub const MAX_SYMBOL_SIZE: u32 = 128;
pub const DEFAULT_SYMBOL_SIZE: u32 = 16;
pub const DEFAULT_SYMBOL_COLOR: [u8; 3] = [0, 0, 255];

/// Parse `#rrggbb`, `rrggbb` or `#rgb`.
pub fn parse_hex_color(value: &str) -> FewsResult<[u8; 3]> {
    let hex = value.trim().trim_start_matches('#');
    let invalid = || FewsError::invalid_parameter("color", format!("'{}' is not a hex color", value));

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };

    let channel = |i: usize| {
        expanded
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or_else(invalid)
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Draw a filled circle of `color` on a transparent square.
pub fn draw_symbol(size: u32, color: [u8; 3]) -> RgbaImage {
    let size = size.clamp(MIN_SYMBOL_SIZE, MAX_SYMBOL_SIZE);
    let mut img = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0]));

    let center = (size as i32 / 2, size as i32 / 2);
    let radius = (size as i32 - 1) / 2;
    let [r, g, b] = color;
    draw_filled_circle_mut(&mut img, center, radius, Rgba([r, g, b, 255]));
    draw_hollow_circle_mut(&mut img, center, radius, Rgba([0, 0, 0, 255]));
    img
}

/// Encoded map symbol.
pub fn render_symbol(size: u32, color: [u8; 3]) -> FewsResult<Vec<u8>> {
    encode_rgba_image(&draw_symbol(size, color))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#ff8000").unwrap(), [255, 128, 0]);
        assert_eq!(parse_hex_color("00FF00").unwrap(), [0, 255, 0]);
        assert_eq!(parse_hex_color("#f00").unwrap(), [255, 0, 0]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("zzzzzz").is_err());
    }

    #[test]
    fn test_symbol_is_filled_circle_on_transparent_square() {
        let img = draw_symbol(16, [255, 0, 0]);
        assert_eq!(img.dimensions(), (16, 16));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(*img.get_pixel(8, 8), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_symbol_size_is_clamped() {
        assert_eq!(draw_symbol(1, DEFAULT_SYMBOL_COLOR).width(), MIN_SYMBOL_SIZE);
        assert_eq!(draw_symbol(10_000, DEFAULT_SYMBOL_COLOR).width(), MAX_SYMBOL_SIZE);
    }
}
