//! TrueType font loading for graph labels.

use std::path::Path;
use std::sync::Arc;

use rusttype::{point, Font, Scale};

use fews_common::{FewsError, FewsResult};

/// A font shared between renderers.
pub type SharedFont = Arc<Font<'static>>;

/// Load a TrueType font from disk.
pub fn load_font(path: &Path) -> FewsResult<SharedFont> {
    let data = std::fs::read(path).map_err(|e| {
        FewsError::Config(format!("Failed to read font {}: {}", path.display(), e))
    })?;

    let font = Font::try_from_vec(data).ok_or_else(|| {
        FewsError::Config(format!("Not a usable TrueType font: {}", path.display()))
    })?;

    tracing::info!(path = %path.display(), "Loaded label font");
    Ok(Arc::new(font))
}

/// Load the configured font, falling back to no font on failure.
pub fn load_optional_font(path: Option<&Path>) -> Option<SharedFont> {
    let path = path?;
    match load_font(path) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!(error = %e, "Rendering graphs without labels");
            None
        }
    }
}

/// Horizontal advance of `text` in pixels.
pub fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> i32 {
    font.layout(text, scale, point(0.0, 0.0))
        .filter_map(|g| g.pixel_bounding_box().map(|bb| bb.max.x))
        .max()
        .unwrap_or(0)
}
